//! SurrealDB implementation of [`ResourceRepository`].

use canopy_core::error::CanopyResult;
use canopy_core::models::resource::{CreateResource, Resource};
use canopy_core::repository::ResourceRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ResourceRow {
    tenant_id: String,
    parent_id: Option<String>,
    resource_type: String,
    name: String,
    path: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct ResourceRowWithId {
    record_id: String,
    tenant_id: String,
    parent_id: Option<String>,
    resource_type: String,
    name: String,
    path: String,
    created_at: DateTime<Utc>,
}

impl ResourceRow {
    fn into_resource(self, id: Uuid) -> Result<Resource, DbError> {
        let tenant_id =
            Uuid::parse_str(&self.tenant_id).map_err(|e| DbError::invalid_id("tenant", e))?;
        let parent_id = self
            .parent_id
            .map(|p| Uuid::parse_str(&p))
            .transpose()
            .map_err(|e| DbError::invalid_id("parent", e))?;
        Ok(Resource {
            id,
            tenant_id,
            parent_id,
            resource_type: self.resource_type,
            name: self.name,
            path: self.path,
            created_at: self.created_at,
        })
    }
}

impl ResourceRowWithId {
    fn try_into_resource(self) -> Result<Resource, DbError> {
        let id =
            Uuid::parse_str(&self.record_id).map_err(|e| DbError::invalid_id("resource", e))?;
        ResourceRow {
            tenant_id: self.tenant_id,
            parent_id: self.parent_id,
            resource_type: self.resource_type,
            name: self.name,
            path: self.path,
            created_at: self.created_at,
        }
        .into_resource(id)
    }
}

/// New path of one moved resource.
#[derive(Debug, SurrealValue)]
struct PathUpdate {
    id: String,
    path: String,
}

fn collect(rows: Vec<ResourceRowWithId>) -> CanopyResult<Vec<Resource>> {
    rows.into_iter()
        .map(|row| row.try_into_resource())
        .collect::<Result<Vec<_>, DbError>>()
        .map_err(Into::into)
}

/// SurrealDB implementation of the Resource repository.
#[derive(Clone)]
pub struct SurrealResourceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealResourceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ResourceRepository for SurrealResourceRepository<C> {
    async fn create(&self, input: CreateResource) -> CanopyResult<Resource> {
        if self.exists_by_path(input.tenant_id, &input.path).await? {
            return Err(DbError::Duplicate {
                entity: "resource".into(),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('resource', $id) SET \
                 tenant_id = $tenant_id, parent_id = $parent_id, \
                 resource_type = $resource_type, \
                 name = $name, path = $path",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("parent_id", input.parent_id.map(|p| p.to_string())))
            .bind(("resource_type", input.resource_type))
            .bind(("name", input.name))
            .bind(("path", input.path))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_write("resource", e))?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource".into(),
            id: id_str,
        })?;

        Ok(row.into_resource(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> CanopyResult<Resource> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('resource', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "resource".into(),
            id: id_str,
        })?;

        Ok(row.into_resource(id)?)
    }

    async fn get_root(&self, tenant_id: Uuid) -> CanopyResult<Resource> {
        let tenant_id_str = tenant_id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM resource \
                 WHERE tenant_id = $tenant_id AND parent_id = NONE \
                 ORDER BY created_at ASC LIMIT 1",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant root".into(),
            id: tenant_id_str,
        })?;

        Ok(row.try_into_resource()?)
    }

    async fn list_by_tenant(&self, tenant_id: Uuid) -> CanopyResult<Vec<Resource>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM resource \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithId> = result.take(0).map_err(DbError::from)?;
        collect(rows)
    }

    async fn get_children(&self, parent_id: Uuid) -> CanopyResult<Vec<Resource>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM resource \
                 WHERE parent_id = $parent_id \
                 ORDER BY created_at ASC",
            )
            .bind(("parent_id", parent_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ResourceRowWithId> = result.take(0).map_err(DbError::from)?;
        collect(rows)
    }

    async fn exists_by_path(&self, tenant_id: Uuid, path: &str) -> CanopyResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM resource \
                 WHERE tenant_id = $tenant_id AND path = $path GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("path", path.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }

    async fn delete(&self, id: Uuid) -> CanopyResult<()> {
        // Bindings attached here go first, then the record.
        self.db
            .query(
                "DELETE has_role WHERE resource_id = $id; \
                 DELETE type::record('resource', $id);",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn relocate(
        &self,
        id: Uuid,
        new_parent_id: Uuid,
        paths: Vec<(Uuid, String)>,
    ) -> CanopyResult<Resource> {
        let updates: Vec<PathUpdate> = paths
            .into_iter()
            .map(|(id, path)| PathUpdate {
                id: id.to_string(),
                path,
            })
            .collect();

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE type::record('resource', $id) SET parent_id = $parent_id; \
                 FOR $update IN $updates { \
                     UPDATE type::record('resource', $update.id) SET path = $update.path; \
                 }; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("parent_id", new_parent_id.to_string()))
            .bind(("updates", updates))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write("resource", e))?;

        self.get_by_id(id).await
    }
}
