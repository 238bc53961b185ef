//! SurrealDB implementation of [`RoleRepository`].
//!
//! Permissions hang off roles as `grants` edges.

use canopy_core::error::CanopyResult;
use canopy_core::models::permission::Permission;
use canopy_core::models::role::{Role, RoleScope};
use canopy_core::repository::RoleRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::permission::PermissionRowWithId;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RoleRow {
    name: String,
    scope: String,
    tenant_id: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
pub(super) struct RoleRowWithId {
    pub(super) record_id: String,
    name: String,
    scope: String,
    tenant_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl RoleRow {
    fn into_role(self, id: Uuid) -> Result<Role, DbError> {
        let scope = RoleScope::parse(&self.scope)
            .ok_or_else(|| DbError::InvalidData(format!("unknown role scope: {}", self.scope)))?;
        let tenant_id = self
            .tenant_id
            .map(|t| Uuid::parse_str(&t))
            .transpose()
            .map_err(|e| DbError::invalid_id("tenant", e))?;
        Ok(Role {
            id,
            name: self.name,
            scope,
            tenant_id,
            created_at: self.created_at,
        })
    }
}

impl RoleRowWithId {
    pub(super) fn try_into_role(self) -> Result<Role, DbError> {
        let id = Uuid::parse_str(&self.record_id).map_err(|e| DbError::invalid_id("role", e))?;
        RoleRow {
            name: self.name,
            scope: self.scope,
            tenant_id: self.tenant_id,
            created_at: self.created_at,
        }
        .into_role(id)
    }
}

fn collect(rows: Vec<RoleRowWithId>) -> CanopyResult<Vec<Role>> {
    rows.into_iter()
        .map(|row| row.try_into_role())
        .collect::<Result<Vec<_>, DbError>>()
        .map_err(Into::into)
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(
        &self,
        name: &str,
        scope: RoleScope,
        tenant_id: Option<Uuid>,
    ) -> CanopyResult<Role> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('role', $id) SET \
                 name = $name, scope = $scope, tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", name.to_string()))
            .bind(("scope", scope.as_str().to_string()))
            .bind(("tenant_id", tenant_id.map(|t| t.to_string())))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_write("role", e))?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;

        Ok(row.into_role(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> CanopyResult<Role> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('role', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;

        Ok(row.into_role(id)?)
    }

    async fn find_global_by_name(&self, name: &str) -> CanopyResult<Option<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE name = $name AND tenant_id = NONE LIMIT 1",
            )
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(|r| r.try_into_role()).transpose()?)
    }

    async fn find_by_name_in_tenant(
        &self,
        name: &str,
        tenant_id: Uuid,
    ) -> CanopyResult<Option<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE name = $name AND tenant_id = $tenant_id LIMIT 1",
            )
            .bind(("name", name.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(|r| r.try_into_role()).transpose()?)
    }

    async fn list_visible_to_tenant(&self, tenant_id: Uuid) -> CanopyResult<Vec<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE tenant_id = NONE OR tenant_id = $tenant_id \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        collect(rows)
    }

    async fn list(&self) -> CanopyResult<Vec<Role>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM role ORDER BY created_at ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        collect(rows)
    }

    async fn delete(&self, id: Uuid) -> CanopyResult<()> {
        let id_str = id.to_string();

        // Grants and bindings first, then the role record.
        let query = format!(
            "DELETE grants WHERE in = role:`{id_str}`; \
             DELETE has_role WHERE out = role:`{id_str}`; \
             DELETE type::record('role', $id);"
        );

        self.db
            .query(query)
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn grant_permission(&self, role_id: Uuid, permission_id: Uuid) -> CanopyResult<()> {
        let role_id_str = role_id.to_string();
        let perm_id_str = permission_id.to_string();

        let query = format!("RELATE role:`{role_id_str}` -> grants -> permission:`{perm_id_str}`;");

        self.db
            .query(query)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write("grant", e))?;

        Ok(())
    }

    async fn revoke_permission(&self, role_id: Uuid, permission_id: Uuid) -> CanopyResult<()> {
        self.db
            .query(
                "DELETE grants WHERE \
                 in = type::record('role', $role_id) AND \
                 out = type::record('permission', $perm_id)",
            )
            .bind(("role_id", role_id.to_string()))
            .bind(("perm_id", permission_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn get_role_permissions(&self, role_id: Uuid) -> CanopyResult<Vec<Permission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE id IN (\
                     SELECT VALUE out FROM grants \
                     WHERE in = type::record('role', $role_id)\
                 ) \
                 ORDER BY name ASC",
            )
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| row.try_into_permission())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
