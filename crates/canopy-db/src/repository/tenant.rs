//! SurrealDB implementation of [`TenantRepository`].

use canopy_core::error::CanopyResult;
use canopy_core::models::binding::RoleBinding;
use canopy_core::models::resource::{ROOT_PATH, TENANT_ROOT_TYPE};
use canopy_core::models::tenant::{
    BootstrappedTenant, CreateTenant, Tenant, TenantBootstrap, TenantStatus,
};
use canopy_core::repository::{PaginatedResult, Pagination, ResourceRepository, TenantRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use super::resource::SurrealResourceRepository;
use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct TenantRow {
    name: String,
    code: String,
    status: String,
    created_at: DateTime<Utc>,
}

fn parse_status(s: &str) -> Result<TenantStatus, DbError> {
    TenantStatus::parse(s).ok_or_else(|| DbError::InvalidData(format!("unknown tenant status: {s}")))
}

impl TenantRow {
    fn into_tenant(self, id: Uuid) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id,
            status: parse_status(&self.status)?,
            name: self.name,
            code: self.code,
            created_at: self.created_at,
        })
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct TenantRowWithId {
    record_id: String,
    name: String,
    code: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TenantRowWithId {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        let id = Uuid::parse_str(&self.record_id).map_err(|e| DbError::invalid_id("tenant", e))?;
        Ok(Tenant {
            id,
            status: parse_status(&self.status)?,
            name: self.name,
            code: self.code,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct AssignedRow {
    assigned_at: DateTime<Utc>,
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> CanopyResult<Tenant> {
        if self.exists_by_code(&input.code).await? {
            return Err(DbError::Duplicate {
                entity: "tenant".into(),
            }
            .into());
        }

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('tenant', $id) SET \
                 name = $name, code = $code, status = $status",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("code", input.code))
            .bind(("status", input.status.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_write("tenant", e))?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> CanopyResult<Tenant> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('tenant', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(id)?)
    }

    async fn bootstrap(&self, input: TenantBootstrap) -> CanopyResult<BootstrappedTenant> {
        if self.exists_by_code(&input.tenant.code).await? {
            return Err(DbError::Duplicate {
                entity: "tenant".into(),
            }
            .into());
        }

        let tenant_id = Uuid::new_v4();
        let root_id = Uuid::new_v4();
        let user_id_str = input.admin_user_id.to_string();
        let role_id_str = input.admin_role_id.to_string();

        let query = format!(
            "BEGIN TRANSACTION; \
             CREATE type::record('tenant', $tenant_id) SET \
             name = $name, code = $code, status = $status; \
             CREATE type::record('resource', $root_id) SET \
             tenant_id = $tenant_id, parent_id = NONE, \
             resource_type = $root_type, name = $root_name, path = $root_path; \
             RELATE user:`{user_id_str}` -> has_role -> role:`{role_id_str}` \
             SET resource_id = $root_id; \
             COMMIT TRANSACTION;"
        );

        self.db
            .query(query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("name", input.tenant.name))
            .bind(("code", input.tenant.code))
            .bind(("status", input.tenant.status.as_str().to_string()))
            .bind(("root_id", root_id.to_string()))
            .bind(("root_type", TENANT_ROOT_TYPE.to_string()))
            .bind(("root_name", input.root_name))
            .bind(("root_path", ROOT_PATH.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_write("tenant", e))?;

        let tenant = self.get_by_id(tenant_id).await?;
        let root = SurrealResourceRepository::new(self.db.clone())
            .get_by_id(root_id)
            .await?;

        let mut result = self
            .db
            .query(
                "SELECT assigned_at FROM has_role WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('role', $role_id) AND \
                 resource_id = $resource_id",
            )
            .bind(("user_id", user_id_str.clone()))
            .bind(("role_id", role_id_str.clone()))
            .bind(("resource_id", root_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<AssignedRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role binding".into(),
            id: format!("{user_id_str}/{role_id_str}/{root_id}"),
        })?;

        Ok(BootstrappedTenant {
            tenant,
            root,
            admin_binding: RoleBinding {
                user_id: input.admin_user_id,
                role_id: input.admin_role_id,
                resource_id: root_id,
                assigned_at: row.assigned_at,
            },
        })
    }

    async fn get_by_code(&self, code: &str) -> CanopyResult<Tenant> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM tenant WHERE code = $code")
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: format!("code={code}"),
        })?;

        Ok(row.try_into_tenant()?)
    }

    async fn exists_by_code(&self, code: &str) -> CanopyResult<bool> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM tenant WHERE code = $code GROUP ALL")
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }

    async fn set_status(&self, id: Uuid, status: TenantStatus) -> CanopyResult<Tenant> {
        let id_str = id.to_string();

        let result = self
            .db
            .query("UPDATE type::record('tenant', $id) SET status = $status")
            .bind(("id", id_str.clone()))
            .bind(("status", status.as_str().to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.into_tenant(id)?)
    }

    async fn list(&self, pagination: Pagination) -> CanopyResult<PaginatedResult<Tenant>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM tenant GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_tenant())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
