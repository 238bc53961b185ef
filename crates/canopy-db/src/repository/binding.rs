//! SurrealDB implementation of [`BindingRepository`].
//!
//! A binding is a `has_role` edge from a user to a role, carrying the
//! id of the resource it is attached to.

use std::collections::HashMap;

use canopy_core::error::CanopyResult;
use canopy_core::models::binding::{BindingKey, EffectiveBinding, RoleBinding};
use canopy_core::models::role::{GrantedRole, Role, RoleScope};
use canopy_core::repository::BindingRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::CountRow;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct EdgeRow {
    assigned_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct BindingRow {
    role_id: String,
    resource_id: String,
    assigned_at: DateTime<Utc>,
}

/// A bound role together with the names of its granted permissions.
#[derive(Debug, SurrealValue)]
struct BoundRoleRow {
    record_id: String,
    name: String,
    scope: String,
    tenant_id: Option<String>,
    created_at: DateTime<Utc>,
    permissions: Vec<String>,
}

impl BoundRoleRow {
    fn try_into_granted(self) -> Result<(String, GrantedRole), DbError> {
        let id = Uuid::parse_str(&self.record_id).map_err(|e| DbError::invalid_id("role", e))?;
        let scope = RoleScope::parse(&self.scope)
            .ok_or_else(|| DbError::InvalidData(format!("unknown role scope: {}", self.scope)))?;
        let tenant_id = self
            .tenant_id
            .map(|t| Uuid::parse_str(&t))
            .transpose()
            .map_err(|e| DbError::invalid_id("tenant", e))?;
        let role = Role {
            id,
            name: self.name,
            scope,
            tenant_id,
            created_at: self.created_at,
        };
        Ok((
            self.record_id,
            GrantedRole {
                role,
                permissions: self.permissions.into_iter().collect(),
            },
        ))
    }
}

/// SurrealDB implementation of the Binding repository.
#[derive(Clone)]
pub struct SurrealBindingRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealBindingRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> BindingRepository for SurrealBindingRepository<C> {
    async fn create(&self, key: BindingKey) -> CanopyResult<RoleBinding> {
        if self.exists(key).await? {
            return Err(DbError::Duplicate {
                entity: "role binding".into(),
            }
            .into());
        }

        let user_id_str = key.user_id.to_string();
        let role_id_str = key.role_id.to_string();

        let query = format!(
            "RELATE user:`{user_id_str}` -> has_role -> role:`{role_id_str}` \
             SET resource_id = $resource_id;"
        );

        let result = self
            .db
            .query(query)
            .bind(("resource_id", key.resource_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_write("role binding", e))?;

        let rows: Vec<EdgeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role binding".into(),
            id: format!("{user_id_str}/{role_id_str}/{}", key.resource_id),
        })?;

        Ok(RoleBinding {
            user_id: key.user_id,
            role_id: key.role_id,
            resource_id: key.resource_id,
            assigned_at: row.assigned_at,
        })
    }

    async fn exists(&self, key: BindingKey) -> CanopyResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM has_role WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('role', $role_id) AND \
                 resource_id = $resource_id GROUP ALL",
            )
            .bind(("user_id", key.user_id.to_string()))
            .bind(("role_id", key.role_id.to_string()))
            .bind(("resource_id", key.resource_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().is_some_and(|r| r.total > 0))
    }

    async fn delete(&self, key: BindingKey) -> CanopyResult<()> {
        if !self.exists(key).await? {
            return Err(DbError::NotFound {
                entity: "role binding".into(),
                id: format!("{}/{}/{}", key.user_id, key.role_id, key.resource_id),
            }
            .into());
        }

        self.db
            .query(
                "DELETE has_role WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('role', $role_id) AND \
                 resource_id = $resource_id",
            )
            .bind(("user_id", key.user_id.to_string()))
            .bind(("role_id", key.role_id.to_string()))
            .bind(("resource_id", key.resource_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> CanopyResult<Vec<EffectiveBinding>> {
        // Statement 0: the edges. Statement 1: each bound role once, with
        // its permission names.
        let mut result = self
            .db
            .query(
                "SELECT meta::id(out) AS role_id, resource_id, assigned_at \
                 FROM has_role \
                 WHERE in = type::record('user', $user_id) \
                 ORDER BY assigned_at ASC; \
                 SELECT meta::id(id) AS record_id, *, \
                 ->grants->permission.name AS permissions \
                 FROM role \
                 WHERE id IN (\
                     SELECT VALUE out FROM has_role \
                     WHERE in = type::record('user', $user_id)\
                 );",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let edges: Vec<BindingRow> = result.take(0).map_err(DbError::from)?;
        let roles: Vec<BoundRoleRow> = result.take(1).map_err(DbError::from)?;

        let roles = roles
            .into_iter()
            .map(|row| row.try_into_granted())
            .collect::<Result<HashMap<_, _>, DbError>>()?;

        let mut bindings = Vec::with_capacity(edges.len());
        for edge in edges {
            // Edges whose role has vanished grant nothing.
            let Some(role) = roles.get(&edge.role_id) else {
                continue;
            };
            let resource_id = Uuid::parse_str(&edge.resource_id)
                .map_err(|e| DbError::invalid_id("resource", e))?;
            bindings.push(EffectiveBinding {
                user_id,
                resource_id,
                role: role.clone(),
                assigned_at: edge.assigned_at,
            });
        }

        Ok(bindings)
    }
}
