//! SurrealDB repository implementations.

mod audit;
mod binding;
mod permission;
mod resource;
mod role;
mod tenant;
mod user;

use canopy_core::repository::Stores;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

pub use audit::SurrealAuditLogRepository;
pub use binding::SurrealBindingRepository;
pub use permission::SurrealPermissionRepository;
pub use resource::SurrealResourceRepository;
pub use role::SurrealRoleRepository;
pub use tenant::SurrealTenantRepository;
pub use user::SurrealUserRepository;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Every repository over one SurrealDB connection.
#[derive(Clone)]
pub struct SurrealStores<C: Connection> {
    tenants: SurrealTenantRepository<C>,
    resources: SurrealResourceRepository<C>,
    permissions: SurrealPermissionRepository<C>,
    roles: SurrealRoleRepository<C>,
    users: SurrealUserRepository<C>,
    bindings: SurrealBindingRepository<C>,
    audit_log: SurrealAuditLogRepository<C>,
}

impl<C: Connection> SurrealStores<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            tenants: SurrealTenantRepository::new(db.clone()),
            resources: SurrealResourceRepository::new(db.clone()),
            permissions: SurrealPermissionRepository::new(db.clone()),
            roles: SurrealRoleRepository::new(db.clone()),
            users: SurrealUserRepository::new(db.clone()),
            bindings: SurrealBindingRepository::new(db.clone()),
            audit_log: SurrealAuditLogRepository::new(db),
        }
    }
}

impl<C: Connection + Clone> Stores for SurrealStores<C> {
    type Tenants = SurrealTenantRepository<C>;
    type Resources = SurrealResourceRepository<C>;
    type Permissions = SurrealPermissionRepository<C>;
    type Roles = SurrealRoleRepository<C>;
    type Users = SurrealUserRepository<C>;
    type Bindings = SurrealBindingRepository<C>;
    type AuditLog = SurrealAuditLogRepository<C>;

    fn tenants(&self) -> &Self::Tenants {
        &self.tenants
    }

    fn resources(&self) -> &Self::Resources {
        &self.resources
    }

    fn permissions(&self) -> &Self::Permissions {
        &self.permissions
    }

    fn roles(&self) -> &Self::Roles {
        &self.roles
    }

    fn users(&self) -> &Self::Users {
        &self.users
    }

    fn bindings(&self) -> &Self::Bindings {
        &self.bindings
    }

    fn audit_log(&self) -> &Self::AuditLog {
        &self.audit_log
    }
}
