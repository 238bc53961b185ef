//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. These are the stores the
//! authorization engine reads from; none of them is consulted by the
//! engine directly, only through the snapshots built by the services.

use uuid::Uuid;

use crate::error::CanopyResult;
use crate::models::{
    audit::{AuditLogEntry, AuditOutcome, CreateAuditLogEntry},
    binding::{BindingKey, EffectiveBinding, RoleBinding},
    permission::{CreatePermission, Permission},
    resource::{CreateResource, Resource},
    role::{Role, RoleScope},
    tenant::{BootstrappedTenant, CreateTenant, Tenant, TenantBootstrap, TenantStatus},
    user::{CreateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants & resource trees
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the code is taken.
    fn create(&self, input: CreateTenant) -> impl Future<Output = CanopyResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CanopyResult<Tenant>> + Send;

    /// Create the tenant, its root resource and the admin binding on the
    /// root in one transaction. Nothing is written when any part fails.
    fn bootstrap(
        &self,
        input: TenantBootstrap,
    ) -> impl Future<Output = CanopyResult<BootstrappedTenant>> + Send;
    fn get_by_code(&self, code: &str) -> impl Future<Output = CanopyResult<Tenant>> + Send;
    fn exists_by_code(&self, code: &str) -> impl Future<Output = CanopyResult<bool>> + Send;
    fn set_status(
        &self,
        id: Uuid,
        status: TenantStatus,
    ) -> impl Future<Output = CanopyResult<Tenant>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = CanopyResult<PaginatedResult<Tenant>>> + Send;
}

pub trait ResourceRepository: Send + Sync {
    fn create(&self, input: CreateResource)
    -> impl Future<Output = CanopyResult<Resource>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CanopyResult<Resource>> + Send;

    /// The tenant's root resource (the one without a parent).
    fn get_root(&self, tenant_id: Uuid) -> impl Future<Output = CanopyResult<Resource>> + Send;

    /// Every resource of a tenant, in creation order.
    fn list_by_tenant(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = CanopyResult<Vec<Resource>>> + Send;

    /// Direct children of a resource.
    fn get_children(
        &self,
        parent_id: Uuid,
    ) -> impl Future<Output = CanopyResult<Vec<Resource>>> + Send;

    fn exists_by_path(
        &self,
        tenant_id: Uuid,
        path: &str,
    ) -> impl Future<Output = CanopyResult<bool>> + Send;

    /// Deletes the resource and every binding attached to it.
    fn delete(&self, id: Uuid) -> impl Future<Output = CanopyResult<()>> + Send;

    /// Re-parent `id` under `new_parent_id` and rewrite the paths of the
    /// moved subtree, in one transaction. `paths` holds the new path of
    /// every moved resource, `id` included.
    fn relocate(
        &self,
        id: Uuid,
        new_parent_id: Uuid,
        paths: Vec<(Uuid, String)>,
    ) -> impl Future<Output = CanopyResult<Resource>> + Send;
}

// ---------------------------------------------------------------------------
// Permissions & roles
// ---------------------------------------------------------------------------

pub trait PermissionRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePermission,
    ) -> impl Future<Output = CanopyResult<Permission>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = CanopyResult<Permission>> + Send;
    fn list(&self) -> impl Future<Output = CanopyResult<Vec<Permission>>> + Send;
}

pub trait RoleRepository: Send + Sync {
    /// Creates the role record only; permissions are granted separately.
    fn create(
        &self,
        name: &str,
        scope: RoleScope,
        tenant_id: Option<Uuid>,
    ) -> impl Future<Output = CanopyResult<Role>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CanopyResult<Role>> + Send;

    /// Look up a system role (no owning tenant) by name.
    fn find_global_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = CanopyResult<Option<Role>>> + Send;

    /// Look up a tenant's custom role by name.
    fn find_by_name_in_tenant(
        &self,
        name: &str,
        tenant_id: Uuid,
    ) -> impl Future<Output = CanopyResult<Option<Role>>> + Send;

    /// System roles plus the given tenant's custom roles.
    fn list_visible_to_tenant(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = CanopyResult<Vec<Role>>> + Send;
    fn list(&self) -> impl Future<Output = CanopyResult<Vec<Role>>> + Send;

    /// Deletes the role, its grants and every binding that uses it.
    fn delete(&self, id: Uuid) -> impl Future<Output = CanopyResult<()>> + Send;

    /// Grant a permission to a role (creates a `grants` edge).
    fn grant_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = CanopyResult<()>> + Send;

    /// Revoke a permission from a role.
    fn revoke_permission(
        &self,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> impl Future<Output = CanopyResult<()>> + Send;

    /// Get all permissions granted to a role.
    fn get_role_permissions(
        &self,
        role_id: Uuid,
    ) -> impl Future<Output = CanopyResult<Vec<Permission>>> + Send;
}

// ---------------------------------------------------------------------------
// Users & bindings
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the username or email is taken.
    fn create(&self, input: CreateUser) -> impl Future<Output = CanopyResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CanopyResult<User>> + Send;
    fn get_by_username(&self, username: &str)
    -> impl Future<Output = CanopyResult<User>> + Send;
    fn set_enabled(
        &self,
        id: Uuid,
        enabled: bool,
    ) -> impl Future<Output = CanopyResult<User>> + Send;

    /// Deletes the user and every binding held by the user.
    fn delete(&self, id: Uuid) -> impl Future<Output = CanopyResult<()>> + Send;
}

pub trait BindingRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the triple is already bound.
    fn create(&self, key: BindingKey) -> impl Future<Output = CanopyResult<RoleBinding>> + Send;
    fn exists(&self, key: BindingKey) -> impl Future<Output = CanopyResult<bool>> + Send;

    /// Fails with `NotFound` when the triple is not bound.
    fn delete(&self, key: BindingKey) -> impl Future<Output = CanopyResult<()>> + Send;

    /// Every binding held by the user, each with its role's permission set.
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = CanopyResult<Vec<EffectiveBinding>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub tenant_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub outcome: Option<AuditOutcome>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = CanopyResult<AuditLogEntry>> + Send;
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CanopyResult<PaginatedResult<AuditLogEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Store bundle
// ---------------------------------------------------------------------------

/// Every repository of one backend, handed to services as a unit.
///
/// Repositories are cheap to clone (they share one connection), so
/// services clone out the ones they keep.
pub trait Stores: Clone + Send + Sync {
    type Tenants: TenantRepository + Clone;
    type Resources: ResourceRepository + Clone;
    type Permissions: PermissionRepository + Clone;
    type Roles: RoleRepository + Clone;
    type Users: UserRepository + Clone;
    type Bindings: BindingRepository + Clone;
    type AuditLog: AuditLogRepository + Clone;

    fn tenants(&self) -> &Self::Tenants;
    fn resources(&self) -> &Self::Resources;
    fn permissions(&self) -> &Self::Permissions;
    fn roles(&self) -> &Self::Roles;
    fn users(&self) -> &Self::Users;
    fn bindings(&self) -> &Self::Bindings;
    fn audit_log(&self) -> &Self::AuditLog;
}
