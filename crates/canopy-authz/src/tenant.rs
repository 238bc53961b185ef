//! Tenant bootstrap and tenant-level queries.

use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::audit::{AuditLogEntry, AuditOutcome};
pub use canopy_core::models::tenant::BootstrappedTenant;
use canopy_core::models::tenant::{CreateTenant, Tenant, TenantBootstrap, TenantStatus};
use canopy_core::repository::{
    AuditLogFilter, PaginatedResult, Pagination, ResourceRepository, RoleRepository, Stores,
    TenantRepository, UserRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditService};
use crate::catalog::permissions::{AUDIT_READ, TENANT_CREATE, TENANT_LIST, TENANT_READ};
use crate::catalog::roles::PLATFORM_ADMIN;
use crate::config::AuthzConfig;
use crate::service::AuthorizationService;

pub struct TenantService<S: Stores> {
    stores: S,
    authz: AuthorizationService<S::Resources, S::Bindings>,
    audit: AuditService<S::AuditLog>,
    config: AuthzConfig,
}

impl<S: Stores> TenantService<S> {
    pub fn new(stores: S, config: AuthzConfig) -> Self {
        Self {
            authz: AuthorizationService::from_stores(&stores, config.clone()),
            audit: AuditService::new(stores.audit_log().clone()),
            stores,
            config,
        }
    }

    /// Create a tenant, its root resource, and bind `creator_id` as
    /// tenant admin on that root.
    ///
    /// Performs no permission check: this is the system path used to
    /// create the very first tenant. The tenant, its root and the binding
    /// are written in one transaction.
    pub async fn bootstrap(
        &self,
        name: &str,
        code: &str,
        creator_id: Uuid,
    ) -> CanopyResult<BootstrappedTenant> {
        self.bootstrap_as(name, code, creator_id, &self.config.tenant_admin_role)
            .await
    }

    /// Like [`Self::bootstrap`], but binds `creator_id` as
    /// `PLATFORM_ADMIN` on the new root. This is the only way platform
    /// rights are handed out: no guarded workflow can bind a role whose
    /// permissions the actor does not already hold.
    pub async fn bootstrap_platform(
        &self,
        name: &str,
        code: &str,
        creator_id: Uuid,
    ) -> CanopyResult<BootstrappedTenant> {
        self.bootstrap_as(name, code, creator_id, PLATFORM_ADMIN).await
    }

    async fn bootstrap_as(
        &self,
        name: &str,
        code: &str,
        creator_id: Uuid,
        admin_role: &str,
    ) -> CanopyResult<BootstrappedTenant> {
        let name = name.trim();
        let code = code.trim();
        if name.is_empty() || code.is_empty() {
            return Err(CanopyError::validation("tenant name and code are required"));
        }

        // 1. Creator must exist.
        let creator = self.stores.users().get_by_id(creator_id).await?;

        // 2. Code must be free.
        if self.stores.tenants().exists_by_code(code).await? {
            return Err(CanopyError::AlreadyExists {
                entity: "tenant".into(),
            });
        }

        // 3. The admin role must be seeded.
        let admin_role = self
            .stores
            .roles()
            .find_global_by_name(admin_role)
            .await?
            .ok_or_else(|| CanopyError::not_found("role", admin_role))?;

        // 4. Tenant, root and binding, all or nothing.
        let boot = self
            .stores
            .tenants()
            .bootstrap(TenantBootstrap {
                tenant: CreateTenant {
                    name: name.into(),
                    code: code.into(),
                    status: TenantStatus::Active,
                },
                root_name: name.into(),
                admin_user_id: creator.id,
                admin_role_id: admin_role.id,
            })
            .await?;
        let (tenant, root) = (&boot.tenant, &boot.root);

        info!(
            tenant_id = %tenant.id,
            code = %tenant.code,
            creator = %creator.username,
            role = %admin_role.name,
            "Tenant bootstrapped"
        );

        self.audit
            .record(
                AuditEvent::new("CREATE_TENANT", AuditOutcome::Success)
                    .tenant(tenant.id)
                    .actor(creator.id)
                    .resource(root.id)
                    .target("TENANT", tenant.id)
                    .message(format!("Tenant {} created", tenant.code)),
            )
            .await?;

        Ok(boot)
    }

    /// Create a tenant on behalf of `actor_id`, who must hold
    /// `TENANT_CREATE` and becomes the new tenant's admin.
    pub async fn create_tenant(
        &self,
        actor_id: Uuid,
        name: &str,
        code: &str,
    ) -> CanopyResult<BootstrappedTenant> {
        if let Err(e) = self
            .authz
            .check_global_permission(actor_id, TENANT_CREATE)
            .await
        {
            if e.is_access_denied() {
                self.audit
                    .record_best_effort(
                        AuditEvent::new("CREATE_TENANT", AuditOutcome::Failure)
                            .actor(actor_id)
                            .message(e.to_string()),
                    )
                    .await;
            }
            return Err(e);
        }

        self.bootstrap(name, code, actor_id).await
    }

    pub async fn list_tenants(
        &self,
        actor_id: Uuid,
        pagination: Pagination,
    ) -> CanopyResult<PaginatedResult<Tenant>> {
        self.authz
            .check_global_permission(actor_id, TENANT_LIST)
            .await?;
        self.stores.tenants().list(pagination).await
    }

    /// Read a tenant; requires `TENANT_READ` on its root resource.
    pub async fn get_tenant(&self, actor_id: Uuid, tenant_id: Uuid) -> CanopyResult<Tenant> {
        let tenant = self.stores.tenants().get_by_id(tenant_id).await?;
        let root = self.stores.resources().get_root(tenant.id).await?;
        self.authz
            .check_permission(actor_id, root.id, TENANT_READ)
            .await?;
        Ok(tenant)
    }

    /// Suspend or reactivate a tenant. Platform-level: requires
    /// `TENANT_CREATE`.
    pub async fn set_status(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        status: TenantStatus,
    ) -> CanopyResult<Tenant> {
        self.authz
            .check_global_permission(actor_id, TENANT_CREATE)
            .await?;
        let tenant = self.stores.tenants().set_status(tenant_id, status).await?;

        self.audit
            .record(
                AuditEvent::new("SET_TENANT_STATUS", AuditOutcome::Success)
                    .tenant(tenant.id)
                    .actor(actor_id)
                    .target("TENANT", tenant.id)
                    .message(format!("Status set to {}", status.as_str())),
            )
            .await?;
        Ok(tenant)
    }

    /// A tenant's audit trail; requires `AUDIT_READ` on its root.
    pub async fn audit_log(
        &self,
        actor_id: Uuid,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CanopyResult<PaginatedResult<AuditLogEntry>> {
        let root = self.stores.resources().get_root(tenant_id).await?;
        self.authz
            .check_permission(actor_id, root.id, AUDIT_READ)
            .await?;
        self.audit
            .list(
                AuditLogFilter {
                    tenant_id: Some(tenant_id),
                    ..Default::default()
                },
                pagination,
            )
            .await
    }
}
