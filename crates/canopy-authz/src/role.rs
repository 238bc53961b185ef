//! Role definition workflows.

use std::collections::BTreeSet;

use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::audit::AuditOutcome;
use canopy_core::models::role::{CreateRole, GrantedRole, Role, RoleScope};
use canopy_core::repository::{PermissionRepository, ResourceRepository, RoleRepository, Stores};
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditService};
use crate::catalog::permissions::ROLE_CREATE;
use crate::config::AuthzConfig;
use crate::service::AuthorizationService;

pub struct RoleService<S: Stores> {
    stores: S,
    authz: AuthorizationService<S::Resources, S::Bindings>,
    audit: AuditService<S::AuditLog>,
}

impl<S: Stores> RoleService<S> {
    pub fn new(stores: S, config: AuthzConfig) -> Self {
        Self {
            authz: AuthorizationService::from_stores(&stores, config),
            audit: AuditService::new(stores.audit_log().clone()),
            stores,
        }
    }

    /// Define a role and grant it the named permissions.
    ///
    /// Global roles need `ROLE_CREATE` through any binding; tenant roles
    /// need it on the tenant's root. The actor must also hold every
    /// permission the role grants, in the same place, so a role never
    /// carries more than its author has. Names are unique among global
    /// roles and within a tenant.
    pub async fn create_role(&self, actor_id: Uuid, input: CreateRole) -> CanopyResult<GrantedRole> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(CanopyError::validation("role name is required"));
        }

        let (root, existing) = match (input.scope, input.tenant_id) {
            (RoleScope::Global, None) => {
                self.authz
                    .check_global_permission(actor_id, ROLE_CREATE)
                    .await?;
                (None, self.stores.roles().find_global_by_name(name).await?)
            }
            (RoleScope::Tenant, Some(tenant_id)) => {
                let root = self.stores.resources().get_root(tenant_id).await?;
                self.authz
                    .check_permission(actor_id, root.id, ROLE_CREATE)
                    .await?;
                let existing = self
                    .stores
                    .roles()
                    .find_by_name_in_tenant(name, tenant_id)
                    .await?;
                (Some(root), existing)
            }
            (RoleScope::Global, Some(_)) => {
                return Err(CanopyError::validation("a global role has no tenant"));
            }
            (RoleScope::Tenant, None) => {
                return Err(CanopyError::validation("a tenant role needs a tenant"));
            }
        };
        if existing.is_some() {
            return Err(CanopyError::AlreadyExists {
                entity: "role".into(),
            });
        }

        // Resolve every permission before writing anything.
        let wanted: BTreeSet<String> = input
            .permissions
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let mut permissions = Vec::with_capacity(wanted.len());
        for permission in &wanted {
            permissions.push(self.stores.permissions().get_by_name(permission).await?);
        }
        self.authz
            .check_holds_all(actor_id, wanted.iter().map(String::as_str), root.as_ref())
            .await?;

        let tenant_id = root.as_ref().map(|r| r.tenant_id);

        let role = self
            .stores
            .roles()
            .create(name, input.scope, tenant_id)
            .await?;
        for permission in &permissions {
            self.stores
                .roles()
                .grant_permission(role.id, permission.id)
                .await?;
        }

        info!(role_id = %role.id, name = %role.name, scope = role.scope.as_str(), "Role created");

        let mut event = AuditEvent::new("CREATE_ROLE", AuditOutcome::Success)
            .actor(actor_id)
            .target("ROLE", role.id)
            .message(format!("Created role {} with {} permissions", role.name, wanted.len()));
        if let Some(tenant_id) = tenant_id {
            event = event.tenant(tenant_id);
        }
        self.audit.record(event).await?;

        Ok(GrantedRole {
            role,
            permissions: wanted,
        })
    }

    /// Roles usable in a tenant (system roles plus its own), or every
    /// role when no tenant is given.
    pub async fn list_roles(&self, tenant_id: Option<Uuid>) -> CanopyResult<Vec<Role>> {
        match tenant_id {
            Some(tenant_id) => self.stores.roles().list_visible_to_tenant(tenant_id).await,
            None => self.stores.roles().list().await,
        }
    }

    /// A role together with its granted permission names.
    pub async fn get_role(&self, role_id: Uuid) -> CanopyResult<GrantedRole> {
        let role = self.stores.roles().get_by_id(role_id).await?;
        let permissions = self
            .stores
            .roles()
            .get_role_permissions(role.id)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        Ok(GrantedRole { role, permissions })
    }
}
