//! Granting and revoking roles on resources.

use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::audit::AuditOutcome;
use canopy_core::models::binding::{BindingKey, RoleBinding};
use canopy_core::models::resource::Resource;
use canopy_core::models::role::{Role, RoleScope};
use canopy_core::repository::{
    BindingRepository, ResourceRepository, RoleRepository, Stores, UserRepository,
};
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditService};
use crate::catalog::permissions::ASSIGN_ROLE;
use crate::config::AuthzConfig;
use crate::service::AuthorizationService;

pub struct AssignmentService<S: Stores> {
    stores: S,
    authz: AuthorizationService<S::Resources, S::Bindings>,
    audit: AuditService<S::AuditLog>,
}

impl<S: Stores> AssignmentService<S> {
    pub fn new(stores: S, config: AuthzConfig) -> Self {
        Self {
            authz: AuthorizationService::from_stores(&stores, config),
            audit: AuditService::new(stores.audit_log().clone()),
            stores,
        }
    }

    /// Bind `role_id` to `user_id` at `resource_id`.
    ///
    /// The actor needs `ASSIGN_ROLE` on the resource and must hold every
    /// permission of the role there, global-only ones globally. A tenant
    /// role can only be bound inside its own tenant.
    pub async fn assign_role(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
        resource_id: Uuid,
    ) -> CanopyResult<RoleBinding> {
        let resource = self.authorize(actor_id, resource_id, ASSIGN_ROLE).await?;
        let user = self.stores.users().get_by_id(user_id).await?;
        let role = self.stores.roles().get_by_id(role_id).await?;
        ensure_bindable(&role, &resource)?;

        let granted = self.stores.roles().get_role_permissions(role.id).await?;
        if let Err(e) = self
            .authz
            .check_holds_all(
                actor_id,
                granted.iter().map(|p| p.name.as_str()),
                Some(&resource),
            )
            .await
        {
            self.audit_denial(ASSIGN_ROLE, actor_id, &resource, &e).await;
            return Err(e);
        }

        let binding = self
            .stores
            .bindings()
            .create(BindingKey {
                user_id: user.id,
                role_id: role.id,
                resource_id: resource.id,
            })
            .await?;

        info!(
            user = %user.username,
            role = %role.name,
            path = %resource.path,
            "Role assigned"
        );

        self.audit
            .record(
                AuditEvent::new(ASSIGN_ROLE, AuditOutcome::Success)
                    .tenant(resource.tenant_id)
                    .actor(actor_id)
                    .resource(resource.id)
                    .target("USER", user.id)
                    .message(format!("Assigned {} to {}", role.name, user.username)),
            )
            .await?;

        Ok(binding)
    }

    /// Remove a binding. Same authorization as [`Self::assign_role`];
    /// `NotFound` when the triple is not bound.
    pub async fn revoke_role(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
        resource_id: Uuid,
    ) -> CanopyResult<()> {
        let resource = self.authorize(actor_id, resource_id, "REVOKE_ROLE").await?;

        self.stores
            .bindings()
            .delete(BindingKey {
                user_id,
                role_id,
                resource_id: resource.id,
            })
            .await?;

        self.audit
            .record(
                AuditEvent::new("REVOKE_ROLE", AuditOutcome::Success)
                    .tenant(resource.tenant_id)
                    .actor(actor_id)
                    .resource(resource.id)
                    .target("USER", user_id)
                    .message(format!("Revoked role {role_id}")),
            )
            .await?;
        Ok(())
    }

    async fn authorize(
        &self,
        actor_id: Uuid,
        resource_id: Uuid,
        action: &str,
    ) -> CanopyResult<Resource> {
        let resource = self.stores.resources().get_by_id(resource_id).await?;

        if let Err(e) = self
            .authz
            .check_permission(actor_id, resource.id, ASSIGN_ROLE)
            .await
        {
            self.audit_denial(action, actor_id, &resource, &e).await;
            return Err(e);
        }
        Ok(resource)
    }

    async fn audit_denial(&self, action: &str, actor_id: Uuid, resource: &Resource, err: &CanopyError) {
        if !err.is_access_denied() {
            return;
        }
        self.audit
            .record_best_effort(
                AuditEvent::new(action, AuditOutcome::Failure)
                    .tenant(resource.tenant_id)
                    .actor(actor_id)
                    .resource(resource.id)
                    .message(err.to_string()),
            )
            .await;
    }
}

fn ensure_bindable(role: &Role, resource: &Resource) -> CanopyResult<()> {
    match role.scope {
        RoleScope::Global => Ok(()),
        RoleScope::Tenant if role.tenant_id == Some(resource.tenant_id) => Ok(()),
        RoleScope::Tenant => Err(CanopyError::validation(format!(
            "role {} belongs to another tenant",
            role.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::models::resource::{ROOT_PATH, TENANT_ROOT_TYPE};
    use chrono::Utc;

    fn root(tenant_id: Uuid) -> Resource {
        Resource {
            id: Uuid::new_v4(),
            tenant_id,
            parent_id: None,
            resource_type: TENANT_ROOT_TYPE.into(),
            name: "acme".into(),
            path: ROOT_PATH.into(),
            created_at: Utc::now(),
        }
    }

    fn role(scope: RoleScope, tenant_id: Option<Uuid>) -> Role {
        Role {
            id: Uuid::new_v4(),
            name: "AUDITOR".into(),
            scope,
            tenant_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn global_roles_bind_anywhere() {
        let resource = root(Uuid::new_v4());
        assert!(ensure_bindable(&role(RoleScope::Global, None), &resource).is_ok());
    }

    #[test]
    fn tenant_roles_stay_in_their_tenant() {
        let tenant = Uuid::new_v4();
        let resource = root(tenant);
        assert!(ensure_bindable(&role(RoleScope::Tenant, Some(tenant)), &resource).is_ok());

        let foreign = role(RoleScope::Tenant, Some(Uuid::new_v4()));
        let err = ensure_bindable(&foreign, &resource).unwrap_err();
        assert!(matches!(err, CanopyError::Validation { .. }));
    }
}
