//! Resource tree workflows.

use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::audit::AuditOutcome;
use std::collections::{HashMap, HashSet};

use canopy_core::models::resource::{CreateResource, Resource, ResourceNode, child_path};
use canopy_core::repository::{ResourceRepository, Stores};
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditService};
use crate::catalog::permissions::{DELETE, READ, RESOURCE_CREATE, WRITE};
use crate::config::AuthzConfig;
use crate::service::AuthorizationService;

pub struct ResourceService<S: Stores> {
    stores: S,
    authz: AuthorizationService<S::Resources, S::Bindings>,
    audit: AuditService<S::AuditLog>,
}

impl<S: Stores> ResourceService<S> {
    pub fn new(stores: S, config: AuthzConfig) -> Self {
        Self {
            authz: AuthorizationService::from_stores(&stores, config),
            audit: AuditService::new(stores.audit_log().clone()),
            stores,
        }
    }

    /// Create a child of `parent_id`; requires `RESOURCE_CREATE` on the
    /// parent or one of its ancestors.
    ///
    /// A denial is written to the audit log before it is returned.
    pub async fn create_child(
        &self,
        actor_id: Uuid,
        parent_id: Uuid,
        name: &str,
        resource_type: &str,
    ) -> CanopyResult<Resource> {
        let parent = self.stores.resources().get_by_id(parent_id).await?;

        let name = name.trim();
        let resource_type = resource_type.trim();
        if name.is_empty() || resource_type.is_empty() {
            return Err(CanopyError::validation("resource name and type are required"));
        }
        if name.contains('/') {
            return Err(CanopyError::validation("resource name must not contain '/'"));
        }

        self.authorize("CREATE_RESOURCE", actor_id, &parent, RESOURCE_CREATE)
            .await?;

        let path = child_path(&parent.path, name);
        if self
            .stores
            .resources()
            .exists_by_path(parent.tenant_id, &path)
            .await?
        {
            return Err(CanopyError::AlreadyExists {
                entity: "resource".into(),
            });
        }

        let child = self
            .stores
            .resources()
            .create(CreateResource {
                tenant_id: parent.tenant_id,
                parent_id: Some(parent.id),
                resource_type: resource_type.into(),
                name: name.into(),
                path,
            })
            .await?;

        info!(resource_id = %child.id, path = %child.path, "Resource created");

        self.audit
            .record(
                AuditEvent::new("CREATE_RESOURCE", AuditOutcome::Success)
                    .tenant(child.tenant_id)
                    .actor(actor_id)
                    .resource(parent.id)
                    .target("RESOURCE", child.id)
                    .message(format!("Created {} at {}", child.resource_type, child.path)),
            )
            .await?;

        Ok(child)
    }

    pub async fn get(&self, actor_id: Uuid, resource_id: Uuid) -> CanopyResult<Resource> {
        self.authz
            .check_permission(actor_id, resource_id, READ)
            .await?;
        self.stores.resources().get_by_id(resource_id).await
    }

    pub async fn list_children(
        &self,
        actor_id: Uuid,
        parent_id: Uuid,
    ) -> CanopyResult<Vec<Resource>> {
        self.authz
            .check_permission(actor_id, parent_id, READ)
            .await?;
        self.stores.resources().get_children(parent_id).await
    }

    /// The tenant's whole hierarchy, nested under its root. Requires
    /// `READ` on the root.
    pub async fn tree(&self, actor_id: Uuid, tenant_id: Uuid) -> CanopyResult<ResourceNode> {
        let root = self.stores.resources().get_root(tenant_id).await?;
        self.authz
            .check_permission(actor_id, root.id, READ)
            .await?;

        let all = self.stores.resources().list_by_tenant(tenant_id).await?;
        let mut children = children_by_parent(all);
        let mut seen = HashSet::new();
        Ok(build_node(root, &mut children, &mut seen))
    }

    /// Re-parent a resource inside its tenant, carrying its subtree along.
    ///
    /// Requires `WRITE` on the resource and `RESOURCE_CREATE` on the new
    /// parent. Roots cannot move, and a resource cannot move under itself
    /// or one of its descendants. Every path in the subtree is rewritten.
    pub async fn move_to(
        &self,
        actor_id: Uuid,
        resource_id: Uuid,
        new_parent_id: Uuid,
    ) -> CanopyResult<Resource> {
        let resource = self.stores.resources().get_by_id(resource_id).await?;
        let parent = self.stores.resources().get_by_id(new_parent_id).await?;
        if resource.is_root() {
            return Err(CanopyError::validation("a tenant root cannot be moved"));
        }
        if parent.tenant_id != resource.tenant_id {
            return Err(CanopyError::validation("resources cannot move between tenants"));
        }

        self.authorize("MOVE_RESOURCE", actor_id, &resource, WRITE).await?;
        self.authorize("MOVE_RESOURCE", actor_id, &parent, RESOURCE_CREATE)
            .await?;

        if resource.parent_id == Some(parent.id) {
            return Ok(resource);
        }

        let all = self
            .stores
            .resources()
            .list_by_tenant(resource.tenant_id)
            .await?;
        let mut children = children_by_parent(all);
        let new_path = child_path(&parent.path, &resource.name);
        let mut paths = vec![(resource.id, new_path.clone())];
        let mut pending = vec![(resource.id, new_path.clone())];
        let mut seen = HashSet::from([resource.id]);
        while let Some((id, path)) = pending.pop() {
            for child in children.remove(&id).unwrap_or_default() {
                if !seen.insert(child.id) {
                    continue;
                }
                let moved = child_path(&path, &child.name);
                paths.push((child.id, moved.clone()));
                pending.push((child.id, moved));
            }
        }
        if seen.contains(&parent.id) {
            return Err(CanopyError::validation(
                "a resource cannot move under itself or its descendants",
            ));
        }

        if self
            .stores
            .resources()
            .exists_by_path(resource.tenant_id, &new_path)
            .await?
        {
            return Err(CanopyError::AlreadyExists {
                entity: "resource".into(),
            });
        }

        let moved_count = paths.len();
        let moved = self
            .stores
            .resources()
            .relocate(resource.id, parent.id, paths)
            .await?;

        info!(
            resource_id = %moved.id,
            from = %resource.path,
            to = %moved.path,
            moved_count,
            "Resource moved"
        );

        self.audit
            .record(
                AuditEvent::new("MOVE_RESOURCE", AuditOutcome::Success)
                    .tenant(moved.tenant_id)
                    .actor(actor_id)
                    .resource(parent.id)
                    .target("RESOURCE", moved.id)
                    .message(format!("Moved {} to {}", resource.path, moved.path)),
            )
            .await?;

        Ok(moved)
    }

    /// Delete a leaf resource; requires `DELETE` on it. Roots and
    /// resources with children are refused.
    pub async fn delete(&self, actor_id: Uuid, resource_id: Uuid) -> CanopyResult<()> {
        self.authz
            .check_permission(actor_id, resource_id, DELETE)
            .await?;

        let resource = self.stores.resources().get_by_id(resource_id).await?;
        if resource.is_root() {
            return Err(CanopyError::validation("a tenant root cannot be deleted"));
        }
        if !self
            .stores
            .resources()
            .get_children(resource.id)
            .await?
            .is_empty()
        {
            return Err(CanopyError::validation("resource still has children"));
        }

        self.stores.resources().delete(resource.id).await?;

        self.audit
            .record(
                AuditEvent::new("DELETE_RESOURCE", AuditOutcome::Success)
                    .tenant(resource.tenant_id)
                    .actor(actor_id)
                    .target("RESOURCE", resource.id)
                    .message(format!("Deleted {}", resource.path)),
            )
            .await?;
        Ok(())
    }

    /// Check `permission` on `resource`, writing a denial to the audit
    /// log under `action` before returning it.
    async fn authorize(
        &self,
        action: &str,
        actor_id: Uuid,
        resource: &Resource,
        permission: &str,
    ) -> CanopyResult<()> {
        let result = self
            .authz
            .check_permission(actor_id, resource.id, permission)
            .await;
        if let Err(e) = &result
            && e.is_access_denied()
        {
            self.audit
                .record_best_effort(
                    AuditEvent::new(action, AuditOutcome::Failure)
                        .tenant(resource.tenant_id)
                        .actor(actor_id)
                        .resource(resource.id)
                        .message(e.to_string()),
                )
                .await;
        }
        result
    }
}

fn children_by_parent(resources: Vec<Resource>) -> HashMap<Uuid, Vec<Resource>> {
    let mut children: HashMap<Uuid, Vec<Resource>> = HashMap::new();
    for resource in resources {
        if let Some(parent_id) = resource.parent_id {
            children.entry(parent_id).or_default().push(resource);
        }
    }
    children
}

/// Resources not reachable from `resource` are left out; a resource is
/// placed at most once.
fn build_node(
    resource: Resource,
    children: &mut HashMap<Uuid, Vec<Resource>>,
    seen: &mut HashSet<Uuid>,
) -> ResourceNode {
    seen.insert(resource.id);
    let mut node = ResourceNode {
        children: Vec::new(),
        resource,
    };
    for child in children.remove(&node.resource.id).unwrap_or_default() {
        if seen.contains(&child.id) {
            continue;
        }
        node.children.push(build_node(child, children, seen));
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn res(id: u128, parent: Option<u128>, name: &str) -> Resource {
        Resource {
            id: Uuid::from_u128(id),
            tenant_id: Uuid::from_u128(100),
            parent_id: parent.map(Uuid::from_u128),
            resource_type: "NODE".into(),
            name: name.into(),
            path: format!("/{name}"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let all = vec![
            res(1, None, "root"),
            res(2, Some(1), "eng"),
            res(3, Some(2), "api"),
            res(4, Some(1), "ops"),
        ];
        let root = all[0].clone();
        let mut children = children_by_parent(all);
        let tree = build_node(root, &mut children, &mut HashSet::new());

        assert_eq!(tree.size(), 4);
        assert_eq!(tree.children.len(), 2);
        let eng = tree.find(Uuid::from_u128(2)).unwrap();
        assert_eq!(eng.children[0].resource.name, "api");
    }

    #[test]
    fn tree_skips_cycles_and_orphans() {
        let all = vec![
            res(1, None, "root"),
            res(2, Some(1), "a"),
            res(3, Some(2), "b"),
            // b -> a -> b loop below the root, and an orphan.
            res(2, Some(3), "a"),
            res(9, Some(42), "orphan"),
        ];
        let root = all[0].clone();
        let mut children = children_by_parent(all);
        let tree = build_node(root, &mut children, &mut HashSet::new());

        assert_eq!(tree.size(), 3);
        assert!(tree.find(Uuid::from_u128(9)).is_none());
    }
}
