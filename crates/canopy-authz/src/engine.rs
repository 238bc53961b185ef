//! The authorization decision engine.
//!
//! Answers "may user U exercise permission P on resource R?" by walking
//! from R towards its tenant root and looking, at every level, for a
//! binding on exactly that resource whose role carries P. Grants on an
//! ancestor therefore apply to every descendant, never the other way
//! round, and the first match found wins.
//!
//! The engine is synchronous and holds nothing but borrowed snapshots:
//! it never writes, never blocks and performs no I/O. Every walk is
//! bounded by the number of distinct resources on the chain, even when
//! the parent links form a loop.
//!
//! No role name is special. A role called `ADMIN` grants exactly the
//! permissions in its permission set.

use std::collections::HashSet;

use canopy_core::models::resource::Resource;
use tracing::trace;
use uuid::Uuid;

use crate::bindings::BindingSource;
use crate::error::AuthzError;
use crate::observer::{DecisionObserver, WalkEvent};
use crate::tree::ResourceTree;

/// Why a check was denied. Diagnostic only: every reason means "no".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    MissingTarget,
    BlankPermission,
    NoBindings,
    CycleDetected { resource_id: Uuid },
    NoMatchingBinding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Granted by the binding of `role_id` on `resource_id`.
    Granted { resource_id: Uuid, role_id: Uuid },
    Denied(DenyReason),
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Inputs that are denied before any store is consulted.
pub fn precheck(permission: &str, target: Option<&Resource>) -> Option<DenyReason> {
    if target.is_none() {
        Some(DenyReason::MissingTarget)
    } else if permission.trim().is_empty() {
        Some(DenyReason::BlankPermission)
    } else {
        None
    }
}

pub struct AuthorizationEngine<'a, B: ?Sized, T: ?Sized> {
    bindings: &'a B,
    tree: &'a T,
    observer: Option<&'a dyn DecisionObserver>,
}

impl<'a, B, T> AuthorizationEngine<'a, B, T>
where
    B: BindingSource + ?Sized,
    T: ResourceTree + ?Sized,
{
    pub fn new(bindings: &'a B, tree: &'a T) -> Self {
        Self {
            bindings,
            tree,
            observer: None,
        }
    }

    /// Report every step of the following checks to `observer`.
    pub fn with_observer(mut self, observer: &'a dyn DecisionObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    fn emit(&self, event: WalkEvent<'_>) {
        if let Some(observer) = self.observer {
            observer.on_event(&event);
        }
    }

    fn finish(&self, decision: Decision) -> Decision {
        self.emit(WalkEvent::Finished {
            decision: &decision,
        });
        decision
    }

    /// Resource-scoped decision with inheritance along the parent chain.
    pub fn decide(&self, user_id: Uuid, permission: &str, target: Option<&Resource>) -> Decision {
        self.emit(WalkEvent::Started {
            user_id,
            permission,
            target: target.map(|r| r.id),
        });

        if let Some(reason) = precheck(permission, target) {
            return self.finish(Decision::Denied(reason));
        }
        let Some(target) = target else {
            return self.finish(Decision::Denied(DenyReason::MissingTarget));
        };

        let bindings = self.bindings.bindings_for_user(user_id);
        if bindings.is_empty() {
            return self.finish(Decision::Denied(DenyReason::NoBindings));
        }

        let mut visited = HashSet::new();
        let mut current = Some(target);
        let mut depth = 0;

        while let Some(resource) = current {
            if !visited.insert(resource.id) {
                self.emit(WalkEvent::CycleDetected {
                    resource_id: resource.id,
                });
                return self.finish(Decision::Denied(DenyReason::CycleDetected {
                    resource_id: resource.id,
                }));
            }
            self.emit(WalkEvent::Visit { resource, depth });

            let matched = bindings
                .iter()
                .find(|b| b.resource_id == resource.id && b.role.grants(permission));
            if let Some(binding) = matched {
                self.emit(WalkEvent::Matched { binding });
                return self.finish(Decision::Granted {
                    resource_id: resource.id,
                    role_id: binding.role_id(),
                });
            }

            current = self.tree.parent_of(resource);
            depth += 1;
        }

        self.finish(Decision::Denied(DenyReason::NoMatchingBinding))
    }

    /// Unscoped decision: any binding anywhere carrying the permission.
    pub fn decide_global(&self, user_id: Uuid, permission: &str) -> Decision {
        self.emit(WalkEvent::Started {
            user_id,
            permission,
            target: None,
        });

        let bindings = self.bindings.bindings_for_user(user_id);
        if bindings.is_empty() {
            return self.finish(Decision::Denied(DenyReason::NoBindings));
        }

        match bindings.iter().find(|b| b.role.grants(permission)) {
            Some(binding) => {
                self.emit(WalkEvent::Matched { binding });
                self.finish(Decision::Granted {
                    resource_id: binding.resource_id,
                    role_id: binding.role_id(),
                })
            }
            None => self.finish(Decision::Denied(DenyReason::NoMatchingBinding)),
        }
    }

    pub fn has_permission(&self, user_id: Uuid, permission: &str, target: Option<&Resource>) -> bool {
        let decision = self.decide(user_id, permission, target);
        trace!(%user_id, permission, ?decision, "resource-scoped decision");
        decision.is_granted()
    }

    /// Resolve `resource_id` in the tree, then check it.
    pub fn check_permission(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        permission: &str,
    ) -> Result<(), AuthzError> {
        let resource = self
            .tree
            .get(resource_id)
            .ok_or(AuthzError::ResourceNotFound { resource_id })?;

        if self.has_permission(user_id, permission, Some(resource)) {
            Ok(())
        } else {
            Err(AuthzError::denied(permission))
        }
    }

    pub fn check_global_permission(&self, user_id: Uuid, permission: &str) -> Result<(), AuthzError> {
        let decision = self.decide_global(user_id, permission);
        trace!(%user_id, permission, ?decision, "global decision");
        if decision.is_granted() {
            Ok(())
        } else {
            Err(AuthzError::denied(permission))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use canopy_core::models::binding::EffectiveBinding;
    use canopy_core::models::role::{GrantedRole, Role, RoleScope};
    use chrono::Utc;

    use super::*;
    use crate::bindings::BindingIndex;
    use crate::tree::ResourceArena;

    fn resource(name: &str, parent: Option<&Resource>) -> Resource {
        Resource {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            parent_id: parent.map(|p| p.id),
            resource_type: "folder".into(),
            name: name.into(),
            path: format!("/{name}"),
            created_at: Utc::now(),
        }
    }

    fn role(name: &str, permissions: &[&str]) -> GrantedRole {
        GrantedRole {
            role: Role {
                id: Uuid::new_v4(),
                name: name.into(),
                scope: RoleScope::Global,
                tenant_id: None,
                created_at: Utc::now(),
            },
            permissions: permissions.iter().map(|p| p.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    fn bind(user_id: Uuid, role: &GrantedRole, resource: &Resource) -> EffectiveBinding {
        EffectiveBinding {
            user_id,
            resource_id: resource.id,
            role: role.clone(),
            assigned_at: Utc::now(),
        }
    }

    struct Tree {
        root: Resource,
        child: Resource,
        grandchild: Resource,
        arena: ResourceArena,
    }

    fn tree() -> Tree {
        let root = resource("root", None);
        let child = resource("child", Some(&root));
        let grandchild = resource("grandchild", Some(&child));
        let arena =
            ResourceArena::from_resources([root.clone(), child.clone(), grandchild.clone()]);
        Tree {
            root,
            child,
            grandchild,
            arena,
        }
    }

    #[test]
    fn user_role_on_root_is_inherited() {
        let t = tree();
        let user = Uuid::new_v4();
        let index = BindingIndex::from_bindings([bind(user, &role("USER", &["READ"]), &t.root)]);
        let engine = AuthorizationEngine::new(&index, &t.arena);

        assert!(engine.has_permission(user, "READ", Some(&t.root)));
        assert!(engine.has_permission(user, "READ", Some(&t.child)));
        assert!(engine.has_permission(user, "READ", Some(&t.grandchild)));
        assert!(!engine.has_permission(user, "WRITE", Some(&t.root)));
    }

    #[test]
    fn grant_on_child_does_not_flow_upwards() {
        let t = tree();
        let user = Uuid::new_v4();
        let admin = role("ADMIN", &["READ", "WRITE", "DELETE"]);
        let index = BindingIndex::from_bindings([bind(user, &admin, &t.child)]);
        let engine = AuthorizationEngine::new(&index, &t.arena);

        assert!(engine.has_permission(user, "READ", Some(&t.grandchild)));
        assert!(engine.has_permission(user, "DELETE", Some(&t.child)));
        assert!(!engine.has_permission(user, "READ", Some(&t.root)));
    }

    #[test]
    fn ancestor_grant_is_not_suppressed_by_narrower_binding() {
        let t = tree();
        let user = Uuid::new_v4();
        let index = BindingIndex::from_bindings([
            bind(user, &role("VIEWER", &["READ"]), &t.grandchild),
            bind(user, &role("EDITOR", &["READ", "WRITE"]), &t.root),
        ]);
        let engine = AuthorizationEngine::new(&index, &t.arena);

        // WRITE is only on the root binding, two levels up.
        assert_eq!(
            engine.decide(user, "WRITE", Some(&t.grandchild)),
            Decision::Granted {
                resource_id: t.root.id,
                role_id: index.bindings_for_user(user)[1].role_id(),
            }
        );
        // READ is found on the grandchild itself first.
        assert!(matches!(
            engine.decide(user, "READ", Some(&t.grandchild)),
            Decision::Granted { resource_id, .. } if resource_id == t.grandchild.id
        ));
    }

    #[test]
    fn matching_is_exact_and_case_sensitive() {
        let t = tree();
        let user = Uuid::new_v4();
        let index = BindingIndex::from_bindings([bind(user, &role("USER", &["READ"]), &t.root)]);
        let engine = AuthorizationEngine::new(&index, &t.arena);

        assert!(!engine.has_permission(user, "read", Some(&t.root)));
        assert!(!engine.has_permission(user, "READ ", Some(&t.root)));
        assert!(!engine.has_permission(user, "REA", Some(&t.root)));
    }

    #[test]
    fn blank_permission_and_missing_target_are_denied() {
        let t = tree();
        let user = Uuid::new_v4();
        let index = BindingIndex::from_bindings([bind(user, &role("USER", &["READ"]), &t.root)]);
        let engine = AuthorizationEngine::new(&index, &t.arena);

        assert_eq!(
            engine.decide(user, "READ", None),
            Decision::Denied(DenyReason::MissingTarget)
        );
        assert_eq!(
            engine.decide(user, "", Some(&t.root)),
            Decision::Denied(DenyReason::BlankPermission)
        );
        assert_eq!(
            engine.decide(user, "  \t", Some(&t.root)),
            Decision::Denied(DenyReason::BlankPermission)
        );
    }

    struct CountingSource {
        calls: AtomicUsize,
        inner: BindingIndex,
    }

    impl BindingSource for CountingSource {
        fn bindings_for_user(&self, user_id: Uuid) -> &[EffectiveBinding] {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.bindings_for_user(user_id)
        }
    }

    #[test]
    fn fast_reject_never_reads_bindings() {
        let t = tree();
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            inner: BindingIndex::new(),
        };
        let engine = AuthorizationEngine::new(&source, &t.arena);

        assert!(!engine.has_permission(Uuid::new_v4(), "READ", None));
        assert!(!engine.has_permission(Uuid::new_v4(), " ", Some(&t.root)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        assert!(!engine.has_permission(Uuid::new_v4(), "READ", Some(&t.root)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_bindings_denies_everything() {
        let t = tree();
        let index = BindingIndex::new();
        let engine = AuthorizationEngine::new(&index, &t.arena);
        let user = Uuid::new_v4();

        assert_eq!(
            engine.decide(user, "READ", Some(&t.root)),
            Decision::Denied(DenyReason::NoBindings)
        );
        assert_eq!(
            engine.check_global_permission(user, "TENANT_LIST"),
            Err(AuthzError::denied("TENANT_LIST"))
        );
    }

    #[test]
    fn binding_on_unrelated_branch_never_grants() {
        let t = tree();
        let sibling = resource("sibling", Some(&t.root));
        let mut arena = t.arena.clone();
        arena.insert(sibling.clone());
        let user = Uuid::new_v4();
        let index = BindingIndex::from_bindings([bind(user, &role("USER", &["READ"]), &sibling)]);
        let engine = AuthorizationEngine::new(&index, &arena);

        assert!(engine.has_permission(user, "READ", Some(&sibling)));
        assert!(!engine.has_permission(user, "READ", Some(&t.grandchild)));
        assert!(!engine.has_permission(user, "READ", Some(&t.root)));
    }

    #[test]
    fn admin_name_is_not_a_bypass() {
        let t = tree();
        let user = Uuid::new_v4();
        let index = BindingIndex::from_bindings([bind(user, &role("ADMIN", &[]), &t.root)]);
        let engine = AuthorizationEngine::new(&index, &t.arena);

        assert!(!engine.has_permission(user, "READ", Some(&t.root)));
        assert!(engine.check_global_permission(user, "READ").is_err());
    }

    #[test]
    fn two_node_cycle_terminates_denied() {
        let mut a = resource("a", None);
        let mut b = resource("b", None);
        a.parent_id = Some(b.id);
        b.parent_id = Some(a.id);
        let unrelated = resource("unrelated", None);
        let arena = ResourceArena::from_resources([a.clone(), b.clone(), unrelated.clone()]);

        let user = Uuid::new_v4();
        let index =
            BindingIndex::from_bindings([bind(user, &role("USER", &["READ"]), &unrelated)]);
        let engine = AuthorizationEngine::new(&index, &arena);

        assert_eq!(
            engine.decide(user, "READ", Some(&a)),
            Decision::Denied(DenyReason::CycleDetected { resource_id: a.id })
        );
    }

    #[test]
    fn grant_inside_cycle_is_still_found() {
        let mut a = resource("a", None);
        let mut b = resource("b", None);
        a.parent_id = Some(b.id);
        b.parent_id = Some(a.id);
        let arena = ResourceArena::from_resources([a.clone(), b.clone()]);

        let user = Uuid::new_v4();
        let index = BindingIndex::from_bindings([bind(user, &role("USER", &["READ"]), &b)]);
        let engine = AuthorizationEngine::new(&index, &arena);

        assert!(engine.has_permission(user, "READ", Some(&a)));
        assert!(!engine.has_permission(user, "WRITE", Some(&a)));
    }

    #[test]
    fn self_loop_and_long_ring_terminate() {
        let mut lone = resource("lone", None);
        lone.parent_id = Some(lone.id);

        let mut ring: Vec<Resource> = (0..500).map(|i| resource(&format!("n{i}"), None)).collect();
        for i in 0..ring.len() {
            let next = ring[(i + 1) % ring.len()].id;
            ring[i].parent_id = Some(next);
        }
        let mut arena = ResourceArena::from_resources(ring.clone());
        arena.insert(lone.clone());

        let user = Uuid::new_v4();
        let elsewhere = resource("elsewhere", None);
        let index = BindingIndex::from_bindings([bind(user, &role("USER", &["READ"]), &elsewhere)]);
        let engine = AuthorizationEngine::new(&index, &arena);

        assert!(!engine.has_permission(user, "READ", Some(&lone)));
        assert!(!engine.has_permission(user, "READ", Some(&ring[0])));
    }

    #[test]
    fn global_check_ignores_resource_scope() {
        let t = tree();
        let user = Uuid::new_v4();
        let index = BindingIndex::from_bindings([bind(
            user,
            &role("AUDITOR", &["AUDIT_READ"]),
            &t.grandchild,
        )]);
        let engine = AuthorizationEngine::new(&index, &t.arena);

        assert!(engine.check_global_permission(user, "AUDIT_READ").is_ok());
        assert!(!engine.has_permission(user, "AUDIT_READ", Some(&t.root)));
        assert_eq!(
            engine.check_global_permission(user, "audit_read"),
            Err(AuthzError::denied("audit_read"))
        );
    }

    #[test]
    fn check_permission_separates_not_found_from_denied() {
        let t = tree();
        let user = Uuid::new_v4();
        let index = BindingIndex::from_bindings([bind(user, &role("USER", &["READ"]), &t.child)]);
        let engine = AuthorizationEngine::new(&index, &t.arena);
        let missing = Uuid::new_v4();

        assert_eq!(
            engine.check_permission(user, missing, "READ"),
            Err(AuthzError::ResourceNotFound {
                resource_id: missing
            })
        );
        assert_eq!(
            engine.check_permission(user, t.root.id, "READ"),
            Err(AuthzError::denied("READ"))
        );
        assert!(engine.check_permission(user, t.grandchild.id, "READ").is_ok());
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl DecisionObserver for Recorder {
        fn on_event(&self, event: &WalkEvent<'_>) {
            let line = match event {
                WalkEvent::Started { .. } => "start".to_string(),
                WalkEvent::Visit { resource, depth } => format!("visit {} {depth}", resource.name),
                WalkEvent::Matched { binding } => format!("match {}", binding.role.role.name),
                WalkEvent::CycleDetected { .. } => "cycle".to_string(),
                WalkEvent::Finished { decision } => format!("finish {}", decision.is_granted()),
            };
            self.0.lock().unwrap().push(line);
        }
    }

    #[test]
    fn observer_sees_the_walk() {
        let t = tree();
        let user = Uuid::new_v4();
        let index = BindingIndex::from_bindings([bind(user, &role("USER", &["READ"]), &t.root)]);
        let recorder = Recorder::default();
        let engine = AuthorizationEngine::new(&index, &t.arena).with_observer(&recorder);

        assert!(engine.has_permission(user, "READ", Some(&t.grandchild)));
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                "start",
                "visit grandchild 0",
                "visit child 1",
                "visit root 2",
                "match USER",
                "finish true",
            ]
        );
    }
}
