//! Authorization service: loads a snapshot from the stores, then lets the
//! engine decide.

use canopy_core::error::{CanopyError, CanopyResult};
use canopy_core::models::resource::Resource;
use canopy_core::repository::{BindingRepository, ResourceRepository, Stores};
use tracing::debug;
use uuid::Uuid;

use crate::bindings::BindingIndex;
use crate::catalog;
use crate::config::AuthzConfig;
use crate::engine::{AuthorizationEngine, Decision, DenyReason, precheck};
use crate::error::AuthzError;
use crate::observer::{DecisionObserver, TracingObserver};
use crate::tree::ResourceArena;

/// Authorization service.
///
/// Generic over repository implementations so that the authz layer
/// has no dependency on the database crate. Each call reads the user's
/// bindings once and, for scoped checks, the target's ancestors one by
/// one; nothing is cached between calls.
#[derive(Clone)]
pub struct AuthorizationService<R: ResourceRepository, B: BindingRepository> {
    resource_repo: R,
    binding_repo: B,
    config: AuthzConfig,
}

impl<R: ResourceRepository, B: BindingRepository> AuthorizationService<R, B> {
    pub fn new(resource_repo: R, binding_repo: B, config: AuthzConfig) -> Self {
        Self {
            resource_repo,
            binding_repo,
            config,
        }
    }

    /// Build a service over the resource and binding stores of `stores`.
    pub fn from_stores<S>(stores: &S, config: AuthzConfig) -> Self
    where
        S: Stores<Resources = R, Bindings = B>,
        R: Clone,
        B: Clone,
    {
        Self::new(stores.resources().clone(), stores.bindings().clone(), config)
    }

    /// Run the following checks with `observer` attached.
    pub fn observed<'o>(&'o self, observer: &'o dyn DecisionObserver) -> ObservedChecks<'o, R, B> {
        ObservedChecks {
            service: self,
            observer,
        }
    }

    fn default_observer(&self) -> Option<&'static dyn DecisionObserver> {
        static TRACING: TracingObserver = TracingObserver;
        self.config
            .trace_decisions
            .then_some(&TRACING as &'static dyn DecisionObserver)
    }

    async fn decide(
        &self,
        user_id: Uuid,
        permission: &str,
        target: Option<&Resource>,
        observer: Option<&dyn DecisionObserver>,
    ) -> CanopyResult<Decision> {
        // Reject before touching any store.
        if let Some(reason) = precheck(permission, target) {
            return Ok(Decision::Denied(reason));
        }
        let Some(target) = target else {
            return Ok(Decision::Denied(DenyReason::MissingTarget));
        };

        let bindings = self.binding_repo.list_for_user(user_id).await?;
        if bindings.is_empty() {
            return Ok(Decision::Denied(DenyReason::NoBindings));
        }
        let index = BindingIndex::from_bindings(bindings);
        let tree = self.load_chain(target).await?;

        let mut engine = AuthorizationEngine::new(&index, &tree);
        if let Some(observer) = observer.or(self.default_observer()) {
            engine = engine.with_observer(observer);
        }
        Ok(engine.decide(user_id, permission, Some(target)))
    }

    /// Snapshot of `target` and its ancestors.
    ///
    /// Stops at a root, at a parent id the store does not know, or at the
    /// first id already loaded, so a looping chain costs one read per
    /// distinct resource.
    async fn load_chain(&self, target: &Resource) -> CanopyResult<ResourceArena> {
        let mut chain = ResourceArena::new();
        chain.insert(target.clone());

        let mut next = target.parent_id;
        while let Some(parent_id) = next {
            if chain.contains(parent_id) {
                break;
            }
            let parent = match self.resource_repo.get_by_id(parent_id).await {
                Ok(parent) => parent,
                Err(CanopyError::NotFound { .. }) => break,
                Err(e) => return Err(e),
            };
            next = parent.parent_id;
            chain.insert(parent);
        }
        Ok(chain)
    }

    async fn decide_global(
        &self,
        user_id: Uuid,
        permission: &str,
        observer: Option<&dyn DecisionObserver>,
    ) -> CanopyResult<Decision> {
        let index = BindingIndex::from_bindings(self.binding_repo.list_for_user(user_id).await?);
        let tree = ResourceArena::new();

        let mut engine = AuthorizationEngine::new(&index, &tree);
        if let Some(observer) = observer.or(self.default_observer()) {
            engine = engine.with_observer(observer);
        }
        Ok(engine.decide_global(user_id, permission))
    }

    async fn has_permission_with(
        &self,
        user_id: Uuid,
        permission: &str,
        target: Option<&Resource>,
        observer: Option<&dyn DecisionObserver>,
    ) -> CanopyResult<bool> {
        let decision = self.decide(user_id, permission, target, observer).await?;
        if let Decision::Denied(reason) = &decision {
            debug!(%user_id, permission, ?reason, "permission not held");
        }
        Ok(decision.is_granted())
    }

    async fn check_permission_with(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        permission: &str,
        observer: Option<&dyn DecisionObserver>,
    ) -> CanopyResult<()> {
        let resource = match self.resource_repo.get_by_id(resource_id).await {
            Ok(resource) => resource,
            Err(CanopyError::NotFound { .. }) => {
                return Err(AuthzError::ResourceNotFound { resource_id }.into());
            }
            Err(e) => return Err(e),
        };

        if self
            .has_permission_with(user_id, permission, Some(&resource), observer)
            .await?
        {
            Ok(())
        } else {
            Err(AuthzError::denied(permission).into())
        }
    }

    async fn check_global_permission_with(
        &self,
        user_id: Uuid,
        permission: &str,
        observer: Option<&dyn DecisionObserver>,
    ) -> CanopyResult<()> {
        let decision = self.decide_global(user_id, permission, observer).await?;
        if decision.is_granted() {
            Ok(())
        } else {
            debug!(%user_id, permission, ?decision, "global permission not held");
            Err(AuthzError::denied(permission).into())
        }
    }

    /// Whether `user_id` holds `permission` on `target` or any ancestor.
    ///
    /// An absent target or blank permission is `Ok(false)` without any
    /// store being read. `Err` only ever carries store failures.
    pub async fn has_permission(
        &self,
        user_id: Uuid,
        permission: &str,
        target: Option<&Resource>,
    ) -> CanopyResult<bool> {
        self.has_permission_with(user_id, permission, target, None)
            .await
    }

    /// Resolve `resource_id` and require `permission` on it.
    ///
    /// Unknown resources are `NotFound`, never `AccessDenied`.
    pub async fn check_permission(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        permission: &str,
    ) -> CanopyResult<()> {
        self.check_permission_with(user_id, resource_id, permission, None)
            .await
    }

    /// Require `permission` through any binding, wherever it is attached.
    pub async fn check_global_permission(&self, user_id: Uuid, permission: &str) -> CanopyResult<()> {
        self.check_global_permission_with(user_id, permission, None)
            .await
    }

    /// Require that `user_id` holds every one of `permissions` at
    /// `target`, or anywhere when `target` is `None`.
    ///
    /// Global-only catalog permissions are always checked globally. Used
    /// before handing permissions to someone else, so that nobody can
    /// give out more than they hold.
    pub async fn check_holds_all<'p>(
        &self,
        user_id: Uuid,
        permissions: impl IntoIterator<Item = &'p str>,
        target: Option<&Resource>,
    ) -> CanopyResult<()> {
        let index = BindingIndex::from_bindings(self.binding_repo.list_for_user(user_id).await?);
        let tree = match target {
            Some(target) => self.load_chain(target).await?,
            None => ResourceArena::new(),
        };

        let mut engine = AuthorizationEngine::new(&index, &tree);
        if let Some(observer) = self.default_observer() {
            engine = engine.with_observer(observer);
        }

        for permission in permissions {
            let decision = match target {
                Some(target) if !catalog::is_global_only(permission) => {
                    engine.decide(user_id, permission, Some(target))
                }
                _ => engine.decide_global(user_id, permission),
            };
            if !decision.is_granted() {
                debug!(%user_id, permission, ?decision, "cannot hand out permission");
                return Err(AuthzError::denied(permission).into());
            }
        }
        Ok(())
    }
}

/// The checks of an [`AuthorizationService`] with an observer attached.
pub struct ObservedChecks<'o, R: ResourceRepository, B: BindingRepository> {
    service: &'o AuthorizationService<R, B>,
    observer: &'o dyn DecisionObserver,
}

impl<R: ResourceRepository, B: BindingRepository> ObservedChecks<'_, R, B> {
    pub async fn has_permission(
        &self,
        user_id: Uuid,
        permission: &str,
        target: Option<&Resource>,
    ) -> CanopyResult<bool> {
        self.service
            .has_permission_with(user_id, permission, target, Some(self.observer))
            .await
    }

    pub async fn check_permission(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        permission: &str,
    ) -> CanopyResult<()> {
        self.service
            .check_permission_with(user_id, resource_id, permission, Some(self.observer))
            .await
    }

    pub async fn check_global_permission(&self, user_id: Uuid, permission: &str) -> CanopyResult<()> {
        self.service
            .check_global_permission_with(user_id, permission, Some(self.observer))
            .await
    }
}
