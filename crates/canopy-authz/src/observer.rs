//! Per-request observation of authorization decisions.
//!
//! Callers that want to see how a decision was reached attach an observer
//! to a single check. Nothing is written anywhere unless they do.

use canopy_core::models::binding::EffectiveBinding;
use canopy_core::models::resource::Resource;
use tracing::debug;
use uuid::Uuid;

use crate::engine::Decision;

/// One step of a decision.
#[derive(Debug)]
pub enum WalkEvent<'a> {
    Started {
        user_id: Uuid,
        permission: &'a str,
        /// `None` for global checks.
        target: Option<Uuid>,
    },
    /// A resource on the chain is being examined.
    Visit { resource: &'a Resource, depth: usize },
    /// A binding carrying the permission was found.
    Matched { binding: &'a EffectiveBinding },
    /// The parent chain revisited `resource_id`; the walk stops here.
    CycleDetected { resource_id: Uuid },
    Finished { decision: &'a Decision },
}

pub trait DecisionObserver: Send + Sync {
    fn on_event(&self, event: &WalkEvent<'_>);
}

/// Forwards every event as a `tracing` debug event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DecisionObserver for TracingObserver {
    fn on_event(&self, event: &WalkEvent<'_>) {
        match event {
            WalkEvent::Started {
                user_id,
                permission,
                target,
            } => debug!(%user_id, permission, ?target, "authz: check started"),
            WalkEvent::Visit { resource, depth } => debug!(
                resource_id = %resource.id,
                path = %resource.path,
                depth,
                "authz: visiting resource"
            ),
            WalkEvent::Matched { binding } => debug!(
                resource_id = %binding.resource_id,
                role = %binding.role.role.name,
                "authz: binding matched"
            ),
            WalkEvent::CycleDetected { resource_id } => {
                debug!(%resource_id, "authz: cycle in resource chain")
            }
            WalkEvent::Finished { decision } => {
                debug!(granted = decision.is_granted(), ?decision, "authz: check finished")
            }
        }
    }
}
