//! Canopy Authz: the authorization engine and the workflows guarded
//! by it.
//!
//! [`engine`] decides synchronously over in-memory snapshots;
//! [`service::AuthorizationService`] builds those snapshots from the
//! stores. The remaining services are the administrative workflows
//! (tenants, resources, roles, assignments) that consult it.

pub mod assignment;
pub mod audit;
pub mod bindings;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod observer;
pub mod resource;
pub mod role;
pub mod service;
pub mod tenant;
pub mod tree;
pub mod user;

pub use assignment::AssignmentService;
pub use audit::{AuditEvent, AuditService};
pub use config::AuthzConfig;
pub use engine::{AuthorizationEngine, Decision, DenyReason};
pub use error::AuthzError;
pub use observer::{DecisionObserver, TracingObserver, WalkEvent};
pub use resource::ResourceService;
pub use role::RoleService;
pub use service::AuthorizationService;
pub use tenant::{BootstrappedTenant, TenantService};
pub use user::UserService;
