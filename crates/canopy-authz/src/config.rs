//! Authorization configuration.

/// Configuration for the authorization services.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// System role bound to a tenant's creator on the tenant root
    /// (default: `TENANT_ADMIN`).
    pub tenant_admin_role: String,
    /// Attach a [`TracingObserver`](crate::observer::TracingObserver) to
    /// every check that has no observer of its own.
    pub trace_decisions: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            tenant_admin_role: crate::catalog::roles::TENANT_ADMIN.into(),
            trace_decisions: false,
        }
    }
}
