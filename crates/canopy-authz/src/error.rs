//! Authorization error types.

use canopy_core::error::CanopyError;
use thiserror::Error;
use uuid::Uuid;

/// Outcome of a signalling check that did not grant access.
///
/// A missing resource is never reported as a denial and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("resource not found: {resource_id}")]
    ResourceNotFound { resource_id: Uuid },

    #[error("access denied: missing permission {permission}")]
    AccessDenied { permission: String },
}

impl AuthzError {
    pub fn denied(permission: &str) -> Self {
        Self::AccessDenied {
            permission: permission.to_owned(),
        }
    }
}

impl From<AuthzError> for CanopyError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::ResourceNotFound { resource_id } => {
                CanopyError::not_found("resource", resource_id)
            }
            AuthzError::AccessDenied { permission } => CanopyError::AccessDenied { permission },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_not_found() {
        let id = Uuid::new_v4();
        let err: CanopyError = AuthzError::ResourceNotFound { resource_id: id }.into();
        match err {
            CanopyError::NotFound { entity, id: got } => {
                assert_eq!(entity, "resource");
                assert_eq!(got, id.to_string());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn denial_keeps_permission_name() {
        let err: CanopyError = AuthzError::denied("WRITE").into();
        assert!(matches!(
            err,
            CanopyError::AccessDenied { ref permission } if permission == "WRITE"
        ));
    }
}
