//! Tenant domain model.
//!
//! Tenants provide full data isolation. Each tenant owns exactly one
//! resource tree, rooted at a `TENANT_ROOT` resource created at bootstrap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::binding::RoleBinding;
use super::resource::Resource;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TenantStatus {
    Active,
    Suspended,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Suspended => "Suspended",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Active" => Some(Self::Active),
            "Suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

/// An isolated organization/customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// Globally unique short code (e.g., `ACME`).
    pub code: String,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub code: String,
    pub status: TenantStatus,
}

/// A new tenant with its root resource and first administrator, written
/// all or nothing.
#[derive(Debug, Clone)]
pub struct TenantBootstrap {
    pub tenant: CreateTenant,
    pub root_name: String,
    pub admin_user_id: Uuid,
    pub admin_role_id: Uuid,
}

/// Everything created by a tenant bootstrap.
#[derive(Debug, Clone)]
pub struct BootstrappedTenant {
    pub tenant: Tenant,
    pub root: Resource,
    /// The creator's admin binding on `root`.
    pub admin_binding: RoleBinding,
}
