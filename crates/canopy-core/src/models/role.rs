//! Role domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleScope {
    /// System-wide role, usable in every tenant.
    Global,
    /// Custom role owned by a single tenant.
    Tenant,
}

impl RoleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Tenant => "TENANT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GLOBAL" => Some(Self::Global),
            "TENANT" => Some(Self::Tenant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub scope: RoleScope,
    /// Present only when `scope` is [`RoleScope::Tenant`].
    pub tenant_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: String,
    pub scope: RoleScope,
    pub tenant_id: Option<Uuid>,
    /// Permission names to grant on creation.
    pub permissions: Vec<String>,
}

/// A role together with the names of the permissions it grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantedRole {
    pub role: Role,
    pub permissions: BTreeSet<String>,
}

impl GrantedRole {
    /// Exact, case-sensitive membership test.
    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}
