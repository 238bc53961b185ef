//! Role binding: "user U holds role R on resource S".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::GrantedRole;

/// A stored (user, role, resource) triple. The triple is the identity;
/// bindings are never updated, only created and deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleBinding {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub resource_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub resource_id: Uuid,
}

/// A binding with its role's permission set resolved, as handed to the
/// authorization engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectiveBinding {
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub role: GrantedRole,
    pub assigned_at: DateTime<Utc>,
}

impl EffectiveBinding {
    pub fn role_id(&self) -> Uuid {
        self.role.role.id
    }
}
