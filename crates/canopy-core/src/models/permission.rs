//! Permission domain model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named atomic capability. Immutable reference data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub id: Uuid,
    /// Unique, case-sensitive name (e.g., `READ`, `RESOURCE_CREATE`).
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermission {
    pub name: String,
    pub description: String,
}
