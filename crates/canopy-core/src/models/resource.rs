//! Resource domain model.
//!
//! Resources form one tree per tenant. A resource only knows its parent
//! id; the tree itself is reconstructed by whoever needs it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type tag of the single root resource of every tenant.
pub const TENANT_ROOT_TYPE: &str = "TENANT_ROOT";

/// Path of a tenant root.
pub const ROOT_PATH: &str = "/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// `None` only for a tenant root.
    pub parent_id: Option<Uuid>,
    pub resource_type: String,
    pub name: String,
    /// Materialized path, e.g. `/engineering/platform`.
    pub path: String,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResource {
    pub tenant_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub resource_type: String,
    pub name: String,
    pub path: String,
}

/// A resource with its children, as returned by hierarchy listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceNode {
    pub resource: Resource,
    pub children: Vec<ResourceNode>,
}

impl ResourceNode {
    /// Number of resources in this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ResourceNode::size).sum::<usize>()
    }

    pub fn find(&self, id: Uuid) -> Option<&ResourceNode> {
        if self.resource.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

/// Build the materialized path of a child from its parent's path.
///
/// The parent path is normalized to end with exactly one `/` before the
/// child name is appended.
pub fn child_path(parent_path: &str, name: &str) -> String {
    if parent_path.ends_with('/') {
        format!("{parent_path}{name}")
    } else {
        format!("{parent_path}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_of_root() {
        assert_eq!(child_path(ROOT_PATH, "eng"), "/eng");
    }

    #[test]
    fn child_of_nested_parent() {
        assert_eq!(child_path("/eng", "api"), "/eng/api");
        assert_eq!(child_path("/eng/", "api"), "/eng/api");
    }
}
