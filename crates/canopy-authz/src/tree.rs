//! Resource-tree snapshots for the authorization engine.
//!
//! The engine never follows owning pointers: resources are keyed by id in
//! an arena and the walk state lives outside them, so a corrupt parent
//! chain is just data.

use std::collections::HashMap;

use canopy_core::models::resource::Resource;
use uuid::Uuid;

/// Read access to one tenant's resource hierarchy.
///
/// Implementations do not have to guarantee acyclicity.
pub trait ResourceTree {
    fn get(&self, id: Uuid) -> Option<&Resource>;

    /// `None` means `resource` is a root, or its parent is unknown.
    fn parent_of(&self, resource: &Resource) -> Option<&Resource> {
        resource.parent_id.and_then(|parent_id| self.get(parent_id))
    }
}

/// Id-keyed snapshot of a set of resources.
#[derive(Debug, Clone, Default)]
pub struct ResourceArena {
    nodes: HashMap<Uuid, Resource>,
}

impl ResourceArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        Self {
            nodes: resources.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    /// Insert or replace a resource, returning the previous one.
    pub fn insert(&mut self, resource: Resource) -> Option<Resource> {
        self.nodes.insert(resource.id, resource)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl ResourceTree for ResourceArena {
    fn get(&self, id: Uuid) -> Option<&Resource> {
        self.nodes.get(&id)
    }
}

impl FromIterator<Resource> for ResourceArena {
    fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
        Self::from_resources(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn resource(id: Uuid, parent_id: Option<Uuid>) -> Resource {
        Resource {
            id,
            tenant_id: Uuid::nil(),
            parent_id,
            resource_type: "folder".into(),
            name: id.to_string(),
            path: "/".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn parent_lookup_follows_parent_id() {
        let root = Uuid::new_v4();
        let child = Uuid::new_v4();
        let arena = ResourceArena::from_resources([resource(root, None), resource(child, Some(root))]);

        let child = arena.get(child).unwrap();
        assert_eq!(arena.parent_of(child).map(|r| r.id), Some(root));
        assert!(arena.parent_of(arena.get(root).unwrap()).is_none());
    }

    #[test]
    fn dangling_parent_is_treated_as_root() {
        let orphan = resource(Uuid::new_v4(), Some(Uuid::new_v4()));
        let arena: ResourceArena = [orphan.clone()].into_iter().collect();
        assert!(arena.parent_of(&orphan).is_none());
    }

    #[test]
    fn insert_replaces_by_id() {
        let id = Uuid::new_v4();
        let mut arena = ResourceArena::new();
        assert!(arena.insert(resource(id, None)).is_none());
        assert!(arena.insert(resource(id, Some(Uuid::new_v4()))).is_some());
        assert_eq!(arena.len(), 1);
        assert!(arena.contains(id));
    }
}
