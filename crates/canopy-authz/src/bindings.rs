//! Binding snapshots for the authorization engine.

use std::collections::HashMap;

use canopy_core::models::binding::EffectiveBinding;
use uuid::Uuid;

/// Read access to the role bindings held by users.
pub trait BindingSource {
    /// All bindings held by `user_id`; empty when the user holds none.
    fn bindings_for_user(&self, user_id: Uuid) -> &[EffectiveBinding];
}

/// Bindings grouped by user.
#[derive(Debug, Clone, Default)]
pub struct BindingIndex {
    by_user: HashMap<Uuid, Vec<EffectiveBinding>>,
}

impl BindingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bindings(bindings: impl IntoIterator<Item = EffectiveBinding>) -> Self {
        let mut index = Self::new();
        for binding in bindings {
            index.push(binding);
        }
        index
    }

    pub fn push(&mut self, binding: EffectiveBinding) {
        self.by_user.entry(binding.user_id).or_default().push(binding);
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

impl BindingSource for BindingIndex {
    fn bindings_for_user(&self, user_id: Uuid) -> &[EffectiveBinding] {
        self.by_user.get(&user_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
