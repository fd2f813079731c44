//! # Active Device Selector
//!
//! Holds at most one controller chosen from the registry. Cloning an
//! [`ActiveDevice`] shares the same slot, so the registry, the sampling loop and
//! the user actions all see one selection.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

use super::provider::{ControllerHandle, DeviceId};
use super::registry::DeviceRegistry;

/// Shared slot for the controller currently being tracked.
#[derive(Debug, Clone, Default)]
pub struct ActiveDevice {
    slot: Arc<Mutex<Option<ControllerHandle>>>,
}

impl ActiveDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the first registered controller (insertion order), or none if empty.
    ///
    /// Returns the new selection so the caller can surface "no controller detected".
    pub fn select_first_available(&self, registry: &DeviceRegistry) -> Option<ControllerHandle> {
        let first = registry.handles().into_iter().next();
        match &first {
            Some(handle) => info!("Selected controller '{}' at {}", handle.name, handle.id),
            None => info!("No controller available to select"),
        }
        *self.lock() = first.clone();
        first
    }

    /// The active controller, if any.
    #[must_use]
    pub fn current(&self) -> Option<ControllerHandle> {
        self.lock().clone()
    }

    /// Clears the selection if it currently points at `id`.
    ///
    /// Returns true when a selection was dropped.
    pub fn clear_if(&self, id: &DeviceId) -> bool {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|handle| &handle.id == id) {
            debug!("Clearing active controller {}", id);
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ControllerHandle>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::provider::mocks::{wheel, FakeProvider};
    use std::sync::Arc;

    fn registry_with(handles: Vec<ControllerHandle>) -> (DeviceRegistry, ActiveDevice) {
        let active = ActiveDevice::new();
        let registry = DeviceRegistry::new(Arc::new(FakeProvider::new()), active.clone());
        for handle in handles {
            registry.on_connected(handle);
        }
        (registry, active)
    }

    #[test]
    fn test_empty_registry_selects_none() {
        let (registry, active) = registry_with(vec![]);
        assert!(active.select_first_available(&registry).is_none());
        assert!(active.current().is_none());
    }

    #[test]
    fn test_selects_first_in_insertion_order() {
        let (registry, active) = registry_with(vec![wheel("A"), wheel("B")]);
        let selected = active.select_first_available(&registry).unwrap();
        assert_eq!(selected.id, DeviceId::from("A"));
        assert_eq!(active.current().unwrap().id, DeviceId::from("A"));
    }

    #[test]
    fn test_reselect_on_empty_registry_clears() {
        let (registry, active) = registry_with(vec![wheel("A")]);
        active.select_first_available(&registry);
        registry.on_disconnected(&wheel("A"));
        assert!(active.select_first_available(&registry).is_none());
    }

    #[test]
    fn test_clear_if_only_matches_active() {
        let (registry, active) = registry_with(vec![wheel("A"), wheel("B")]);
        active.select_first_available(&registry);

        assert!(!active.clear_if(&DeviceId::from("B")));
        assert!(active.current().is_some());

        assert!(active.clear_if(&DeviceId::from("A")));
        assert!(active.current().is_none());
    }

    #[test]
    fn test_clones_share_selection() {
        let (registry, active) = registry_with(vec![wheel("A")]);
        let reader = active.clone();
        active.select_first_available(&registry);
        assert_eq!(reader.current().unwrap().id, DeviceId::from("A"));

        active.clear();
        assert!(reader.current().is_none());
    }
}
