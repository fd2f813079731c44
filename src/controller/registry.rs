//! # Device Registry
//!
//! Deduplicated set of known controllers, kept in insertion order.
//!
//! The set is mutated by three paths that may run on different tasks:
//! an explicit [`DeviceRegistry::scan`], and connect/disconnect notifications
//! from the hotplug monitor. All of them take the same lock around their
//! read-modify-write sequence.
//!
//! Subscribers receive a [`RegistryEvent`] for every actual change through a
//! broadcast channel owned by the registry instance.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::provider::{ControllerHandle, DeviceId, DeviceProvider};
use super::selector::ActiveDevice;
use crate::error::Result;

/// Capacity of the notification channel; slow subscribers see `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Change notification emitted by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Connected(ControllerHandle),
    Disconnected(ControllerHandle),
}

/// Set of currently known controllers.
pub struct DeviceRegistry {
    provider: Arc<dyn DeviceProvider>,
    active: ActiveDevice,
    handles: Mutex<Vec<ControllerHandle>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("handles", &self.handles())
            .finish_non_exhaustive()
    }
}

impl DeviceRegistry {
    /// Creates an empty registry.
    ///
    /// `active` is cleared whenever the device it points at disconnects.
    pub fn new(provider: Arc<dyn DeviceProvider>, active: ActiveDevice) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            provider,
            active,
            handles: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Adds every connected controller not already registered.
    ///
    /// Stale entries are left alone; only a disconnect notification removes them.
    /// Returns the number of newly added controllers.
    pub fn scan(&self) -> Result<usize> {
        let devices = self.provider.devices()?;
        let mut added = Vec::new();
        {
            let mut handles = self.lock();
            for device in devices {
                if !handles.contains(&device) {
                    handles.push(device.clone());
                    added.push(device);
                }
            }
        }

        info!("Scan found {} new controller(s)", added.len());
        let count = added.len();
        for handle in added {
            self.notify(RegistryEvent::Connected(handle));
        }
        Ok(count)
    }

    /// Registers a newly connected controller. Duplicates are ignored.
    ///
    /// Returns true if the controller was not known before.
    pub fn on_connected(&self, handle: ControllerHandle) -> bool {
        let inserted = {
            let mut handles = self.lock();
            if handles.contains(&handle) {
                false
            } else {
                handles.push(handle.clone());
                true
            }
        };

        if inserted {
            info!("Controller connected: '{}' at {}", handle.name, handle.id);
            self.notify(RegistryEvent::Connected(handle));
        } else {
            debug!("Controller {} already registered", handle.id);
        }
        inserted
    }

    /// Removes a disconnected controller and clears the active selection if it
    /// pointed at it.
    ///
    /// Returns true if the controller was registered.
    pub fn on_disconnected(&self, handle: &ControllerHandle) -> bool {
        let removed = {
            let mut handles = self.lock();
            let before = handles.len();
            handles.retain(|known| known != handle);
            handles.len() != before
        };

        if !removed {
            debug!("Ignoring disconnect of unknown controller {}", handle.id);
            return false;
        }

        info!("Controller disconnected: '{}' at {}", handle.name, handle.id);
        if self.active.clear_if(&handle.id) {
            warn!("Active controller {} disconnected, tracking suspended until reselected", handle.id);
        }
        self.notify(RegistryEvent::Disconnected(handle.clone()));
        true
    }

    /// Insertion-ordered copy of the registered controllers.
    #[must_use]
    pub fn handles(&self) -> Vec<ControllerHandle> {
        self.lock().clone()
    }

    #[must_use]
    pub fn contains(&self, id: &DeviceId) -> bool {
        self.lock().iter().any(|handle| &handle.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Subscribes to connect/disconnect notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// The provider this registry scans.
    pub fn provider(&self) -> &Arc<dyn DeviceProvider> {
        &self.provider
    }

    fn notify(&self, event: RegistryEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ControllerHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::provider::mocks::{wheel, FakeProvider};
    use crate::controller::provider::MockDeviceProvider;
    use crate::error::WheelTrackerError;
    use std::collections::HashSet;

    fn new_registry(provider: FakeProvider) -> (DeviceRegistry, ActiveDevice) {
        let active = ActiveDevice::new();
        (DeviceRegistry::new(Arc::new(provider), active.clone()), active)
    }

    fn ids(registry: &DeviceRegistry) -> Vec<String> {
        registry.handles().into_iter().map(|h| h.id.0).collect()
    }

    #[test]
    fn test_scan_is_idempotent() {
        let provider = FakeProvider::with_devices(vec![wheel("A"), wheel("B")]);
        let (registry, _) = new_registry(provider);

        assert_eq!(registry.scan().unwrap(), 2);
        assert_eq!(registry.scan().unwrap(), 0);
        assert_eq!(ids(&registry), vec!["A", "B"]);
    }

    #[test]
    fn test_scan_does_not_remove_stale_entries() {
        let provider = FakeProvider::with_devices(vec![wheel("A"), wheel("B")]);
        let (registry, _) = new_registry(provider.clone());
        registry.scan().unwrap();

        provider.set_devices(vec![wheel("B"), wheel("C")]);
        assert_eq!(registry.scan().unwrap(), 1);
        assert_eq!(ids(&registry), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_scan_propagates_provider_error() {
        let mut provider = MockDeviceProvider::new();
        provider
            .expect_devices()
            .times(1)
            .returning(|| Err(WheelTrackerError::DeviceNotFound("/dev/input".to_string())));

        let registry = DeviceRegistry::new(Arc::new(provider), ActiveDevice::new());
        assert!(registry.scan().is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_connect_disconnect_sequence_never_duplicates() {
        let (registry, _) = new_registry(FakeProvider::new());

        // (connect?, id)
        let script = [
            (true, "A"), (true, "A"), (true, "B"), (false, "A"), (false, "A"),
            (true, "C"), (true, "A"), (false, "B"), (true, "B"), (true, "C"),
        ];

        let mut expected: HashSet<&str> = HashSet::new();
        for (connect, id) in script {
            if connect {
                registry.on_connected(wheel(id));
                expected.insert(id);
            } else {
                registry.on_disconnected(&wheel(id));
                expected.remove(id);
            }

            let current = ids(&registry);
            let unique: HashSet<&str> = current.iter().map(String::as_str).collect();
            assert_eq!(unique.len(), current.len(), "duplicate handle in {:?}", current);
            assert_eq!(unique, expected);
        }
    }

    #[test]
    fn test_disconnect_unknown_is_noop() {
        let (registry, _) = new_registry(FakeProvider::new());
        registry.on_connected(wheel("A"));
        assert!(!registry.on_disconnected(&wheel("Z")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_disconnecting_active_clears_selection() {
        let (registry, active) = new_registry(FakeProvider::new());
        registry.on_connected(wheel("A"));
        registry.on_connected(wheel("B"));
        active.select_first_available(&registry);

        registry.on_disconnected(&wheel("A"));
        assert!(active.current().is_none());
    }

    #[test]
    fn test_disconnecting_other_keeps_selection() {
        let (registry, active) = new_registry(FakeProvider::new());
        registry.on_connected(wheel("A"));
        registry.on_connected(wheel("B"));
        active.select_first_available(&registry);

        registry.on_disconnected(&wheel("B"));
        assert_eq!(active.current().unwrap().id, DeviceId::from("A"));
    }

    #[test]
    fn test_subscribers_see_only_changes() {
        let (registry, _) = new_registry(FakeProvider::with_devices(vec![wheel("A")]));
        let mut events = registry.subscribe();

        registry.scan().unwrap();
        registry.on_connected(wheel("A"));
        registry.on_connected(wheel("B"));
        registry.on_disconnected(&wheel("A"));
        registry.on_disconnected(&wheel("A"));

        assert_eq!(events.try_recv().unwrap(), RegistryEvent::Connected(wheel("A")));
        assert_eq!(events.try_recv().unwrap(), RegistryEvent::Connected(wheel("B")));
        assert_eq!(events.try_recv().unwrap(), RegistryEvent::Disconnected(wheel("A")));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_independent_registries() {
        let (first, _) = new_registry(FakeProvider::new());
        let (second, _) = new_registry(FakeProvider::new());
        first.on_connected(wheel("A"));
        assert!(first.contains(&DeviceId::from("A")));
        assert!(!second.contains(&DeviceId::from("A")));
    }

    #[test]
    fn test_concurrent_notifications() {
        let (registry, _) = new_registry(FakeProvider::new());
        let registry = Arc::new(registry);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let id = format!("dev{}", i % 5);
                        registry.on_connected(wheel(&id));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(registry.len(), 5);
    }
}
