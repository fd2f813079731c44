//! # Device Provider Contract
//!
//! Abstraction over whatever enumerates controllers and reads their decoded
//! state. The sampling loop only ever talks to a [`DeviceProvider`], which keeps
//! the evdev backend swappable for tests.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::Result;

/// Stable identity of a physical controller (the evdev node path on Linux).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A known controller with its display name and capability counts.
///
/// Equality and hashing only look at [`ControllerHandle::id`], so the same
/// physical device always maps to one handle regardless of name changes.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    pub id: DeviceId,
    pub name: String,
    pub button_count: usize,
    pub axis_count: usize,
    pub switch_count: usize,
}

impl ControllerHandle {
    pub fn new(
        id: impl Into<DeviceId>,
        name: impl Into<String>,
        button_count: usize,
        axis_count: usize,
        switch_count: usize,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            button_count,
            axis_count,
            switch_count,
        }
    }
}

impl PartialEq for ControllerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ControllerHandle {}

impl Hash for ControllerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Position of a hat/POV switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchPosition {
    #[default]
    Center,
    Up,
    UpRight,
    Right,
    DownRight,
    Down,
    DownLeft,
    Left,
    UpLeft,
}

impl SwitchPosition {
    /// Builds a position from a hat's X/Y pair (-1, 0, 1 each; Y is positive down).
    #[must_use]
    pub fn from_hat(x: i32, y: i32) -> Self {
        match (x.signum(), y.signum()) {
            (0, -1) => Self::Up,
            (1, -1) => Self::UpRight,
            (1, 0) => Self::Right,
            (1, 1) => Self::DownRight,
            (0, 1) => Self::Down,
            (-1, 1) => Self::DownLeft,
            (-1, 0) => Self::Left,
            (-1, -1) => Self::UpLeft,
            _ => Self::Center,
        }
    }
}

/// One tick's raw read of button, switch and axis state.
///
/// Buffers are sized once from a handle's capabilities and then overwritten
/// in place on every read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSnapshot {
    pub buttons: Vec<bool>,
    pub switches: Vec<SwitchPosition>,
    pub axes: Vec<f64>,
}

impl RawSnapshot {
    /// Allocates buffers matching the handle's capability counts.
    #[must_use]
    pub fn for_handle(handle: &ControllerHandle) -> Self {
        Self {
            buttons: vec![false; handle.button_count],
            switches: vec![SwitchPosition::Center; handle.switch_count],
            axes: vec![0.0; handle.axis_count],
        }
    }

    /// True when the buffers were allocated for exactly these capabilities.
    #[must_use]
    pub fn fits(&self, handle: &ControllerHandle) -> bool {
        self.buttons.len() == handle.button_count
            && self.switches.len() == handle.switch_count
            && self.axes.len() == handle.axis_count
    }
}

/// Source of connected controllers and their current state.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceProvider: Send + Sync {
    /// All controllers currently connected.
    fn devices(&self) -> Result<Vec<ControllerHandle>>;

    /// Reads the current state of `id` into `snapshot` and returns an opaque reading id.
    ///
    /// The snapshot buffers are written in place, never reallocated.
    fn read_state(&self, id: &DeviceId, snapshot: &mut RawSnapshot) -> Result<u64>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_handle_identity_ignores_name() {
        let a = ControllerHandle::new("/dev/input/event3", "G29", 24, 6, 1);
        let b = ControllerHandle::new("/dev/input/event3", "Logitech G29", 24, 6, 1);
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_snapshot_sized_from_capabilities() {
        let handle = ControllerHandle::new("/dev/input/event3", "G29", 24, 6, 2);
        let snapshot = RawSnapshot::for_handle(&handle);
        assert_eq!(snapshot.buttons.len(), 24);
        assert_eq!(snapshot.axes.len(), 6);
        assert_eq!(snapshot.switches, vec![SwitchPosition::Center; 2]);
        assert!(snapshot.fits(&handle));

        let other = ControllerHandle::new("/dev/input/event4", "T300", 13, 4, 1);
        assert!(!snapshot.fits(&other));
    }

    #[test]
    fn test_switch_from_hat() {
        assert_eq!(SwitchPosition::from_hat(0, 0), SwitchPosition::Center);
        assert_eq!(SwitchPosition::from_hat(0, -1), SwitchPosition::Up);
        assert_eq!(SwitchPosition::from_hat(1, -1), SwitchPosition::UpRight);
        assert_eq!(SwitchPosition::from_hat(1, 0), SwitchPosition::Right);
        assert_eq!(SwitchPosition::from_hat(1, 1), SwitchPosition::DownRight);
        assert_eq!(SwitchPosition::from_hat(0, 1), SwitchPosition::Down);
        assert_eq!(SwitchPosition::from_hat(-1, 1), SwitchPosition::DownLeft);
        assert_eq!(SwitchPosition::from_hat(-1, 0), SwitchPosition::Left);
        assert_eq!(SwitchPosition::from_hat(-1, -1), SwitchPosition::UpLeft);
        // Some drivers report the full ABS range instead of -1/1
        assert_eq!(SwitchPosition::from_hat(127, 0), SwitchPosition::Right);
    }

    #[test]
    fn test_device_id_display() {
        let id = DeviceId::from("/dev/input/event7");
        assert_eq!(id.to_string(), "/dev/input/event7");
    }
}
