//! # Evdev Device Provider
//!
//! Discovers racing wheels and joysticks through the Linux evdev interface and
//! reads their current state on demand.
//!
//! ## Device Detection
//!
//! Every `/dev/input/event*` node is inspected; a node is treated as a
//! controller when it reports `ABS_X` and at least one button.
//!
//! ## Layout
//!
//! - Axes: supported absolute axes in ascending code order, hats excluded,
//!   scaled from the driver's `[minimum, maximum]` to `[0, 1]`
//! - Switches: one per hat pair (`ABS_HAT0X`/`ABS_HAT0Y` .. `ABS_HAT3X`/`ABS_HAT3Y`)
//! - Buttons: supported keys in ascending code order

use chrono::Utc;
use evdev::{AbsoluteAxisType, Device, Key};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use super::provider::{ControllerHandle, DeviceId, DeviceProvider, RawSnapshot, SwitchPosition};
use crate::error::{Result, WheelTrackerError};

/// Hat axis pairs, one switch each.
const HAT_AXES: [(AbsoluteAxisType, AbsoluteAxisType); 4] = [
    (AbsoluteAxisType::ABS_HAT0X, AbsoluteAxisType::ABS_HAT0Y),
    (AbsoluteAxisType::ABS_HAT1X, AbsoluteAxisType::ABS_HAT1Y),
    (AbsoluteAxisType::ABS_HAT2X, AbsoluteAxisType::ABS_HAT2Y),
    (AbsoluteAxisType::ABS_HAT3X, AbsoluteAxisType::ABS_HAT3Y),
];

/// An opened controller and the code layout used to fill snapshots.
struct OpenDevice {
    device: Device,
    axes: Vec<AbsoluteAxisType>,
    hats: Vec<(AbsoluteAxisType, AbsoluteAxisType)>,
    buttons: Vec<Key>,
}

impl OpenDevice {
    /// Inspects a device; `None` if it does not look like a wheel or joystick.
    fn from_device(device: Device) -> Option<Self> {
        let abs = device.supported_absolute_axes()?;
        if !abs.contains(AbsoluteAxisType::ABS_X) {
            return None;
        }

        let buttons: Vec<Key> = device
            .supported_keys()
            .map(|keys| keys.iter().collect())
            .unwrap_or_default();
        if buttons.is_empty() {
            return None;
        }

        let hats: Vec<_> = HAT_AXES
            .iter()
            .copied()
            .filter(|(x, y)| abs.contains(*x) || abs.contains(*y))
            .collect();
        let axes: Vec<_> = abs.iter().filter(|axis| !is_hat(*axis)).collect();

        Some(Self {
            device,
            axes,
            hats,
            buttons,
        })
    }

    fn handle(&self, id: DeviceId) -> ControllerHandle {
        ControllerHandle {
            id,
            name: self.device.name().unwrap_or("Unknown controller").to_string(),
            button_count: self.buttons.len(),
            axis_count: self.axes.len(),
            switch_count: self.hats.len(),
        }
    }

    fn read_into(&self, snapshot: &mut RawSnapshot) -> std::io::Result<()> {
        let abs = self.device.get_abs_state()?;
        let keys = self.device.get_key_state()?;

        for (slot, axis) in snapshot.axes.iter_mut().zip(&self.axes) {
            let info = &abs[axis.0 as usize];
            *slot = scale_axis(info.value, info.minimum, info.maximum);
        }
        for (slot, (x, y)) in snapshot.switches.iter_mut().zip(&self.hats) {
            *slot = SwitchPosition::from_hat(abs[x.0 as usize].value, abs[y.0 as usize].value);
        }
        for (slot, key) in snapshot.buttons.iter_mut().zip(&self.buttons) {
            *slot = keys.contains(*key);
        }
        Ok(())
    }
}

fn is_hat(axis: AbsoluteAxisType) -> bool {
    HAT_AXES.iter().any(|(x, y)| *x == axis || *y == axis)
}

/// Scales a raw evdev value into `[0, 1]`.
///
/// A degenerate range (`maximum <= minimum`) maps to 0.
#[must_use]
pub fn scale_axis(value: i32, minimum: i32, maximum: i32) -> f64 {
    if maximum <= minimum {
        return 0.0;
    }
    let span = f64::from(maximum) - f64::from(minimum);
    ((f64::from(value) - f64::from(minimum)) / span).clamp(0.0, 1.0)
}

/// Controller provider backed by evdev.
///
/// Opened devices are cached by path so repeated reads reuse one file
/// descriptor. A failed read drops the cache entry; the next read reopens.
pub struct EvdevProvider {
    open: Mutex<HashMap<DeviceId, OpenDevice>>,
}

impl std::fmt::Debug for EvdevProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open: Vec<DeviceId> = self.lock().keys().cloned().collect();
        f.debug_struct("EvdevProvider")
            .field("open", &open)
            .finish()
    }
}

impl Default for EvdevProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EvdevProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DeviceId, OpenDevice>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_path(path: &Path) -> Result<OpenDevice> {
        let device = Device::open(path).map_err(|e| {
            WheelTrackerError::DeviceRead(format!("Failed to open {}: {}", path.display(), e))
        })?;
        OpenDevice::from_device(device)
            .ok_or_else(|| WheelTrackerError::DeviceNotFound(path.display().to_string()))
    }
}

impl DeviceProvider for EvdevProvider {
    fn devices(&self) -> Result<Vec<ControllerHandle>> {
        let input_dir = Path::new("/dev/input");
        if !input_dir.exists() {
            return Err(WheelTrackerError::DeviceNotFound(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut found: Vec<(DeviceId, OpenDevice)> = evdev::enumerate()
            .filter_map(|(path, device)| {
                let id = DeviceId(path.to_string_lossy().to_string());
                let id_info = device.input_id();
                debug!(
                    "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                    id,
                    id_info.vendor(),
                    id_info.product()
                );
                OpenDevice::from_device(device).map(|open| (id, open))
            })
            .collect();

        // Sort for deterministic ordering when several controllers are connected
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut open = self.lock();
        let mut handles = Vec::with_capacity(found.len());
        for (id, device) in found {
            let handle = device.handle(id.clone());
            debug!(
                "Controller '{}' at {}: {} axes, {} buttons, {} switches",
                handle.name, id, handle.axis_count, handle.button_count, handle.switch_count
            );
            open.insert(id, device);
            handles.push(handle);
        }

        // Forget devices that are gone
        open.retain(|id, _| handles.iter().any(|handle| &handle.id == id));
        Ok(handles)
    }

    fn read_state(&self, id: &DeviceId, snapshot: &mut RawSnapshot) -> Result<u64> {
        let mut open = self.lock();
        if !open.contains_key(id) {
            let device = Self::open_path(Path::new(&id.0))?;
            info!("Reopened controller at {}", id);
            open.insert(id.clone(), device);
        }

        let result = match open.get(id) {
            Some(device) => device.read_into(snapshot),
            None => return Err(WheelTrackerError::DeviceNotFound(id.to_string())),
        };

        match result {
            Ok(()) => Ok(Utc::now().timestamp_micros().max(0) as u64),
            Err(e) => {
                warn!("Dropping controller {} after failed read: {}", id, e);
                open.remove(id);
                Err(WheelTrackerError::DeviceRead(format!("Failed to read {}: {}", id, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_axis_endpoints() {
        assert_eq!(scale_axis(0, 0, 65535), 0.0);
        assert_eq!(scale_axis(65535, 0, 65535), 1.0);
        assert_eq!(scale_axis(0, -100, 100), 0.5);
    }

    #[test]
    fn test_scale_axis_clamps_out_of_range() {
        assert_eq!(scale_axis(-10, 0, 255), 0.0);
        assert_eq!(scale_axis(300, 0, 255), 1.0);
    }

    #[test]
    fn test_scale_axis_degenerate_range() {
        assert_eq!(scale_axis(5, 10, 10), 0.0);
        assert_eq!(scale_axis(5, 10, 0), 0.0);
    }

    #[test]
    fn test_hat_axes_are_excluded() {
        assert!(is_hat(AbsoluteAxisType::ABS_HAT0X));
        assert!(is_hat(AbsoluteAxisType::ABS_HAT3Y));
        assert!(!is_hat(AbsoluteAxisType::ABS_X));
        assert!(!is_hat(AbsoluteAxisType::ABS_RZ));
    }

    #[test]
    fn test_read_unknown_path_fails() {
        let provider = EvdevProvider::new();
        let handle = ControllerHandle::new("/dev/input/nonexistent_event_12345", "none", 1, 4, 0);
        let mut snapshot = RawSnapshot::for_handle(&handle);

        let result = provider.read_state(&handle.id, &mut snapshot);
        assert!(matches!(result, Err(WheelTrackerError::DeviceRead(_))));
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_enumerate_with_real_hardware() {
        // This test requires a connected wheel or joystick
        let provider = EvdevProvider::new();
        let devices = provider.devices().expect("Failed to enumerate");
        assert!(!devices.is_empty(), "Should detect a connected controller");

        let handle = &devices[0];
        assert!(handle.id.0.starts_with("/dev/input/event"));

        let mut snapshot = RawSnapshot::for_handle(handle);
        let reading = provider.read_state(&handle.id, &mut snapshot).unwrap();
        assert!(reading > 0);
        assert!(snapshot.axes.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
