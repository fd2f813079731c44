//! # Controller Module
//!
//! Racing wheel discovery, selection and state normalization.
//!
//! This module handles:
//! - The device provider contract and its evdev implementation
//! - The deduplicated registry of connected controllers
//! - Connect/disconnect notifications (hotplug monitor)
//! - Selecting the single active controller
//! - Normalizing raw axis readings into throttle, brake and steering

pub mod evdev_provider;
pub mod hotplug;
pub mod normalizer;
pub mod provider;
pub mod registry;
pub mod selector;

pub use provider::{ControllerHandle, DeviceId, DeviceProvider, RawSnapshot, SwitchPosition};
pub use registry::{DeviceRegistry, RegistryEvent};
pub use selector::ActiveDevice;
