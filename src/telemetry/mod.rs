//! # Telemetry Module
//!
//! Publishes normalized telemetry to the presentation layer.
//!
//! This module handles:
//! - The sink contract used by the sampling loop
//! - A bounded, non-blocking queue between sampling and presentation
//! - The display fields (controller name, reading id, throttle, brake, steering, direction)
//! - Dispatching `axis-update` events to the embedded web view

pub mod bridge;
pub mod display;
pub mod sink;

pub use bridge::{axis_update_script, JsonLinesBridge, NullBridge, ScriptBridge};
pub use display::{DisplayFields, Presenter, NO_CONTROLLER_TEXT};
pub use sink::{ChannelSink, DisplayUpdate, TelemetrySink};
