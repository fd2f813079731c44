//! # Wheel Tracker Library
//!
//! Sample a racing wheel at a fixed interval and publish throttle, brake and
//! steering telemetry.
//!
//! This library provides the polling core: a registry of connected
//! controllers, the active controller selection, the cancellable sampling
//! loop, the normalizer, and the sink that feeds the display and its
//! embedded web view.

pub mod app;
pub mod config;
pub mod error;
pub mod controller;
pub mod telemetry;
pub mod tracking;
