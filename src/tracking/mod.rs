//! # Tracking Module
//!
//! The sampling loop: read the active controller, normalize, publish.
//!
//! ## State Machine
//!
//! ```text
//! Idle --init--> Running <--start/stop--> Paused
//! ```
//!
//! The loop keeps ticking while paused but performs no read and no publish.
//! There is no terminal state other than shutting the task down.
//!
//! ## Failure Policy
//!
//! A single bad tick never ends the loop. Device read failures and publish
//! failures are logged and the next tick retries. A malformed snapshot is an
//! invariant violation: `init` rejects such a device up front, and at tick time
//! it is logged and skipped.

pub mod sampler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::controller::normalizer::{NormalizedTelemetry, Normalizer, REQUIRED_AXES};
use crate::controller::provider::{ControllerHandle, DeviceProvider, RawSnapshot};
use crate::controller::selector::ActiveDevice;
use crate::error::{Result, WheelTrackerError};
use crate::telemetry::sink::TelemetrySink;

pub use sampler::SamplerHandle;

/// Process-wide run/pause flag, shared between user actions and the loop.
#[derive(Debug, Clone)]
pub struct RunState(Arc<AtomicBool>);

impl RunState {
    pub fn new(running: bool) -> Self {
        Self(Arc::new(AtomicBool::new(running)))
    }

    pub fn start(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Lifecycle state of the sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Idle,
    Running,
    Paused,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Tracking not initialised yet
    Idle,
    /// Run state is off; nothing read
    Paused,
    /// No active controller selected
    NoDevice,
    ReadFailed,
    Malformed,
    Published(NormalizedTelemetry),
    /// Normalized but the sink refused it
    PublishFailed(NormalizedTelemetry),
}

/// Controller being tracked and its preallocated buffers.
#[derive(Debug)]
struct TrackedDevice {
    handle: ControllerHandle,
    snapshot: RawSnapshot,
}

impl TrackedDevice {
    fn new(handle: ControllerHandle) -> Self {
        Self {
            snapshot: RawSnapshot::for_handle(&handle),
            handle,
        }
    }
}

/// One sampling loop's state. Driven tick by tick, either directly or by a
/// [`SamplerHandle`].
pub struct Tracker<S: TelemetrySink> {
    provider: Arc<dyn DeviceProvider>,
    active: ActiveDevice,
    run_state: RunState,
    tracked: Option<TrackedDevice>,
    normalizer: Normalizer,
    latest: Option<NormalizedTelemetry>,
    sink: S,
}

impl<S: TelemetrySink> Tracker<S> {
    pub fn new(
        provider: Arc<dyn DeviceProvider>,
        active: ActiveDevice,
        run_state: RunState,
        sink: S,
    ) -> Self {
        Self {
            provider,
            active,
            run_state,
            tracked: None,
            normalizer: Normalizer::new(),
            latest: None,
            sink,
        }
    }

    /// Allocates buffers for the active controller and leaves `Idle`.
    ///
    /// # Errors
    ///
    /// - `NoActiveDevice` if nothing is selected
    /// - `MalformedSnapshot` if the controller has fewer axes than the wheel layout needs
    pub fn init(&mut self) -> Result<ControllerHandle> {
        let handle = self.active.current().ok_or(WheelTrackerError::NoActiveDevice)?;
        if handle.axis_count < REQUIRED_AXES {
            error!(
                "Controller '{}' reports {} axes, cannot track",
                handle.name, handle.axis_count
            );
            return Err(WheelTrackerError::MalformedSnapshot {
                required: REQUIRED_AXES,
                actual: handle.axis_count,
            });
        }

        info!(
            "Tracking '{}' ({} buttons, {} axes, {} switches)",
            handle.name, handle.button_count, handle.axis_count, handle.switch_count
        );
        self.tracked = Some(TrackedDevice::new(handle.clone()));
        self.normalizer.reset();
        Ok(handle)
    }

    /// Runs one sampling cycle.
    pub fn tick(&mut self) -> TickOutcome {
        let Some(tracked) = self.tracked.as_mut() else {
            return TickOutcome::Idle;
        };
        if !self.run_state.is_running() {
            return TickOutcome::Paused;
        }
        let Some(active) = self.active.current() else {
            debug!("No active controller, skipping tick");
            return TickOutcome::NoDevice;
        };

        if active.id != tracked.handle.id || !tracked.snapshot.fits(&active) {
            info!("Active controller is now '{}', reallocating buffers", active.name);
            *tracked = TrackedDevice::new(active);
            self.normalizer.reset();
        }

        let reading_id = match self.provider.read_state(&tracked.handle.id, &mut tracked.snapshot) {
            Ok(reading_id) => reading_id,
            Err(e) => {
                warn!("Tick skipped: {}", e);
                return TickOutcome::ReadFailed;
            }
        };

        let telemetry = match self.normalizer.apply(&tracked.snapshot, reading_id) {
            Ok(telemetry) => telemetry,
            Err(e) => {
                error!("Reading {} dropped: {}", reading_id, e);
                return TickOutcome::Malformed;
            }
        };
        self.latest = Some(telemetry);

        match self.sink.publish(&telemetry) {
            Ok(()) => TickOutcome::Published(telemetry),
            Err(e) => {
                warn!("Reading {} not published: {}", reading_id, e);
                TickOutcome::PublishFailed(telemetry)
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> TrackingState {
        match (&self.tracked, self.run_state.is_running()) {
            (None, _) => TrackingState::Idle,
            (Some(_), true) => TrackingState::Running,
            (Some(_), false) => TrackingState::Paused,
        }
    }

    /// Last successfully normalized telemetry.
    #[must_use]
    pub fn latest(&self) -> Option<&NormalizedTelemetry> {
        self.latest.as_ref()
    }

    #[must_use]
    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    /// Buffers currently written by each tick.
    #[must_use]
    pub fn snapshot(&self) -> Option<&RawSnapshot> {
        self.tracked.as_ref().map(|tracked| &tracked.snapshot)
    }
}
