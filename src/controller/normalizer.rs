//! # Normalizer Module
//!
//! Converts a [`RawSnapshot`] into [`NormalizedTelemetry`].
//!
//! ## Axis Layout
//!
//! The wheel's axis positions are a fixed contract with the hardware:
//!
//! | Index | Meaning |
//! |-------|---------|
//! | 0 | Steering |
//! | 2 | Throttle |
//! | 3 | Brake |
//!
//! ## Steering
//!
//! The steering offset is the raw axis minus [`CALIBRATION_OFFSET`] (the
//! wheel's physical center), rounded after the subtraction. The direction is
//! only recomputed when axis 0 actually moved since the previous reading;
//! otherwise the last direction is carried forward.
//!
//! ## Usage
//!
//! ```
//! use wheel_tracker::controller::normalizer::{Normalizer, SteeringDirection};
//! use wheel_tracker::controller::provider::RawSnapshot;
//!
//! let mut normalizer = Normalizer::new();
//! let mut raw = RawSnapshot { axes: vec![0.5022, 0.0, 0.25, 0.0], ..Default::default() };
//!
//! let first = normalizer.apply(&raw, 1)?;
//! assert_eq!(first.steering_offset, 0.0);
//! assert_eq!(first.steering_direction, SteeringDirection::Unchanged);
//!
//! raw.axes[0] = 0.6;
//! let second = normalizer.apply(&raw, 2)?;
//! assert_eq!(second.steering_direction, SteeringDirection::Right);
//! assert_eq!(second.throttle, 0.25);
//! # Ok::<(), wheel_tracker::error::WheelTrackerError>(())
//! ```

use std::fmt;

use super::provider::RawSnapshot;
use crate::error::{Result, WheelTrackerError};

/// Physical center of the steering axis.
pub const CALIBRATION_OFFSET: f64 = 0.5022;

/// Axis index carrying the steering position.
pub const STEERING_AXIS: usize = 0;
/// Axis index carrying the throttle pedal.
pub const THROTTLE_AXIS: usize = 2;
/// Axis index carrying the brake pedal.
pub const BRAKE_AXIS: usize = 3;

/// Minimum axis count a snapshot must carry.
pub const REQUIRED_AXES: usize = 4;

/// Decimal places kept on every published scalar.
const DECIMAL_PLACES: i32 = 4;

/// Direction the wheel last moved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SteeringDirection {
    Left,
    Right,
    #[default]
    Unchanged,
}

impl fmt::Display for SteeringDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Unchanged => "Unchanged",
        })
    }
}

/// Derived telemetry for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedTelemetry {
    pub reading_id: u64,
    pub throttle: f64,
    pub brake: f64,
    pub steering_offset: f64,
    pub steering_direction: SteeringDirection,
}

/// Steering history carried between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SteeringState {
    /// Axis 0 of the previous reading; `None` before the first one.
    pub last_axis: Option<f64>,
    pub direction: SteeringDirection,
}

/// Rounds to four decimal places, ties to even.
#[must_use]
pub fn round4(value: f64) -> f64 {
    let scale = 10f64.powi(DECIMAL_PLACES);
    (value * scale).round_ties_even() / scale
}

/// Computes telemetry from a snapshot and the previous steering state.
///
/// Pure: the same inputs always produce the same output.
///
/// # Errors
///
/// Returns `MalformedSnapshot` when the snapshot has fewer than
/// [`REQUIRED_AXES`] axes.
pub fn normalize(
    raw: &RawSnapshot,
    reading_id: u64,
    previous: &SteeringState,
) -> Result<NormalizedTelemetry> {
    if raw.axes.len() < REQUIRED_AXES {
        return Err(WheelTrackerError::MalformedSnapshot {
            required: REQUIRED_AXES,
            actual: raw.axes.len(),
        });
    }

    let steering = raw.axes[STEERING_AXIS];
    // Any inequality moves the direction; only `>` means Right.
    let steering_direction = match previous.last_axis {
        Some(last) if steering != last => {
            if steering > last {
                SteeringDirection::Right
            } else {
                SteeringDirection::Left
            }
        }
        _ => previous.direction,
    };

    Ok(NormalizedTelemetry {
        reading_id,
        throttle: round4(raw.axes[THROTTLE_AXIS]),
        brake: round4(raw.axes[BRAKE_AXIS]),
        steering_offset: round4(steering - CALIBRATION_OFFSET),
        steering_direction,
    })
}

/// Stateful wrapper around [`normalize`] that remembers the steering history.
#[derive(Debug, Default)]
pub struct Normalizer {
    steering: SteeringState,
}

impl Normalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes `raw` and advances the steering history.
    ///
    /// A malformed snapshot leaves the history untouched.
    pub fn apply(&mut self, raw: &RawSnapshot, reading_id: u64) -> Result<NormalizedTelemetry> {
        let telemetry = normalize(raw, reading_id, &self.steering)?;
        self.steering = SteeringState {
            last_axis: Some(raw.axes[STEERING_AXIS]),
            direction: telemetry.steering_direction,
        };
        Ok(telemetry)
    }

    /// Forgets the steering history (new device selected).
    pub fn reset(&mut self) {
        self.steering = SteeringState::default();
    }

    #[must_use]
    pub fn steering(&self) -> &SteeringState {
        &self.steering
    }
}
