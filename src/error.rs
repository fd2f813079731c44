//! # Error Types
//!
//! Custom error types for Wheel Tracker using `thiserror`.

use thiserror::Error;

/// Main error type for Wheel Tracker
#[derive(Debug, Error)]
pub enum WheelTrackerError {
    /// Tracking was initialised while no controller was selected
    #[error("No controller detected")]
    NoActiveDevice,

    /// Axis array shorter than the wheel layout requires
    #[error("Malformed snapshot: {actual} axes reported, at least {required} required")]
    MalformedSnapshot { required: usize, actual: usize },

    /// Reading the device state failed (e.g. unplugged mid-read)
    #[error("Device read error: {0}")]
    DeviceRead(String),

    /// A requested device is not known to the provider
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The display or script bridge could not take the update
    #[error("Publish error: {0}")]
    Publish(String),

    /// The sampling loop has shut down and no longer takes requests
    #[error("Sampling loop stopped")]
    SamplerStopped,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Script bridge serialisation errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Wheel Tracker
pub type Result<T> = std::result::Result<T, WheelTrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_active_device_message() {
        assert_eq!(WheelTrackerError::NoActiveDevice.to_string(), "No controller detected");
    }

    #[test]
    fn test_malformed_snapshot_message() {
        let err = WheelTrackerError::MalformedSnapshot { required: 4, actual: 2 };
        assert_eq!(
            err.to_string(),
            "Malformed snapshot: 2 axes reported, at least 4 required"
        );
    }
}
