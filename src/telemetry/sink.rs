//! Telemetry sinks: where a tick's [`NormalizedTelemetry`] goes.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::controller::normalizer::NormalizedTelemetry;
use crate::error::{Result, WheelTrackerError};

/// Message from the sampling side to the presentation side.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    /// Load the display page; only the first request is acted on.
    Navigate,
    /// Active controller changed; `None` means nothing is selected.
    Controller(Option<String>),
    Telemetry(NormalizedTelemetry),
}

/// Consumer of normalized telemetry.
///
/// Implementations must not block the sampling loop; an unavailable target is
/// reported as `Publish` and the caller moves on.
pub trait TelemetrySink: Send {
    fn publish(&mut self, telemetry: &NormalizedTelemetry) -> Result<()>;
}

/// Forwards telemetry to the presenter over a bounded queue.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<DisplayUpdate>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<DisplayUpdate>) -> Self {
        Self { tx }
    }
}

impl TelemetrySink for ChannelSink {
    fn publish(&mut self, telemetry: &NormalizedTelemetry) -> Result<()> {
        self.tx
            .try_send(DisplayUpdate::Telemetry(*telemetry))
            .map_err(|e| match e {
                TrySendError::Full(_) => {
                    WheelTrackerError::Publish("display queue full, update dropped".to_string())
                }
                TrySendError::Closed(_) => {
                    WheelTrackerError::Publish("display closed".to_string())
                }
            })
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Sink that records everything published
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub published: Arc<Mutex<Vec<NormalizedTelemetry>>>,
        pub fail: Arc<Mutex<bool>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn published(&self) -> Vec<NormalizedTelemetry> {
            self.published.lock().unwrap().clone()
        }

        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }
    }

    impl TelemetrySink for RecordingSink {
        fn publish(&mut self, telemetry: &NormalizedTelemetry) -> Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(WheelTrackerError::Publish("mock sink offline".to_string()));
            }
            self.published.lock().unwrap().push(*telemetry);
            Ok(())
        }
    }
}
