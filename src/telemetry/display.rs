//! # Presenter
//!
//! The only owner of presentation state. It consumes [`DisplayUpdate`]s from
//! the sampling loop, keeps the six display fields current, and forwards the
//! steering offset through a [`ScriptBridge`].
//!
//! Any UI observes the fields through a `watch` receiver; rendering timing is
//! decoupled from the sampling loop.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::bridge::{axis_update_script, ScriptBridge};
use super::sink::{DisplayUpdate, TelemetrySink};
use crate::controller::normalizer::NormalizedTelemetry;
use crate::error::{Result, WheelTrackerError};

/// Text shown in the controller field when nothing is selected.
pub const NO_CONTROLLER_TEXT: &str = "No controller detected";

/// Named text fields of the display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayFields {
    pub controller_name: String,
    pub reading_id: String,
    pub throttle: String,
    pub brake: String,
    pub steering: String,
    pub direction: String,
}

impl DisplayFields {
    fn set_controller(&mut self, name: Option<&str>) {
        self.controller_name = name.unwrap_or(NO_CONTROLLER_TEXT).to_string();
    }

    fn set_telemetry(&mut self, telemetry: &NormalizedTelemetry) {
        self.reading_id = telemetry.reading_id.to_string();
        self.throttle = telemetry.throttle.to_string();
        self.brake = telemetry.brake.to_string();
        self.steering = telemetry.steering_offset.to_string();
        self.direction = telemetry.steering_direction.to_string();
    }
}

/// Presentation-side task state.
pub struct Presenter<B: ScriptBridge> {
    fields: watch::Sender<DisplayFields>,
    bridge: B,
    navigated: bool,
}

impl<B: ScriptBridge> Presenter<B> {
    /// Creates a presenter and a receiver observing its fields.
    pub fn new(bridge: B) -> (Self, watch::Receiver<DisplayFields>) {
        let (fields, rx) = watch::channel(DisplayFields::default());
        (
            Self {
                fields,
                bridge,
                navigated: false,
            },
            rx,
        )
    }

    /// Another observer of the display fields.
    pub fn subscribe(&self) -> watch::Receiver<DisplayFields> {
        self.fields.subscribe()
    }

    pub fn fields(&self) -> DisplayFields {
        self.fields.borrow().clone()
    }

    /// Shows the selected controller, or [`NO_CONTROLLER_TEXT`].
    pub fn show_controller(&mut self, name: Option<&str>) {
        self.fields.send_modify(|fields| fields.set_controller(name));
    }

    /// Loads the display page the first time it is called.
    pub fn navigate(&mut self) -> Result<()> {
        if self.navigated {
            return Ok(());
        }
        self.bridge.navigate()?;
        self.navigated = true;
        Ok(())
    }

    /// Applies one update; bridge failures are logged and swallowed.
    pub fn apply(&mut self, update: DisplayUpdate) {
        match update {
            DisplayUpdate::Navigate => {
                if let Err(e) = self.navigate() {
                    warn!("Display page not loaded: {}", e);
                }
            }
            DisplayUpdate::Controller(name) => self.show_controller(name.as_deref()),
            DisplayUpdate::Telemetry(telemetry) => {
                if let Err(e) = self.publish(&telemetry) {
                    warn!("Telemetry {} not forwarded: {}", telemetry.reading_id, e);
                }
            }
        }
    }

    /// Consumes updates until the queue closes or `cancel` fires.
    pub async fn run(mut self, mut updates: mpsc::Receiver<DisplayUpdate>, cancel: CancellationToken) {
        info!("Presenter started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                update = updates.recv() => match update {
                    Some(update) => self.apply(update),
                    None => break,
                },
            }
        }
        info!("Presenter stopped");
    }
}

impl<B: ScriptBridge> TelemetrySink for Presenter<B> {
    fn publish(&mut self, telemetry: &NormalizedTelemetry) -> Result<()> {
        self.fields.send_modify(|fields| fields.set_telemetry(telemetry));
        debug!(
            "Reading {}: throttle={} brake={} steering={} ({})",
            telemetry.reading_id,
            telemetry.throttle,
            telemetry.brake,
            telemetry.steering_offset,
            telemetry.steering_direction
        );

        self.bridge
            .evaluate(&axis_update_script(telemetry.steering_offset))
            .map_err(|e| match e {
                WheelTrackerError::Publish(_) => e,
                other => WheelTrackerError::Publish(other.to_string()),
            })
    }
}
