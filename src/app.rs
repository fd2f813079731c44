//! # User Actions
//!
//! The zero-argument actions the binary reads from stdin, and the task that
//! resets the controller field once the active controller is unplugged.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::{ActiveDevice, DeviceRegistry, RegistryEvent};
use crate::error::WheelTrackerError;
use crate::telemetry::{DisplayFields, DisplayUpdate};
use crate::tracking::SamplerHandle;

/// Zero-argument user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Init,
    Start,
    Stop,
    Status,
    Quit,
}

/// Parses one command line; case and surrounding whitespace are ignored.
pub fn parse_action(line: &str) -> Option<Action> {
    match line.trim().to_ascii_lowercase().as_str() {
        "connect" | "detect" => Some(Action::Connect),
        "init" => Some(Action::Init),
        "start" => Some(Action::Start),
        "stop" => Some(Action::Stop),
        "status" => Some(Action::Status),
        "quit" | "exit" => Some(Action::Quit),
        _ => None,
    }
}

/// Everything the user actions operate on.
pub struct App {
    registry: Arc<DeviceRegistry>,
    active: ActiveDevice,
    sampler: SamplerHandle,
    updates: mpsc::Sender<DisplayUpdate>,
    fields: watch::Receiver<DisplayFields>,
}

impl App {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        active: ActiveDevice,
        sampler: SamplerHandle,
        updates: mpsc::Sender<DisplayUpdate>,
        fields: watch::Receiver<DisplayFields>,
    ) -> Self {
        Self {
            registry,
            active,
            sampler,
            updates,
            fields,
        }
    }

    /// Scans for controllers, selects the first and shows its name.
    pub async fn connect(&self) {
        if let Err(e) = self.registry.scan() {
            warn!("Controller scan failed: {}", e);
        }
        let selected = self.active.select_first_available(&self.registry);
        self.send(DisplayUpdate::Navigate).await;
        self.show_controller(selected.map(|handle| handle.name)).await;
    }

    pub async fn init(&self) {
        match self.sampler.init().await {
            Ok(handle) => info!("Tracking initialised for '{}'", handle.name),
            Err(WheelTrackerError::NoActiveDevice) => {
                warn!("Cannot initialise tracking: no controller selected");
                self.show_controller(None).await;
            }
            Err(e) => warn!("Cannot initialise tracking: {}", e),
        }
    }

    pub async fn status(&self) {
        let state = self.sampler.state().await;
        let fields = self.fields.borrow().clone();
        info!(
            "State: {:?} | controller: '{}' | reading: {} | throttle: {} | brake: {} | steering: {} ({})",
            state,
            fields.controller_name,
            fields.reading_id,
            fields.throttle,
            fields.brake,
            fields.steering,
            fields.direction
        );
    }

    async fn show_controller(&self, name: Option<String>) {
        self.send(DisplayUpdate::Controller(name)).await;
    }

    async fn send(&self, update: DisplayUpdate) {
        if let Err(e) = self.updates.send(update).await {
            warn!("Display is gone, {:?} not shown", e.0);
        }
    }

    /// Runs one action; returns false when the application should exit.
    pub async fn handle(&self, action: Action) -> bool {
        debug!("Action: {:?}", action);
        match action {
            Action::Connect => self.connect().await,
            Action::Init => self.init().await,
            Action::Start => self.sampler.start(),
            Action::Stop => self.sampler.stop(),
            Action::Status => self.status().await,
            Action::Quit => return false,
        }
        true
    }

    /// Stops the sampling loop and waits for it.
    pub async fn shutdown(self) {
        self.sampler.shutdown().await;
    }
}

/// Shows "no controller" once the active controller is unplugged.
pub fn spawn_disconnect_watcher(
    mut events: broadcast::Receiver<RegistryEvent>,
    active: ActiveDevice,
    updates: mpsc::Sender<DisplayUpdate>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };
            match event {
                Ok(RegistryEvent::Disconnected(handle)) if active.current().is_none() => {
                    debug!("Active controller {} is gone", handle.id);
                    if updates.send(DisplayUpdate::Controller(None)).await.is_err() {
                        warn!("Display is gone, controller reset not shown");
                        break;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Missed {} registry notifications", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
