//! # Wheel Tracker
//!
//! Sample a racing wheel and publish throttle, brake and steering telemetry.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, `config/default.toml`, or defaults)
//!    - Set up logging to stderr (stdout carries the script bridge)
//!    - Spawn the presenter, the sampling loop and the hotplug monitor
//!
//! 2. **User Actions** (one per line on stdin)
//!    - `connect`: scan for controllers, select the first one and load the display page
//!    - `init`: allocate buffers for the selected controller and begin tracking
//!    - `start` / `stop`: resume or pause publishing
//!    - `status`: log the current tracking state and display fields
//!    - `quit`: shut down (Ctrl+C does the same)
//!
//! 3. **Graceful Shutdown**
//!    - Cancel every task and wait for the sampling loop to finish
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use wheel_tracker::app::{parse_action, spawn_disconnect_watcher, Action, App};
use wheel_tracker::config::{Config, LoggingConfig};
use wheel_tracker::controller::evdev_provider::EvdevProvider;
use wheel_tracker::controller::{hotplug, ActiveDevice, DeviceProvider, DeviceRegistry};
use wheel_tracker::telemetry::{
    ChannelSink, DisplayFields, DisplayUpdate, JsonLinesBridge, NullBridge, Presenter, ScriptBridge,
};
use wheel_tracker::tracking::{RunState, SamplerHandle, Tracker};

/// Used when no path is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = init_logging(&config.logging)?;

    info!("Wheel Tracker v{} starting...", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let provider: Arc<dyn DeviceProvider> = Arc::new(EvdevProvider::new());
    let active = ActiveDevice::new();
    let registry = Arc::new(DeviceRegistry::new(Arc::clone(&provider), active.clone()));

    // Presentation side
    let (updates_tx, updates_rx) = mpsc::channel(config.tracking.channel_capacity);
    let (presenter_task, fields) = if config.bridge.enabled {
        info!("Forwarding axis updates for {}", config.bridge.url);
        spawn_presenter(JsonLinesBridge::stdout(config.bridge.url.clone()), updates_rx, cancel.clone())
    } else {
        spawn_presenter(NullBridge, updates_rx, cancel.clone())
    };

    // Sampling side
    let tracker = Tracker::new(
        Arc::clone(&provider),
        active.clone(),
        RunState::new(config.tracking.start_running),
        ChannelSink::new(updates_tx.clone()),
    );
    let sampler = SamplerHandle::spawn(tracker, config.tracking.interval(), cancel.clone());

    let hotplug_task = hotplug::spawn(
        Arc::clone(&registry),
        config.registry.hotplug_interval(),
        cancel.clone(),
    );
    let watcher_task = spawn_disconnect_watcher(
        registry.subscribe(),
        active.clone(),
        updates_tx.clone(),
        cancel.clone(),
    );

    let app = App::new(registry, active, sampler, updates_tx, fields);

    if config.registry.auto_connect {
        app.handle(Action::Connect).await;
        app.handle(Action::Init).await;
    }

    info!("Commands: connect, init, start, stop, status, quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match parse_action(&line) {
                    Some(action) => {
                        if !app.handle(action).await {
                            break;
                        }
                    }
                    None => warn!("Unknown command '{}'", line.trim()),
                },
                Ok(None) => {
                    debug!("stdin closed, waiting for Ctrl+C");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read command: {}", e);
                    stdin_open = false;
                }
            },

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    cancel.cancel();
    app.shutdown().await;
    for task in [hotplug_task, watcher_task, presenter_task] {
        if let Err(e) = task.await {
            warn!("Task ended abnormally: {}", e);
        }
    }

    info!("Wheel Tracker stopped");
    Ok(())
}

fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load config from {}", path)),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH)),
        None => Ok(Config::default()),
    }
}

/// Logs go to stderr, optionally also to a daily rolling file.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log filter")?;
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    if config.log_dir.is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, "wheel-tracker.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

fn spawn_presenter<B: ScriptBridge + 'static>(
    bridge: B,
    updates: mpsc::Receiver<DisplayUpdate>,
    cancel: CancellationToken,
) -> (JoinHandle<()>, watch::Receiver<DisplayFields>) {
    let (presenter, fields) = Presenter::new(bridge);
    (tokio::spawn(presenter.run(updates, cancel)), fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }
}
