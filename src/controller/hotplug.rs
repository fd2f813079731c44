//! # Hotplug Monitor
//!
//! Periodically compares the provider's device list with the registry and
//! turns the difference into connect/disconnect notifications.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::DeviceRegistry;
use crate::error::Result;

/// Applies one provider-vs-registry diff.
///
/// Returns `(connected, disconnected)` counts.
pub fn sync_once(registry: &DeviceRegistry) -> Result<(usize, usize)> {
    let present = registry.provider().devices()?;

    let mut connected = 0;
    for handle in &present {
        if registry.on_connected(handle.clone()) {
            connected += 1;
        }
    }

    let mut disconnected = 0;
    for known in registry.handles() {
        if !present.contains(&known) && registry.on_disconnected(&known) {
            disconnected += 1;
        }
    }

    Ok((connected, disconnected))
}

/// Spawns the monitor; it stops when `cancel` fires.
pub fn spawn(
    registry: Arc<DeviceRegistry>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Hotplug monitor started ({}ms period)", period.as_millis());
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match sync_once(&registry) {
                        Ok((0, 0)) => {}
                        Ok((added, removed)) => {
                            debug!("Hotplug: {} connected, {} disconnected", added, removed);
                        }
                        Err(e) => warn!("Hotplug scan failed: {}", e),
                    }
                }
            }
        }

        info!("Hotplug monitor stopped");
    })
}
