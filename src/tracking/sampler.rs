//! Background task driving a [`Tracker`] at a fixed interval.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{RunState, Tracker, TrackingState};
use crate::controller::provider::ControllerHandle;
use crate::error::{Result, WheelTrackerError};
use crate::telemetry::sink::TelemetrySink;

/// Default tick period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);

/// Queue depth for user commands; they are rare.
const COMMAND_CAPACITY: usize = 8;

enum Command {
    Init(oneshot::Sender<Result<ControllerHandle>>),
    State(oneshot::Sender<TrackingState>),
}

/// Handle to a running sampling loop.
///
/// `start`/`stop` flip the shared [`RunState`] directly; `init` and `state`
/// are answered by the loop itself between ticks.
pub struct SamplerHandle {
    commands: mpsc::Sender<Command>,
    run_state: RunState,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// Spawns the loop. It ticks every `period` until [`SamplerHandle::shutdown`]
    /// or until `cancel` (shared with the rest of the application) fires.
    pub fn spawn<S>(tracker: Tracker<S>, period: Duration, cancel: CancellationToken) -> Self
    where
        S: TelemetrySink + 'static,
    {
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
        let run_state = tracker.run_state().clone();
        let task = tokio::spawn(run_loop(tracker, rx, period, cancel.clone()));
        Self {
            commands,
            run_state,
            cancel,
            task,
        }
    }

    /// Asks the loop to initialise tracking for the active controller.
    pub async fn init(&self) -> Result<ControllerHandle> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Init(reply))
            .await
            .map_err(|_| WheelTrackerError::SamplerStopped)?;
        rx.await.map_err(|_| WheelTrackerError::SamplerStopped)?
    }

    pub async fn state(&self) -> Result<TrackingState> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::State(reply))
            .await
            .map_err(|_| WheelTrackerError::SamplerStopped)?;
        rx.await.map_err(|_| WheelTrackerError::SamplerStopped)
    }

    pub fn start(&self) {
        info!("Tracking started");
        self.run_state.start();
    }

    pub fn stop(&self) {
        info!("Tracking stopped");
        self.run_state.stop();
    }

    #[must_use]
    pub fn run_state(&self) -> &RunState {
        &self.run_state
    }

    /// Cancels the loop and waits for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Sampling task ended abnormally: {}", e);
        }
    }
}

async fn run_loop<S: TelemetrySink>(
    mut tracker: Tracker<S>,
    mut commands: mpsc::Receiver<Command>,
    period: Duration,
    cancel: CancellationToken,
) {
    info!("Sampling loop started ({}ms period)", period.as_millis());
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(command) = commands.recv() => match command {
                Command::Init(reply) => {
                    let _ = reply.send(tracker.init());
                }
                Command::State(reply) => {
                    let _ = reply.send(tracker.state());
                }
            },
            _ = ticker.tick() => {
                if cancel.is_cancelled() {
                    break;
                }
                let outcome = tracker.tick();
                ticks += 1;
                debug!("Tick {}: {:?}", ticks, outcome);
            }
        }
    }

    info!("Sampling loop stopped after {} ticks", ticks);
}
