//! Scheduler module: the sampling loop and the collection cycle it drives.

mod aggregate;
mod collector;
mod targets;

pub use aggregate::*;
pub use collector::{Collector, CycleError};
pub use targets::*;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::store::{HistoryStore, Sample};

/// Default sampling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SamplerError {
    #[error("sampler is already running")]
    AlreadyRunning,
    #[error("sampling interval must be positive")]
    InvalidInterval,
}

/// Externally visible sampler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplerState {
    Idle,
    Running,
    Stopped,
}

impl std::fmt::Display for SamplerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SamplerState::Idle => "IDLE",
            SamplerState::Running => "RUNNING",
            SamplerState::Stopped => "STOPPED",
        })
    }
}

enum Lifecycle {
    Idle,
    Running {
        interval: Duration,
        stop_tx: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Runs collection cycles one at a time and records their samples.
struct Cycles {
    collector: Arc<Collector>,
    history: Arc<HistoryStore>,
    turn: Mutex<()>,
}

impl Cycles {
    /// Collect and append while holding the turn, so samples land in cycle
    /// order. A panic inside the cycle becomes [`CycleError::Panicked`].
    async fn run(&self) -> Result<Arc<Sample>, CycleError> {
        let _turn = self.turn.lock().await;
        let collector = self.collector.clone();
        let sample = tokio::spawn(async move { collector.collect().await })
            .await
            .map_err(|e| CycleError::Panicked(e.to_string()))??;
        Ok(self.history.append(sample))
    }
}

/// Fires one collection cycle per interval and appends each sample to the
/// history.
///
/// Cycles never overlap, manual ones included: a cycle that overruns the
/// interval delays the next one and the missed ticks are skipped.
pub struct Sampler {
    cycles: Arc<Cycles>,
    lifecycle: Mutex<Lifecycle>,
}

impl Sampler {
    pub fn new(collector: Arc<Collector>, history: Arc<HistoryStore>) -> Self {
        Self {
            cycles: Arc::new(Cycles {
                collector,
                history,
                turn: Mutex::new(()),
            }),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Run one cycle outside the schedule. Waits for any cycle in flight.
    pub async fn collect_once(&self) -> Result<Arc<Sample>, CycleError> {
        self.cycles.run().await
    }

    /// Begin sampling. The first cycle runs immediately.
    pub async fn start(&self, interval: Duration) -> Result<(), SamplerError> {
        if interval.is_zero() {
            return Err(SamplerError::InvalidInterval);
        }

        let mut lifecycle = self.lifecycle.lock().await;
        if let Lifecycle::Running { handle, .. } = &*lifecycle {
            if !handle.is_finished() {
                return Err(SamplerError::AlreadyRunning);
            }
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_sampling_loop(self.cycles.clone(), interval, stop_rx));

        tracing::info!(interval_secs = interval.as_secs_f64(), "Sampler started");
        *lifecycle = Lifecycle::Running {
            interval,
            stop_tx,
            handle,
        };
        Ok(())
    }

    /// Stop sampling. A cycle in flight completes and is recorded; nothing is
    /// recorded after this returns. Calling it when not running does nothing.
    pub async fn stop(&self) {
        let running = {
            let mut lifecycle = self.lifecycle.lock().await;
            if !matches!(*lifecycle, Lifecycle::Running { .. }) {
                return;
            }
            std::mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        };
        let Lifecycle::Running { stop_tx, handle, .. } = running else {
            return;
        };

        let _ = stop_tx.send(true);
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Sampling loop ended abnormally");
        }
        // A manual cycle already holding or queued for the turn lands first.
        drop(self.cycles.turn.lock().await);
        tracing::info!("Sampler stopped");
    }

    /// Restart with a new interval.
    pub async fn set_interval(&self, interval: Duration) -> Result<(), SamplerError> {
        if interval.is_zero() {
            return Err(SamplerError::InvalidInterval);
        }
        self.stop().await;
        self.start(interval).await
    }

    pub async fn state(&self) -> SamplerState {
        match &*self.lifecycle.lock().await {
            Lifecycle::Idle => SamplerState::Idle,
            Lifecycle::Running { handle, .. } if handle.is_finished() => SamplerState::Idle,
            Lifecycle::Running { .. } => SamplerState::Running,
            Lifecycle::Stopped => SamplerState::Stopped,
        }
    }

    /// Interval of the running schedule.
    pub async fn interval(&self) -> Option<Duration> {
        match &*self.lifecycle.lock().await {
            Lifecycle::Running { interval, handle, .. } if !handle.is_finished() => Some(*interval),
            _ => None,
        }
    }
}

async fn run_sampling_loop(
    cycles: Arc<Cycles>,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycle: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => {
                break;
            }
            _ = ticker.tick() => {
                cycle += 1;
                match cycles.run().await {
                    Ok(sample) => {
                        let summary = &sample.summary;
                        tracing::info!(
                            cycle,
                            status = %summary.status,
                            total = summary.total,
                            failed = summary.failed,
                            cycle_ms = sample.cycle_duration.as_millis() as u64,
                            "Collection cycle complete"
                        );
                        for name in &summary.failing_targets {
                            tracing::warn!(cycle, target_name = %name, "Target unhealthy");
                        }
                    }
                    Err(e) => {
                        tracing::error!(cycle, error = %e, "Collection cycle failed, skipping sample");
                    }
                }
            }
        }
    }

    tracing::debug!(cycles = cycle, "Sampling loop exited");
}
