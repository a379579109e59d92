//! Bounded fan-out of one batch of probes.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{timeout_at, Instant};

use super::Probe;
use crate::store::{ProbeResult, Target};

/// Default worker-pool width.
pub const DEFAULT_WORKERS: usize = 10;

/// Runs a batch of probes over a bounded worker pool.
///
/// Every target yields exactly one result. A probe that has not finished
/// `2 × timeout` after the batch started is reported as `deadline exceeded`,
/// a probe that panics as `probe task failed`. A failed probe's elapsed time
/// counts from when it got a worker slot.
pub struct Dispatcher {
    probe: Arc<dyn Probe>,
    workers: Arc<Semaphore>,
    width: usize,
}

impl Dispatcher {
    pub fn new(probe: Arc<dyn Probe>, width: usize) -> Self {
        let width = width.max(1);
        Self {
            probe,
            workers: Arc::new(Semaphore::new(width)),
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Probe every target once. Results come back in input order.
    pub async fn dispatch(&self, targets: &[Target]) -> Vec<ProbeResult> {
        if targets.is_empty() {
            return Vec::new();
        }

        let started = Instant::now();
        for (index, target) in targets.iter().enumerate() {
            tracing::debug!(
                index,
                target_name = %target.name,
                address = %target.address,
                kind = target.kind.name(),
                timeout_ms = target.timeout.as_millis() as u64,
                "Dispatching probe"
            );
        }

        let mut set = JoinSet::new();
        let mut batch_deadline = started;

        for (index, target) in targets.iter().enumerate() {
            let deadline = started + target.supervisory_timeout();
            batch_deadline = batch_deadline.max(deadline);

            let probe = self.probe.clone();
            let workers = self.workers.clone();
            let target = target.clone();

            set.spawn(async move {
                let probed = target.clone();
                let acquired = Arc::new(OnceLock::new());
                let acquired_at = acquired.clone();
                let worker = AbortOnDrop(tokio::spawn(async move {
                    // The semaphore is never closed.
                    let _permit = workers.acquire_owned().await.ok();
                    let _ = acquired_at.set(Instant::now());
                    probe.check(&probed).await
                }));

                let result = match timeout_at(deadline, worker).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => {
                        tracing::error!(target_name = %target.name, error = %e, "Probe task failed");
                        let elapsed = acquired.get().map_or(Duration::ZERO, Instant::elapsed);
                        ProbeResult::failed(&target, elapsed, None, "probe task failed")
                    }
                    Err(_) => {
                        tracing::warn!(
                            target_name = %target.name,
                            address = %target.address,
                            deadline_ms = target.supervisory_timeout().as_millis() as u64,
                            "Probe deadline exceeded"
                        );
                        ProbeResult::deadline_exceeded(&target, started.elapsed())
                    }
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<ProbeResult>> = vec![None; targets.len()];
        loop {
            match timeout_at(batch_deadline, set.join_next()).await {
                Ok(Some(Ok((index, result)))) => slots[index] = Some(result),
                Ok(Some(Err(e))) => {
                    tracing::error!(error = %e, "Probe supervisor task failed");
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(pending = set.len(), "Batch deadline reached, abandoning pending probes");
                    set.abort_all();
                    break;
                }
            }
        }

        let results: Vec<ProbeResult> = slots
            .into_iter()
            .zip(targets)
            .map(|(slot, target)| {
                slot.unwrap_or_else(|| ProbeResult::deadline_exceeded(target, started.elapsed()))
            })
            .collect();

        tracing::debug!(
            targets = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch complete"
        );
        results
    }
}

/// Join handle that aborts its task when dropped, so an abandoned probe
/// releases its socket and worker slot.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}
