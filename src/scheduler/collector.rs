//! One collection cycle: runtime snapshot, probe batch, aggregation.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use super::{aggregate, TargetRegistry};
use crate::probe::Dispatcher;
use crate::runtime::{RuntimeError, RuntimeMetrics};
use crate::store::Sample;

/// An unexpected failure while assembling a sample. The cycle is skipped.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("runtime snapshot failed: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("collection cycle panicked: {0}")]
    Panicked(String),
}

/// Produces one [`Sample`] per call.
pub struct Collector {
    targets: Arc<TargetRegistry>,
    dispatcher: Dispatcher,
    runtime: Arc<dyn RuntimeMetrics>,
}

impl Collector {
    pub fn new(
        targets: Arc<TargetRegistry>,
        dispatcher: Dispatcher,
        runtime: Arc<dyn RuntimeMetrics>,
    ) -> Self {
        Self {
            targets,
            dispatcher,
            runtime,
        }
    }

    /// Run one cycle over the currently registered targets.
    pub async fn collect(&self) -> Result<Sample, CycleError> {
        let started = Instant::now();
        let timestamp = Utc::now();

        let runtime = self.runtime.snapshot()?;
        let targets = self.targets.list();
        let results = self.dispatcher.dispatch(&targets).await;
        let summary = aggregate(&results);

        Ok(Sample {
            timestamp,
            runtime,
            summary,
            results,
            cycle_duration: started.elapsed(),
        })
    }
}
