//! The monitor facade used by the shell, the web API and the CLI.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MonitorConfig;
use crate::probe::{Dispatcher, Probe};
use crate::report::{self, Report, ReportError, ReportFormat};
use crate::runtime::RuntimeMetrics;
use crate::scheduler::{Collector, CycleError, Sampler, SamplerError, SamplerState, TargetError, TargetRegistry};
use crate::store::{HistoryStore, Sample, Statistics, Target};

/// Owns the target list, the history and the sampler.
pub struct Monitor {
    targets: Arc<TargetRegistry>,
    history: Arc<HistoryStore>,
    sampler: Sampler,
    default_interval: Duration,
}

impl Monitor {
    pub fn new(
        config: &MonitorConfig,
        probe: Arc<dyn Probe>,
        runtime: Arc<dyn RuntimeMetrics>,
    ) -> Self {
        let targets = Arc::new(TargetRegistry::new());
        let history = Arc::new(HistoryStore::new(config.history_size));
        let collector = Arc::new(Collector::new(
            targets.clone(),
            Dispatcher::new(probe, config.workers),
            runtime,
        ));
        let sampler = Sampler::new(collector, history.clone());

        Self {
            targets,
            history,
            sampler,
            default_interval: config.interval,
        }
    }

    /// Start sampling at `interval`, or the configured default.
    pub async fn start(&self, interval: Option<Duration>) -> Result<(), SamplerError> {
        self.sampler.start(interval.unwrap_or(self.default_interval)).await
    }

    pub async fn stop(&self) {
        self.sampler.stop().await
    }

    pub async fn set_interval(&self, interval: Duration) -> Result<(), SamplerError> {
        self.sampler.set_interval(interval).await
    }

    pub async fn sampler_state(&self) -> SamplerState {
        self.sampler.state().await
    }

    pub async fn interval(&self) -> Option<Duration> {
        self.sampler.interval().await
    }

    /// Run one cycle now and record its sample. Never overlaps a scheduled
    /// cycle.
    pub async fn collect_once(&self) -> Result<Arc<Sample>, CycleError> {
        self.sampler.collect_once().await
    }

    /// Latest sample, if any cycle has completed.
    pub fn status(&self) -> Option<Arc<Sample>> {
        self.history.latest()
    }

    pub fn history(&self) -> Vec<Arc<Sample>> {
        self.history.snapshot()
    }

    pub fn statistics(&self) -> Statistics {
        self.history.statistics()
    }

    pub async fn report(&self) -> Report {
        let interval = self.sampler.interval().await;
        Report::build(&self.history, &self.targets.list(), interval)
    }

    pub async fn write_report(&self, format: ReportFormat, path: &Path) -> Result<(), ReportError> {
        let report = self.report().await;
        report::write_report(&report, format, path)
    }

    pub fn add_target(&self, target: Target) -> Result<(), TargetError> {
        self.targets.add(target)
    }

    pub fn remove_target(&self, name: &str) -> Result<Target, TargetError> {
        self.targets.remove(name)
    }

    pub fn list_targets(&self) -> Arc<Vec<Target>> {
        self.targets.list()
    }

    pub fn replace_targets(&self, targets: Vec<Target>) -> Result<(), TargetError> {
        self.targets.replace_all(targets)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::monitor;
    use super::*;
    use crate::store::HealthStatus;

    #[tokio::test]
    async fn test_collect_once_records_sample() {
        let monitor = monitor();
        monitor.add_target(Target::http("api", "localhost")).unwrap();
        monitor.add_target(Target::http("down", "localhost")).unwrap();
        assert!(monitor.status().is_none());
        assert_eq!(monitor.statistics(), Statistics::NoData);

        let sample = monitor.collect_once().await.unwrap();
        assert_eq!(sample.summary.status, HealthStatus::Unhealthy);
        assert_eq!(monitor.status().unwrap().summary.failed, 1);
        assert_eq!(monitor.history().len(), 1);

        let report = monitor.report().await;
        assert_eq!(report.metadata.targets.len(), 2);
        assert_eq!(report.history.len(), 1);
        assert!(report.interval_secs.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_uses_default_interval() {
        let monitor = monitor();
        monitor.start(None).await.unwrap();
        assert_eq!(monitor.interval().await, Some(Duration::from_secs(1)));
        assert_eq!(monitor.sampler_state().await, SamplerState::Running);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        monitor.stop().await;
        assert_eq!(monitor.history().len(), 2);
        assert_eq!(monitor.sampler_state().await, SamplerState::Stopped);
    }

    #[tokio::test]
    async fn test_target_management() {
        let monitor = monitor();
        assert_eq!(
            monitor.add_target(Target::tcp("db", "")),
            Err(TargetError::EmptyAddress)
        );
        assert!(monitor.list_targets().is_empty());

        monitor.add_target(Target::tcp("db", "localhost:5432")).unwrap();
        assert_eq!(monitor.list_targets().len(), 1);
        monitor.remove_target("db").unwrap();
        assert!(monitor.list_targets().is_empty());
    }
}
