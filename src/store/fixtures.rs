//! Test fixtures shared across the store tests.

use chrono::Utc;
use std::time::Duration;

use super::models::{BatchSummary, HealthStatus, RuntimeSnapshot, Sample};

pub(crate) fn sample_with(total: usize, succeeded: usize) -> Sample {
    let failed = total - succeeded;
    Sample {
        timestamp: Utc::now(),
        runtime: RuntimeSnapshot::new(),
        summary: BatchSummary {
            total,
            succeeded,
            failed,
            success_ratio: if total == 0 { 1.0 } else { succeeded as f64 / total as f64 },
            avg_elapsed_ms: 0.0,
            min_elapsed_ms: 0.0,
            max_elapsed_ms: 0.0,
            failing_targets: (0..failed).map(|i| format!("t{}", i)).collect(),
            status: match (total, failed) {
                (0, _) => HealthStatus::NoTargets,
                (_, 0) => HealthStatus::Healthy,
                _ => HealthStatus::Unhealthy,
            },
        },
        results: Vec::new(),
        cycle_duration: Duration::from_millis(5),
    }
}
