//! Reduction of a batch of probe results.

use std::time::Duration;

use crate::store::{BatchSummary, HealthStatus, ProbeResult};

/// Summarize one batch.
///
/// The result does not depend on the order of `results`. An empty batch is
/// `NO_TARGETS` with a success ratio of 1.0.
pub fn aggregate(results: &[ProbeResult]) -> BatchSummary {
    let total = results.len();
    if total == 0 {
        return BatchSummary {
            total: 0,
            succeeded: 0,
            failed: 0,
            success_ratio: 1.0,
            avg_elapsed_ms: 0.0,
            min_elapsed_ms: 0.0,
            max_elapsed_ms: 0.0,
            failing_targets: Vec::new(),
            status: HealthStatus::NoTargets,
        };
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    let failed = total - succeeded;

    let total_nanos: u128 = results.iter().map(|r| r.elapsed.as_nanos()).sum();
    let min = results.iter().map(|r| r.elapsed).min().unwrap_or_default();
    let max = results.iter().map(|r| r.elapsed).max().unwrap_or_default();

    let mut failing_targets: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.target.clone())
        .collect();
    failing_targets.sort();

    BatchSummary {
        total,
        succeeded,
        failed,
        success_ratio: succeeded as f64 / total as f64,
        avg_elapsed_ms: total_nanos as f64 / total as f64 / 1_000_000.0,
        min_elapsed_ms: millis(min),
        max_elapsed_ms: millis(max),
        failing_targets,
        status: if failed == 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
    }
}

fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Target;

    fn result(name: &str, ms: u64, success: bool) -> ProbeResult {
        let target = Target::http(name, "localhost");
        let elapsed = Duration::from_millis(ms);
        if success {
            ProbeResult::passed(&target, elapsed, Some(200))
        } else {
            ProbeResult::failed(&target, elapsed, None, "Connection error: refused")
        }
    }

    #[test]
    fn test_empty_batch() {
        let summary = aggregate(&[]);
        assert_eq!(summary.status, HealthStatus::NoTargets);
        assert_eq!(summary.success_ratio, 1.0);
        assert_eq!(summary.health_percentage(), 100.0);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.avg_elapsed_ms, 0.0);
    }

    #[test]
    fn test_single_result() {
        let summary = aggregate(&[result("api", 42, true)]);
        assert_eq!(summary.status, HealthStatus::Healthy);
        assert_eq!(summary.min_elapsed_ms, 42.0);
        assert_eq!(summary.max_elapsed_ms, 42.0);
        assert_eq!(summary.avg_elapsed_ms, 42.0);
    }

    #[test]
    fn test_counts_and_failures() {
        let summary = aggregate(&[
            result("web", 10, true),
            result("db", 30, false),
            result("api", 20, true),
            result("cache", 5000, false),
        ]);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.success_ratio, 0.5);
        assert_eq!(summary.status, HealthStatus::Unhealthy);
        assert_eq!(summary.failing_targets, vec!["cache", "db"]);
        assert_eq!(summary.min_elapsed_ms, 10.0);
        assert_eq!(summary.max_elapsed_ms, 5000.0);
        assert_eq!(summary.avg_elapsed_ms, 1265.0);
    }

    #[test]
    fn test_order_independent() {
        let mut results = vec![
            result("a", 13, true),
            result("b", 7, false),
            result("c", 101, true),
            result("d", 3, false),
            result("e", 55, true),
        ];
        let expected = aggregate(&results);

        for _ in 0..results.len() {
            results.rotate_left(1);
            assert_eq!(aggregate(&results), expected);
        }
        results.reverse();
        assert_eq!(aggregate(&results), expected);
    }
}
