//! Statistics derived from the sample history.
//!
//! Latency percentiles are estimated with a t-digest over every probe result
//! still held in the history.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tdigests::TDigest;

use super::models::Sample;

/// Runtime key whose values feed the memory statistics.
pub const MEMORY_USAGE_KEY: &str = "system_memory_usage_percent";

/// Centroid budget when compressing the latency digest.
const DIGEST_COMPRESSION: usize = 100;

/// Statistics over the history, or a marker that nothing was sampled yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Statistics {
    NoData,
    Available(HistoryStats),
}

impl Statistics {
    pub fn available(&self) -> Option<&HistoryStats> {
        match self {
            Statistics::NoData => None,
            Statistics::Available(stats) => Some(stats),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub data_points: usize,
    /// Seconds between the oldest and newest sample.
    pub time_range_secs: f64,
    pub health_percentage: RangeStats,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub memory_usage_percentage: Option<RangeStats>,
    pub total_probes: usize,
    pub successful_probes: usize,
    /// 100 when no probe ran in any stored sample.
    pub success_rate_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub latency: Option<LatencyPercentiles>,
}

/// Mean, minimum and maximum of one numeric series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl RangeStats {
    /// `None` for an empty series.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::MAX;
        let mut max = f64::MIN;

        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }

        if count == 0 {
            return None;
        }
        Some(Self {
            mean: sum / count as f64,
            min,
            max,
            count,
        })
    }
}

/// Probe latency percentiles in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
    pub count: usize,
}

impl LatencyPercentiles {
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let max_ms = values.iter().copied().fold(f64::MIN, f64::max);

        let mut td = TDigest::from_values(values);
        td.compress(DIGEST_COMPRESSION);

        Some(Self {
            p50_ms: sanitize_float(td.estimate_quantile(0.50)),
            p90_ms: sanitize_float(td.estimate_quantile(0.90)),
            p99_ms: sanitize_float(td.estimate_quantile(0.99)),
            max_ms,
            count,
        })
    }
}

/// Reduce a history snapshot to its statistics.
pub fn compute_statistics(samples: &[Arc<Sample>]) -> Statistics {
    let (first, last) = match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Statistics::NoData,
    };

    let health = samples.iter().map(|s| s.summary.health_percentage());
    let Some(health_percentage) = RangeStats::from_values(health) else {
        return Statistics::NoData;
    };

    let memory_usage_percentage = RangeStats::from_values(
        samples
            .iter()
            .filter_map(|s| s.runtime.get(MEMORY_USAGE_KEY).and_then(|v| v.as_f64())),
    );

    let total_probes: usize = samples.iter().map(|s| s.summary.total).sum();
    let successful_probes: usize = samples.iter().map(|s| s.summary.succeeded).sum();
    let success_rate_percentage = if total_probes == 0 {
        100.0
    } else {
        successful_probes as f64 / total_probes as f64 * 100.0
    };

    let latencies: Vec<f64> = samples
        .iter()
        .flat_map(|s| s.results.iter())
        .map(|r| r.elapsed.as_secs_f64() * 1000.0)
        .collect();

    let time_range_secs = (last.timestamp - first.timestamp)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    Statistics::Available(HistoryStats {
        data_points: samples.len(),
        time_range_secs,
        health_percentage,
        memory_usage_percentage,
        total_probes,
        successful_probes,
        success_rate_percentage,
        latency: LatencyPercentiles::from_values(latencies),
    })
}

fn sanitize_float(f: f64) -> f64 {
    if f.is_nan() || f.is_infinite() {
        0.0
    } else {
        f
    }
}
