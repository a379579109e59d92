//! Monitoring data model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest per-probe timeout a target may carry.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default expected HTTP status.
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// How a target is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbeKind {
    /// HTTP GET; healthy iff the response status equals `expected_status`.
    Http {
        #[serde(default = "default_expected_status")]
        expected_status: u16,
    },
    /// Raw TCP connect; healthy iff the connection establishes in time.
    Tcp,
}

impl ProbeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ProbeKind::Http { .. } => "http",
            ProbeKind::Tcp => "tcp",
        }
    }
}

fn default_expected_status() -> u16 {
    DEFAULT_EXPECTED_STATUS
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// A monitoring target. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    /// URL for HTTP targets, `host:port` for TCP targets.
    pub address: String,
    #[serde(flatten)]
    pub kind: ProbeKind,
    /// Per-probe timeout, in seconds on the wire.
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

impl Target {
    /// An HTTP target expecting status 200 with the default timeout.
    pub fn http(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            kind: ProbeKind::Http {
                expected_status: DEFAULT_EXPECTED_STATUS,
            },
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A TCP connect target with the default timeout.
    pub fn tcp(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            kind: ProbeKind::Tcp,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the expected status. No effect on TCP targets.
    pub fn with_expected_status(mut self, status: u16) -> Self {
        if let ProbeKind::Http { expected_status } = &mut self.kind {
            *expected_status = status;
        }
        self
    }

    /// The dispatcher's supervisory deadline for this target's probe.
    /// Timeouts beyond [`MAX_TIMEOUT`] are clamped.
    pub fn supervisory_timeout(&self) -> Duration {
        self.timeout.min(MAX_TIMEOUT) * 2
    }
}

/// The outcome of one probe execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub target: String,
    pub address: String,
    pub success: bool,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
    /// HTTP status, `None` for TCP probes and probes that got no response.
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn passed(target: &Target, elapsed: Duration, status_code: Option<u16>) -> Self {
        Self {
            target: target.name.clone(),
            address: target.address.clone(),
            success: true,
            elapsed,
            status_code,
            error: None,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(
        target: &Target,
        elapsed: Duration,
        status_code: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            target: target.name.clone(),
            address: target.address.clone(),
            success: false,
            elapsed,
            status_code,
            error: Some(error.into()),
            completed_at: Utc::now(),
        }
    }

    /// Synthetic result for a probe the dispatcher gave up waiting on.
    pub fn deadline_exceeded(target: &Target, elapsed: Duration) -> Self {
        Self::failed(target, elapsed, None, "deadline exceeded")
    }
}

/// Overall health of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    NoTargets,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Unhealthy => "UNHEALTHY",
            HealthStatus::NoTargets => "NO_TARGETS",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduction of one batch of probe results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// 0.0..=1.0; 1.0 for an empty batch.
    pub success_ratio: f64,
    pub avg_elapsed_ms: f64,
    pub min_elapsed_ms: f64,
    pub max_elapsed_ms: f64,
    /// Sorted names of the targets that failed.
    pub failing_targets: Vec<String>,
    pub status: HealthStatus,
}

impl BatchSummary {
    pub fn health_percentage(&self) -> f64 {
        self.success_ratio * 100.0
    }
}

/// A single runtime metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Int(v) => Some(*v as f64),
            MetricValue::Float(v) => Some(*v),
            MetricValue::Text(_) => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{:.2}", v),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

/// Runtime counters captured at the start of a cycle.
pub type RuntimeSnapshot = BTreeMap<String, MetricValue>;

/// One collection cycle's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub runtime: RuntimeSnapshot,
    pub summary: BatchSummary,
    pub results: Vec<ProbeResult>,
    #[serde(rename = "cycle_duration_ms", with = "duration_ms")]
    pub cycle_duration: Duration,
}

/// Serialize a `Duration` as fractional milliseconds.
pub(crate) mod duration_ms {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid duration: {}ms", ms)));
        }
        Duration::try_from_secs_f64(ms / 1000.0).map_err(serde::de::Error::custom)
    }
}

/// Serialize a `Duration` as fractional seconds; non-positive values
/// deserialize to the default probe timeout.
pub(crate) mod duration_secs {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() {
            return Err(serde::de::Error::custom("timeout must be finite"));
        }
        if secs <= 0.0 {
            return Ok(DEFAULT_TIMEOUT);
        }
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
