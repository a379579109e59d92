//! Probe module for target health checks.
//!
//! Supports HTTP and TCP probes. Probe failures are data, not errors: every
//! outcome leaves [`Probe::check`] as a [`ProbeResult`].

mod dispatch;
mod http;
mod tcp;

pub use dispatch::*;
pub use http::*;
pub use tcp::*;

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::store::{ProbeKind, ProbeResult, Target};

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("expected status {expected} but got {actual}{}", body_suffix(.body))]
    UnexpectedStatus {
        expected: u16,
        actual: u16,
        body: String,
    },
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("failed to build http client: {0}")]
    Client(String),
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(". Response: {}", body)
    }
}

impl ProbeError {
    /// Status code carried by the error, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProbeError::UnexpectedStatus { actual, .. } => Some(*actual),
            _ => None,
        }
    }
}

/// Executes one health check against one target.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Perform exactly one check. Never fails: errors become failed results.
    async fn check(&self, target: &Target) -> ProbeResult;
}

/// Probe that talks to the network: HTTP GET or TCP connect.
#[derive(Clone)]
pub struct NetworkProbe {
    client: reqwest::Client,
}

impl NetworkProbe {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("healthwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for NetworkProbe {
    async fn check(&self, target: &Target) -> ProbeResult {
        tracing::debug!(target_name = %target.name, address = %target.address, kind = target.kind.name(), "Running probe");

        let start = Instant::now();
        let outcome = match &target.kind {
            ProbeKind::Http { expected_status } => {
                run_http_probe(&self.client, &target.address, *expected_status, target.timeout)
                    .await
                    .map(Some)
            }
            ProbeKind::Tcp => run_tcp_probe(&target.address, target.timeout).await.map(|_| None),
        };
        let elapsed = start.elapsed();

        to_result(target, elapsed, outcome)
    }
}

/// Convert a probe outcome into its result record.
pub fn to_result(
    target: &Target,
    elapsed: Duration,
    outcome: Result<Option<u16>, ProbeError>,
) -> ProbeResult {
    match outcome {
        Ok(status_code) => ProbeResult::passed(target, elapsed, status_code),
        Err(e) => {
            tracing::warn!(
                target_name = %target.name,
                address = %target.address,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "Health check failed"
            );
            ProbeResult::failed(target, elapsed, e.status_code(), e.to_string())
        }
    }
}
