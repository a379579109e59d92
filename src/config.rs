//! Configuration module for healthwatch.
//!
//! Loads configuration from environment variables with sensible defaults,
//! and initial targets from a JSON file.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::probe::DEFAULT_WORKERS;
use crate::scheduler::{validate_target, TargetError, DEFAULT_INTERVAL};
use crate::store::{Target, DEFAULT_HISTORY_CAPACITY};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid target {name:?}: {source}")]
    Target { name: String, source: TargetError },
}

/// Monitor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// HTTP port for the reporting API (default: 8080)
    pub http_port: u16,
    /// Sampling interval (default: 30s)
    pub interval: Duration,
    /// Samples kept in history (default: 100)
    pub history_size: usize,
    /// Concurrent probes per batch (default: 10)
    pub workers: usize,
    /// JSON file with the initial targets
    pub targets_file: Option<PathBuf>,
    /// Directory for reports written from the shell (default: ".")
    pub report_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            interval: DEFAULT_INTERVAL,
            history_size: DEFAULT_HISTORY_CAPACITY,
            workers: DEFAULT_WORKERS,
            targets_file: None,
            report_dir: PathBuf::from("."),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `HEALTHWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `HEALTHWATCH_INTERVAL_SECS`: sampling interval (default: 30)
    /// - `HEALTHWATCH_HISTORY_SIZE`: history capacity (default: 100)
    /// - `HEALTHWATCH_WORKERS`: worker-pool width (default: 10)
    /// - `HEALTHWATCH_TARGETS_FILE`: initial targets (default: none)
    /// - `HEALTHWATCH_REPORT_DIR`: report directory (default: ".")
    pub fn load() -> Self {
        Self::load_from(|key| env::var(key).ok())
    }

    fn load_from(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(port) = var("HEALTHWATCH_HTTP_PORT").and_then(|v| v.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(secs) = var("HEALTHWATCH_INTERVAL_SECS").and_then(|v| v.parse::<u64>().ok()) {
            if secs > 0 {
                cfg.interval = Duration::from_secs(secs);
            }
        }

        if let Some(size) = var("HEALTHWATCH_HISTORY_SIZE").and_then(|v| v.parse::<usize>().ok()) {
            if size > 0 {
                cfg.history_size = size;
            }
        }

        if let Some(workers) = var("HEALTHWATCH_WORKERS").and_then(|v| v.parse::<usize>().ok()) {
            if workers > 0 {
                cfg.workers = workers;
            }
        }

        if let Some(path) = var("HEALTHWATCH_TARGETS_FILE").filter(|v| !v.is_empty()) {
            cfg.targets_file = Some(PathBuf::from(path));
        }

        if let Some(dir) = var("HEALTHWATCH_REPORT_DIR").filter(|v| !v.is_empty()) {
            cfg.report_dir = PathBuf::from(dir);
        }

        cfg
    }
}

/// Load and validate the targets in a JSON file.
pub fn load_targets(path: &Path) -> Result<Vec<Target>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_targets(&raw).map_err(|e| match e {
        ParseFailure::Json(source) => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::Target(name, source) => ConfigError::Target { name, source },
    })
}

enum ParseFailure {
    Json(serde_json::Error),
    Target(String, TargetError),
}

fn parse_targets(raw: &str) -> Result<Vec<Target>, ParseFailure> {
    let targets: Vec<Target> = serde_json::from_str(raw).map_err(ParseFailure::Json)?;
    for target in &targets {
        validate_target(target).map_err(|e| ParseFailure::Target(target.name.clone(), e))?;
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::store::ProbeKind;

    #[test]
    fn test_default_config() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.interval, Duration::from_secs(30));
        assert_eq!(cfg.history_size, 100);
        assert_eq!(cfg.workers, 10);
        assert!(cfg.targets_file.is_none());
    }

    #[test]
    fn test_env_overrides_and_fallbacks() {
        let vars: HashMap<&str, &str> = [
            ("HEALTHWATCH_HTTP_PORT", "9090"),
            ("HEALTHWATCH_INTERVAL_SECS", "0"),
            ("HEALTHWATCH_HISTORY_SIZE", "lots"),
            ("HEALTHWATCH_WORKERS", "4"),
            ("HEALTHWATCH_TARGETS_FILE", "targets.json"),
        ]
        .into_iter()
        .collect();

        let cfg = MonitorConfig::load_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.interval, DEFAULT_INTERVAL);
        assert_eq!(cfg.history_size, DEFAULT_HISTORY_CAPACITY);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.targets_file, Some(PathBuf::from("targets.json")));
        assert_eq!(cfg.report_dir, PathBuf::from("."));
    }

    #[test]
    fn test_load_targets_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "api", "address": "http://localhost:8080/health", "type": "http"},
                {"name": "db", "address": "localhost:5432", "type": "tcp", "timeout": 2.5},
                {"name": "auth", "address": "localhost:9000", "type": "http", "expected_status": 204, "timeout": -1}
            ]"#,
        )
        .unwrap();

        let targets = load_targets(&path).unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[1].kind, ProbeKind::Tcp);
        assert_eq!(targets[1].timeout, Duration::from_millis(2500));
        assert_eq!(targets[2].kind, ProbeKind::Http { expected_status: 204 });
        assert_eq!(targets[2].timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_target_aborts_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(
            &path,
            r#"[{"name": "api", "address": "", "type": "http"}]"#,
        )
        .unwrap();

        match load_targets(&path) {
            Err(ConfigError::Target { name, source }) => {
                assert_eq!(name, "api");
                assert_eq!(source, TargetError::EmptyAddress);
            }
            other => panic!("unexpected: {other:?}"),
        }

        assert!(matches!(
            load_targets(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_targets(&path), Err(ConfigError::Parse { .. })));
    }
}
