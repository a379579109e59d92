//! Local runtime metrics captured at the start of each cycle.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use thiserror::Error;

use crate::store::{MetricValue, RuntimeSnapshot, MEMORY_USAGE_KEY};

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("current process unavailable: {0}")]
    Process(String),
    #[error("runtime metrics unavailable: {0}")]
    Unavailable(String),
}

/// Source of the runtime snapshot stored with every sample.
pub trait RuntimeMetrics: Send + Sync {
    fn snapshot(&self) -> Result<RuntimeSnapshot, RuntimeError>;
}

const MB: f64 = 1024.0 * 1024.0;

/// Reads memory, thread and uptime counters for the current process.
pub struct ProcessMetrics {
    system: Mutex<System>,
    pid: Pid,
    started: Instant,
}

impl ProcessMetrics {
    pub fn new() -> Result<Self, RuntimeError> {
        let pid = sysinfo::get_current_pid().map_err(|e| RuntimeError::Process(e.to_string()))?;
        Ok(Self {
            system: Mutex::new(System::new()),
            pid,
            started: Instant::now(),
        })
    }
}

impl RuntimeMetrics for ProcessMetrics {
    fn snapshot(&self) -> Result<RuntimeSnapshot, RuntimeError> {
        let mut sys = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_memory();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_tasks(),
        );

        let process = sys
            .process(self.pid)
            .ok_or_else(|| RuntimeError::Process(format!("pid {} not found", self.pid)))?;

        let mut snapshot = RuntimeSnapshot::new();
        snapshot.insert("pid".into(), MetricValue::Int(i64::from(self.pid.as_u32())));
        snapshot.insert(
            "process_memory_mb".into(),
            MetricValue::Float(process.memory() as f64 / MB),
        );
        snapshot.insert(
            "process_virtual_memory_mb".into(),
            MetricValue::Float(process.virtual_memory() as f64 / MB),
        );
        // Only some platforms list a process's threads.
        if let Some(tasks) = process.tasks() {
            snapshot.insert("thread_count".into(), MetricValue::Int(tasks.len() as i64));
        }

        let total = sys.total_memory();
        if total == 0 {
            return Err(RuntimeError::Unavailable("total memory reported as zero".into()));
        }
        let used = sys.used_memory();
        snapshot.insert("system_memory_used_mb".into(), MetricValue::Float(used as f64 / MB));
        snapshot.insert("system_memory_total_mb".into(), MetricValue::Float(total as f64 / MB));
        snapshot.insert(
            MEMORY_USAGE_KEY.into(),
            MetricValue::Float(used as f64 / total as f64 * 100.0),
        );

        let uptime = self.started.elapsed();
        snapshot.insert("uptime_secs".into(), MetricValue::Int(uptime.as_secs() as i64));
        snapshot.insert("uptime_formatted".into(), MetricValue::Text(format_uptime(uptime)));

        if let Ok(n) = std::thread::available_parallelism() {
            snapshot.insert("available_parallelism".into(), MetricValue::Int(n.get() as i64));
        }
        snapshot.insert(
            "os".into(),
            MetricValue::Text(System::name().unwrap_or_else(|| "N/A".to_string())),
        );

        Ok(snapshot)
    }
}

/// `H hours, M minutes, S seconds`.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!(
        "{} hours, {} minutes, {} seconds",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0 hours, 0 minutes, 0 seconds");
        assert_eq!(
            format_uptime(Duration::from_secs(3 * 3600 + 25 * 60 + 7)),
            "3 hours, 25 minutes, 7 seconds"
        );
    }

    #[test]
    fn test_process_snapshot() {
        let metrics = ProcessMetrics::new().unwrap();
        let snapshot = metrics.snapshot().unwrap();

        assert_eq!(
            snapshot["pid"],
            MetricValue::Int(i64::from(std::process::id()))
        );
        let usage = snapshot[MEMORY_USAGE_KEY].as_f64().unwrap();
        assert!(usage > 0.0 && usage <= 100.0);
        assert!(snapshot["process_memory_mb"].as_f64().unwrap() > 0.0);
        assert!(matches!(snapshot["uptime_formatted"], MetricValue::Text(_)));
    }
}
