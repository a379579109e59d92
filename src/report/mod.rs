//! Report rendering: JSON, HTML and CSV views of the sample history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::store::{
    compute_statistics, HealthStatus, HistoryStore, Sample, Statistics, Target, MEMORY_USAGE_KEY,
};

const REPORT_TEMPLATE: &str = include_str!("templates/report.html");

/// Columns of the CSV export, one row per sample.
pub const CSV_HEADER: &str = "timestamp,status,total,succeeded,failed,health_percentage,\
avg_elapsed_ms,min_elapsed_ms,max_elapsed_ms,cycle_duration_ms,memory_usage_percent,failing_targets";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Html,
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Html => "html",
            ReportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Html => "text/html; charset=utf-8",
            ReportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "html" => Ok(ReportFormat::Html),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(format!("unknown report format: {} (expected json, html or csv)", other)),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generator: String,
    pub version: String,
    pub history_capacity: usize,
    pub targets: Vec<Target>,
}

/// Everything a rendered report shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub generated_at: DateTime<Utc>,
    /// Interval of the running sampler, if any.
    pub interval_secs: Option<f64>,
    pub latest: Option<Sample>,
    pub history: Vec<Sample>,
    pub statistics: Statistics,
}

impl Report {
    /// Build from one consistent snapshot of the history.
    pub fn build(history: &HistoryStore, targets: &[Target], interval: Option<Duration>) -> Self {
        let samples = history.snapshot();
        let statistics = compute_statistics(&samples);

        Self {
            metadata: ReportMetadata {
                generator: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                history_capacity: history.capacity(),
                targets: targets.to_vec(),
            },
            generated_at: Utc::now(),
            interval_secs: interval.map(|d| d.as_secs_f64()),
            latest: samples.last().map(|s| s.as_ref().clone()),
            history: samples.iter().map(|s| s.as_ref().clone()).collect(),
            statistics,
        }
    }
}

/// Render a report in the given format.
pub fn render(report: &Report, format: ReportFormat) -> Result<String, ReportError> {
    match format {
        ReportFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        ReportFormat::Html => Ok(render_html(report)),
        ReportFormat::Csv => Ok(render_csv(report)),
    }
}

/// Render and write a report, creating parent directories as needed.
pub fn write_report(report: &Report, format: ReportFormat, path: &Path) -> Result<(), ReportError> {
    let body = render(report, format)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, body)?;
    tracing::info!(path = %path.display(), format = %format, "Report written");
    Ok(())
}

/// `<dir>/health-monitor-report-<unix millis>.<ext>`
pub fn default_report_path(dir: &Path, format: ReportFormat) -> PathBuf {
    dir.join(format!(
        "health-monitor-report-{}.{}",
        Utc::now().timestamp_millis(),
        format.extension()
    ))
}

// ============================================================================
// CSV
// ============================================================================

fn render_csv(report: &Report) -> String {
    let mut out = String::with_capacity(128 * (report.history.len() + 1));
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");

    for sample in &report.history {
        let s = &sample.summary;
        let memory = sample
            .runtime
            .get(MEMORY_USAGE_KEY)
            .and_then(|v| v.as_f64())
            .map(|v| format!("{:.2}", v))
            .unwrap_or_default();

        let fields = [
            sample.timestamp.to_rfc3339(),
            s.status.to_string(),
            s.total.to_string(),
            s.succeeded.to_string(),
            s.failed.to_string(),
            format!("{:.2}", s.health_percentage()),
            format!("{:.3}", s.avg_elapsed_ms),
            format!("{:.3}", s.min_elapsed_ms),
            format!("{:.3}", s.max_elapsed_ms),
            format!("{:.3}", sample.cycle_duration.as_secs_f64() * 1000.0),
            memory,
            s.failing_targets.join(";"),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

/// Quote a field per RFC 4180 when it needs it.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ============================================================================
// HTML
// ============================================================================

fn render_html(report: &Report) -> String {
    let (status, status_class) = match report.latest.as_ref().map(|s| s.summary.status) {
        Some(HealthStatus::Healthy) => ("HEALTHY", "healthy"),
        Some(HealthStatus::Unhealthy) => ("UNHEALTHY", "unhealthy"),
        Some(HealthStatus::NoTargets) => ("NO_TARGETS", "none"),
        None => ("NO DATA", "none"),
    };

    let interval = report
        .interval_secs
        .map(|s| format!("{}s", s))
        .unwrap_or_else(|| "stopped".to_string());

    REPORT_TEMPLATE
        .replace("{{title}}", "Health Monitor Report")
        .replace("{{generated_at}}", &escape_html(&report.generated_at.to_rfc3339()))
        .replace("{{interval}}", &escape_html(&interval))
        .replace("{{target_count}}", &report.metadata.targets.len().to_string())
        .replace("{{status}}", status)
        .replace("{{status_class}}", status_class)
        .replace("{{summary_table}}", &summary_table(report))
        .replace("{{failing_targets}}", &failing_list(report))
        .replace("{{results_table}}", &results_table(report))
        .replace("{{runtime_table}}", &runtime_table(report))
        .replace("{{statistics_table}}", &statistics_table(&report.statistics))
        .replace("{{history_table}}", &history_table(report))
}

fn summary_table(report: &Report) -> String {
    let Some(sample) = &report.latest else {
        return "<p>No samples collected yet.</p>".to_string();
    };
    let s = &sample.summary;
    let mut html = String::from("<table>");
    let rows = [
        ("Sampled at", sample.timestamp.to_rfc3339()),
        ("Targets", s.total.to_string()),
        ("Healthy", s.succeeded.to_string()),
        ("Unhealthy", s.failed.to_string()),
        ("Health", format!("{:.1}%", s.health_percentage())),
        ("Avg response", format!("{:.1} ms", s.avg_elapsed_ms)),
        ("Min response", format!("{:.1} ms", s.min_elapsed_ms)),
        ("Max response", format!("{:.1} ms", s.max_elapsed_ms)),
    ];
    for (k, v) in rows {
        let _ = write!(html, "<tr><th>{}</th><td>{}</td></tr>", k, escape_html(&v));
    }
    html.push_str("</table>");
    html
}

fn failing_list(report: &Report) -> String {
    let failing = report
        .latest
        .as_ref()
        .map(|s| s.summary.failing_targets.as_slice())
        .unwrap_or_default();
    if failing.is_empty() {
        return "<p>None.</p>".to_string();
    }
    let mut html = String::from("<ul>");
    for name in failing {
        let _ = write!(html, "<li>{}</li>", escape_html(name));
    }
    html.push_str("</ul>");
    html
}

fn results_table(report: &Report) -> String {
    let Some(sample) = report.latest.as_ref().filter(|s| !s.results.is_empty()) else {
        return "<p>No results.</p>".to_string();
    };
    let mut html = String::from(
        "<table><tr><th>Target</th><th>Address</th><th>Result</th><th>Status</th><th>Time (ms)</th><th>Error</th></tr>",
    );
    for r in &sample.results {
        let _ = write!(
            html,
            "<tr{}><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{:.1}</td><td>{}</td></tr>",
            if r.success { "" } else { " class=\"failed\"" },
            escape_html(&r.target),
            escape_html(&r.address),
            if r.success { "UP" } else { "DOWN" },
            r.status_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            r.elapsed.as_secs_f64() * 1000.0,
            escape_html(r.error.as_deref().unwrap_or("")),
        );
    }
    html.push_str("</table>");
    html
}

fn runtime_table(report: &Report) -> String {
    let Some(sample) = report.latest.as_ref().filter(|s| !s.runtime.is_empty()) else {
        return "<p>No runtime data.</p>".to_string();
    };
    let mut html = String::from("<table>");
    for (k, v) in &sample.runtime {
        let _ = write!(
            html,
            "<tr><th>{}</th><td>{}</td></tr>",
            escape_html(k),
            escape_html(&v.to_string())
        );
    }
    html.push_str("</table>");
    html
}

fn statistics_table(statistics: &Statistics) -> String {
    let Statistics::Available(stats) = statistics else {
        return "<p>No data.</p>".to_string();
    };

    let mut rows = vec![
        ("Data points".to_string(), stats.data_points.to_string()),
        ("Time range".to_string(), format!("{:.0} s", stats.time_range_secs)),
        (
            "Health (avg / min / max)".to_string(),
            format!(
                "{:.1}% / {:.1}% / {:.1}%",
                stats.health_percentage.mean, stats.health_percentage.min, stats.health_percentage.max
            ),
        ),
        ("Total health checks".to_string(), stats.total_probes.to_string()),
        ("Successful health checks".to_string(), stats.successful_probes.to_string()),
        ("Success rate".to_string(), format!("{:.2}%", stats.success_rate_percentage)),
    ];
    if let Some(m) = &stats.memory_usage_percentage {
        rows.push((
            "Memory usage (avg / min / max)".to_string(),
            format!("{:.1}% / {:.1}% / {:.1}%", m.mean, m.min, m.max),
        ));
    }
    if let Some(l) = &stats.latency {
        rows.push((
            "Latency p50 / p90 / p99 / max".to_string(),
            format!(
                "{:.1} / {:.1} / {:.1} / {:.1} ms",
                l.p50_ms, l.p90_ms, l.p99_ms, l.max_ms
            ),
        ));
    }

    let mut html = String::from("<table>");
    for (k, v) in rows {
        let _ = write!(html, "<tr><th>{}</th><td>{}</td></tr>", k, escape_html(&v));
    }
    html.push_str("</table>");
    html
}

fn history_table(report: &Report) -> String {
    if report.history.is_empty() {
        return "<p>No samples collected yet.</p>".to_string();
    }
    let mut html = String::from(
        "<table><tr><th>Time</th><th>Status</th><th>Healthy</th><th>Health</th><th>Avg (ms)</th><th>Failing</th></tr>",
    );
    for sample in report.history.iter().rev() {
        let s = &sample.summary;
        let _ = write!(
            html,
            "<tr{}><td>{}</td><td>{}</td><td class=\"num\">{}/{}</td><td class=\"num\">{:.1}%</td><td class=\"num\">{:.1}</td><td>{}</td></tr>",
            if s.failed > 0 { " class=\"failed\"" } else { "" },
            escape_html(&sample.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            s.status,
            s.succeeded,
            s.total,
            s.health_percentage(),
            s.avg_elapsed_ms,
            escape_html(&s.failing_targets.join(", ")),
        );
    }
    html.push_str("</table>");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
