//! Interactive command shell.

use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::monitor::Monitor;
use crate::report::{default_report_path, ReportError, ReportFormat};
use crate::scheduler::{CycleError, SamplerError, TargetError};
use crate::store::{ProbeKind, Sample, Statistics, Target};

const HELP: &str = "\
Commands:
  start [SECS]                 start monitoring (default interval from config)
  stop                         stop monitoring
  interval SECS                restart monitoring with a new interval
  status                       show the latest sample
  stats                        show statistics over the history
  collect                      run one collection cycle now
  report [json|html|csv] [PATH]
                               write a report (default json)
  add-target NAME ADDRESS [--tcp] [--status CODE] [--timeout SECS]
                               register a target
  remove-target NAME           unregister a target
  list-targets                 list registered targets
  help                         show this help
  exit | quit                  stop monitoring and leave";

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Sampler(#[from] SamplerError),
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
}

/// What the shell does after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Output(String),
    Exit,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_subcommand = true, disable_help_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug)]
enum ShellCommand {
    Start {
        secs: Option<u64>,
    },
    Stop,
    Interval {
        secs: u64,
    },
    Status,
    Stats,
    Collect,
    Report {
        #[arg(value_enum)]
        format: Option<ReportFormat>,
        path: Option<PathBuf>,
    },
    AddTarget {
        name: String,
        address: String,
        #[arg(long)]
        tcp: bool,
        #[arg(long)]
        status: Option<u16>,
        #[arg(long)]
        timeout: Option<f64>,
    },
    RemoveTarget {
        name: String,
    },
    ListTargets,
    Help,
    #[command(alias = "quit")]
    Exit,
}

pub struct Shell {
    monitor: Arc<Monitor>,
    report_dir: PathBuf,
}

impl Shell {
    pub fn new(monitor: Arc<Monitor>, report_dir: PathBuf) -> Self {
        Self { monitor, report_dir }
    }

    /// Read commands from stdin until `exit` or end of input.
    pub async fn run(&self) -> std::io::Result<()> {
        println!("healthwatch {} - type 'help' for commands", env!("CARGO_PKG_VERSION"));
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("healthwatch> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            match self.execute(&line).await {
                Ok(Reply::Output(text)) if text.is_empty() => {}
                Ok(Reply::Output(text)) => println!("{}", text),
                Ok(Reply::Exit) => break,
                Err(e) => println!("Error: {}", e),
            }
        }

        self.monitor.stop().await;
        println!("Goodbye.");
        Ok(())
    }

    /// Execute one command line and return the text to print.
    pub async fn execute(&self, line: &str) -> Result<Reply, ShellError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Reply::Output(String::new()));
        }

        let command = match ShellLine::try_parse_from(tokens) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                return Err(ShellError::Usage(format!(
                    "{}\nType 'help' for commands.",
                    e.render().to_string().trim_end()
                )))
            }
        };

        let text = match command {
            ShellCommand::Start { secs } => {
                let interval = secs.map(Duration::from_secs);
                self.monitor.start(interval).await?;
                let running = self.monitor.interval().await.unwrap_or_default();
                format!("Monitoring started (interval {}s)", running.as_secs())
            }
            ShellCommand::Stop => {
                self.monitor.stop().await;
                "Monitoring stopped".to_string()
            }
            ShellCommand::Interval { secs } => {
                self.monitor.set_interval(Duration::from_secs(secs)).await?;
                format!("Monitoring restarted with interval {}s", secs)
            }
            ShellCommand::Status => self.status().await,
            ShellCommand::Stats => format_statistics(&self.monitor.statistics()),
            ShellCommand::Collect => {
                let sample = self.monitor.collect_once().await?;
                format_sample(&sample)
            }
            ShellCommand::Report { format, path } => {
                let format = format.unwrap_or(ReportFormat::Json);
                let path = path.unwrap_or_else(|| default_report_path(&self.report_dir, format));
                self.monitor.write_report(format, &path).await?;
                format!("Report written to {}", path.display())
            }
            ShellCommand::AddTarget {
                name,
                address,
                tcp,
                status,
                timeout,
            } => {
                let mut target = if tcp {
                    Target::tcp(name, address)
                } else {
                    Target::http(name, address)
                };
                if let Some(code) = status {
                    target = target.with_expected_status(code);
                }
                if let Some(secs) = timeout {
                    let timeout = Duration::try_from_secs_f64(secs)
                        .map_err(|_| TargetError::InvalidTimeout)?;
                    target = target.with_timeout(timeout);
                }
                let line = format!("Added target {} ({} {})", target.name, target.kind.name(), target.address);
                self.monitor.add_target(target)?;
                line
            }
            ShellCommand::RemoveTarget { name } => {
                let removed = self.monitor.remove_target(&name)?;
                format!("Removed target {}", removed.name)
            }
            ShellCommand::ListTargets => format_targets(&self.monitor.list_targets()),
            ShellCommand::Help => HELP.to_string(),
            ShellCommand::Exit => return Ok(Reply::Exit),
        };

        Ok(Reply::Output(text))
    }

    async fn status(&self) -> String {
        let state = self.monitor.sampler_state().await;
        let sampler = match self.monitor.interval().await {
            Some(interval) => format!("Sampler: {} (every {}s)", state, interval.as_secs()),
            None => format!("Sampler: {}", state),
        };

        match self.monitor.status() {
            Some(sample) => format!("{}\n{}", format_sample(&sample), sampler),
            None => format!("No samples collected yet.\n{}", sampler),
        }
    }
}

fn format_sample(sample: &Sample) -> String {
    let s = &sample.summary;
    let mut out = String::new();
    let _ = writeln!(out, "Status: {}", s.status);
    let _ = writeln!(out, "Sampled at: {}", sample.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(
        out,
        "Targets: {} total, {} healthy, {} unhealthy ({:.1}%)",
        s.total,
        s.succeeded,
        s.failed,
        s.health_percentage()
    );
    if s.total > 0 {
        let _ = writeln!(
            out,
            "Response time: avg {:.1} ms, min {:.1} ms, max {:.1} ms",
            s.avg_elapsed_ms, s.min_elapsed_ms, s.max_elapsed_ms
        );
    }
    for r in sample.results.iter().filter(|r| !r.success) {
        let _ = writeln!(
            out,
            "  DOWN {} ({}): {}",
            r.target,
            r.address,
            r.error.as_deref().unwrap_or("unknown error")
        );
    }
    let _ = write!(out, "Cycle took {:.1} ms", sample.cycle_duration.as_secs_f64() * 1000.0);
    out
}

fn format_statistics(statistics: &Statistics) -> String {
    let Statistics::Available(stats) = statistics else {
        return "No data collected yet.".to_string();
    };

    let mut out = String::new();
    let _ = writeln!(out, "Data points: {} over {:.0}s", stats.data_points, stats.time_range_secs);
    let h = &stats.health_percentage;
    let _ = writeln!(out, "Health: avg {:.1}%, min {:.1}%, max {:.1}%", h.mean, h.min, h.max);
    if let Some(m) = &stats.memory_usage_percentage {
        let _ = writeln!(out, "Memory usage: avg {:.1}%, min {:.1}%, max {:.1}%", m.mean, m.min, m.max);
    }
    if let Some(l) = &stats.latency {
        let _ = writeln!(
            out,
            "Latency: p50 {:.1} ms, p90 {:.1} ms, p99 {:.1} ms, max {:.1} ms",
            l.p50_ms, l.p90_ms, l.p99_ms, l.max_ms
        );
    }
    let _ = write!(
        out,
        "Health checks: {} total, {} successful ({:.2}%)",
        stats.total_probes, stats.successful_probes, stats.success_rate_percentage
    );
    out
}

fn format_targets(targets: &[Target]) -> String {
    if targets.is_empty() {
        return "No targets registered.".to_string();
    }
    let mut out = String::new();
    for (i, t) in targets.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let expect = match &t.kind {
            ProbeKind::Http { expected_status } => format!(" expect {}", expected_status),
            ProbeKind::Tcp => String::new(),
        };
        let _ = write!(
            out,
            "{:<16} {:<4} {}{} (timeout {}s)",
            t.name,
            t.kind.name(),
            t.address,
            expect,
            t.timeout.as_secs_f64()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::monitor;

    fn shell(dir: &std::path::Path) -> Shell {
        Shell::new(Arc::new(monitor()), dir.to_path_buf())
    }

    fn output(reply: Reply) -> String {
        match reply {
            Reply::Output(text) => text,
            Reply::Exit => panic!("unexpected exit"),
        }
    }

    #[tokio::test]
    async fn test_target_commands() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(dir.path());

        let text = output(shell.execute("add-target api localhost:8080/health --status 204").await.unwrap());
        assert_eq!(text, "Added target api (http localhost:8080/health)");
        output(shell.execute("add-target db localhost:5432 --tcp --timeout 2").await.unwrap());

        let listing = output(shell.execute("list-targets").await.unwrap());
        assert!(listing.contains("expect 204"));
        assert!(listing.contains("tcp"));
        assert!(listing.contains("(timeout 2s)"));

        for timeout in ["0", "1e20", "7200", "NaN"] {
            let err = shell
                .execute(&format!("add-target slow localhost --timeout {}", timeout))
                .await
                .unwrap_err();
            assert!(matches!(err, ShellError::Target(TargetError::InvalidTimeout)));
        }

        let err = shell.execute("add-target cache localhost --tcp").await.unwrap_err();
        assert!(matches!(err, ShellError::Target(TargetError::InvalidAddress(_))));

        output(shell.execute("remove-target db").await.unwrap());
        let err = shell.execute("remove-target db").await.unwrap_err();
        assert!(matches!(err, ShellError::Target(TargetError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_status_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(dir.path());

        let text = output(shell.execute("status").await.unwrap());
        assert!(text.starts_with("No samples collected yet."));
        assert!(text.contains("Sampler: IDLE"));
        assert_eq!(output(shell.execute("stats").await.unwrap()), "No data collected yet.");

        shell.execute("add-target down localhost:1").await.unwrap();
        shell.execute("collect").await.unwrap();

        let text = output(shell.execute("status").await.unwrap());
        assert!(text.contains("Status: UNHEALTHY"));
        assert!(text.contains("DOWN down (localhost:1)"));
        let stats = output(shell.execute("stats").await.unwrap());
        assert!(stats.contains("Health checks: 1 total, 0 successful (0.00%)"));
    }

    #[tokio::test]
    async fn test_report_command() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(dir.path());
        shell.execute("collect").await.unwrap();

        let path = dir.path().join("out/report.csv");
        let text = output(
            shell
                .execute(&format!("report csv {}", path.display()))
                .await
                .unwrap(),
        );
        assert!(text.starts_with("Report written to"));
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("timestamp,status"));

        let text = output(shell.execute("report").await.unwrap());
        assert!(text.contains("health-monitor-report-"));
        assert!(text.ends_with(".json"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampler_commands() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(dir.path());

        assert_eq!(
            output(shell.execute("start 5").await.unwrap()),
            "Monitoring started (interval 5s)"
        );
        assert!(matches!(
            shell.execute("start").await,
            Err(ShellError::Sampler(SamplerError::AlreadyRunning))
        ));
        output(shell.execute("interval 2").await.unwrap());
        assert!(output(shell.execute("status").await.unwrap()).contains("Sampler: RUNNING (every 2s)"));
        assert_eq!(output(shell.execute("stop").await.unwrap()), "Monitoring stopped");
        output(shell.execute("stop").await.unwrap());
    }

    #[tokio::test]
    async fn test_parse_errors_and_exit() {
        let dir = tempfile::tempdir().unwrap();
        let shell = shell(dir.path());

        assert!(matches!(shell.execute("bogus").await, Err(ShellError::Usage(_))));
        assert!(matches!(shell.execute("add-target web").await, Err(ShellError::Usage(_))));
        assert!(matches!(shell.execute("interval soon").await, Err(ShellError::Usage(_))));
        assert_eq!(shell.execute("   ").await.unwrap(), Reply::Output(String::new()));
        assert!(output(shell.execute("help").await.unwrap()).contains("add-target"));
        assert_eq!(shell.execute("exit").await.unwrap(), Reply::Exit);
        assert_eq!(shell.execute("quit").await.unwrap(), Reply::Exit);
    }
}
