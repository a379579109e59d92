//! healthwatch - Service Health Monitor
//!
//! Periodically probes HTTP and TCP targets, keeps a bounded history of the
//! results and serves reports over an interactive shell and an HTTP API.

mod config;
mod monitor;
mod probe;
mod report;
mod runtime;
mod scheduler;
mod shell;
mod store;
mod web;

use config::{load_targets, MonitorConfig};
use monitor::Monitor;
use probe::NetworkProbe;
use report::{default_report_path, ReportFormat};
use runtime::ProcessMetrics;
use shell::Shell;
use web::Server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "healthwatch", version)]
#[command(about = "Service health monitor", long_about = None)]
struct Cli {
    /// JSON file with the targets to monitor
    #[arg(short, long)]
    targets: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive command shell (default)
    Shell,
    /// Run one collection cycle and print the sample as JSON
    Once,
    /// Sample continuously and serve the HTTP API until Ctrl-C
    Run {
        /// Sampling interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Run one collection cycle and write a report
    Report {
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    // Initialize logging; stdout belongs to the shell
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("healthwatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = MonitorConfig::load();
    tracing::info!(
        interval_secs = cfg.interval.as_secs(),
        history_size = cfg.history_size,
        workers = cfg.workers,
        "Starting healthwatch"
    );

    let probe = Arc::new(NetworkProbe::new()?);
    let runtime = Arc::new(ProcessMetrics::new()?);
    let monitor = Arc::new(Monitor::new(&cfg, probe, runtime));

    if let Some(path) = cli.targets.as_ref().or(cfg.targets_file.as_ref()) {
        let targets = load_targets(path)?;
        tracing::info!(path = %path.display(), count = targets.len(), "Loaded targets");
        monitor.replace_targets(targets)?;
    }

    // Add sample target if none exist
    if monitor.list_targets().is_empty() {
        tracing::info!("Adding sample target: Google");
        monitor.add_target(store::Target::http("Google", "https://www.google.com"))?;
    }

    match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => {
            Shell::new(monitor, cfg.report_dir.clone()).run().await?;
        }
        Command::Once => {
            let sample = monitor.collect_once().await?;
            println!("{}", serde_json::to_string_pretty(sample.as_ref())?);
        }
        Command::Run { interval } => {
            monitor.start(interval.filter(|s| *s > 0).map(Duration::from_secs)).await?;

            let server = Server::new(&cfg, monitor.clone());
            let served = server.start(shutdown_signal()).await;

            monitor.stop().await;
            served?;
        }
        Command::Report { format, output } => {
            monitor.collect_once().await?;
            let path = output.unwrap_or_else(|| default_report_path(&cfg.report_dir, format));
            monitor.write_report(format, &path).await?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
