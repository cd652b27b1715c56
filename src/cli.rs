use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use tradewatch::config::MonitorConfig;
use tradewatch::types::RawSecurityEvent;
use tradewatch::SecurityMonitor;

#[derive(Parser)]
#[command(name = "tradewatch")]
#[command(author, version, about = "Security-event monitoring and correlation engine")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the monitor, ingesting JSON-lines events
    Run {
        /// Read events from a file instead of stdin
        #[arg(short, long)]
        events: Option<PathBuf>,
    },

    /// Validate the configuration file
    CheckConfig,

    /// Print the default configuration as TOML
    DefaultConfig,
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::load_or_default()?,
    };

    match cli.command {
        Commands::Run { events } => run_monitor(config, events).await,
        Commands::CheckConfig => {
            println!("Configuration OK");
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::DefaultConfig => {
            println!("{}", toml::to_string_pretty(&MonitorConfig::default())?);
            Ok(())
        }
    }
}

/// Run the engine in the foreground, feeding it newline-delimited JSON events
/// from a file or stdin. Used for replay and integration testing against
/// captured event streams.
async fn run_monitor(config: MonitorConfig, events: Option<PathBuf>) -> Result<()> {
    let monitor = SecurityMonitor::with_default_sinks(config);
    monitor.start();

    let result = match events {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open event file: {}", path.display()))?;
            ingest_lines(&monitor, BufReader::new(file)).await
        }
        None => {
            info!("Reading events from stdin (one JSON object per line)");
            ingest_lines(&monitor, BufReader::new(tokio::io::stdin())).await
        }
    };

    let status = monitor.status();
    info!(
        events_processed = status.events_processed,
        active_incidents = status.active_incidents,
        patterns_fired = status.patterns_fired,
        "Event stream finished"
    );

    let snapshot = monitor.dashboard_snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    monitor.stop().await;
    result
}

async fn ingest_lines<R>(monitor: &SecurityMonitor, reader: BufReader<R>) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let raw: RawSecurityEvent = match serde_json::from_str(&line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping malformed event line: {e}");
                continue;
            }
        };
        if let Err(e) = monitor.ingest(raw) {
            error!("Event rejected: {e}");
        }
    }
    Ok(())
}
