//! `cslog` - diagnostic-report logger for caesium frequency standards.
//!
//! Polls every configured instrument with `SYSTEM:PRINT?` on a minute-slot
//! schedule and appends one CSV row per reading to that instrument's log file.
//!
//! ```bash
//! cslog --config config/cslog.toml
//! cslog --once            # single cycle, then exit
//! RUST_LOG=cs_daq=debug cslog
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use cs_daq::app;
use cs_daq::config::{Settings, DEFAULT_CONFIG_PATH};
use cs_daq::error::AppResult;
use cs_daq::instrument::CsStandard;
use cs_daq::schedule::LogSchedule;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cslog", version, about = "Log caesium clock diagnostics to CSV")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run one polling cycle immediately and exit
    #[arg(long)]
    once: bool,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    // RUST_LOG wins over --log-level, which wins over the config file.
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| settings.application.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    info!(name = %settings.application.name, config = %cli.config.display(), "Starting");

    let instruments = settings
        .enabled_instruments()
        .map(|instrument| CsStandard::from_config(&settings, instrument))
        .collect::<AppResult<Vec<_>>>()
        .context("Failed to set up instruments")?;
    for cs in &instruments {
        info!("{}", cs);
    }

    let instruments = app::identify_all(instruments).await?;

    if cli.once {
        let (_, summary) = app::run_once(instruments).await?;
        if summary.failed > 0 {
            warn!(failed = summary.failed, "Some readings were not logged");
        }
        return Ok(());
    }

    app::run(
        instruments,
        LogSchedule::from(&settings.schedule),
        settings.schedule.poll_period,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        },
    )
    .await?;

    info!("Stopped");
    Ok(())
}
