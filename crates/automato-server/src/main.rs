//! automato daemon
//!
//! Loads the configuration directory, builds endpoints, triggers and actions,
//! then runs the scheduler until Ctrl-C.

mod scheduler;
mod setup;

use anyhow::{Context, Result};
use automato_config::load_documents;
use automato_core::SystemClock;
use clap::Parser;
use scheduler::{Scheduler, DEFAULT_PERIOD_SECS};
use setup::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Declarative automation over polled endpoints
#[derive(Parser, Debug)]
#[command(name = "automato")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding endpoints.yml, triggers.yml and actions.yml
    #[arg(short = 'c', long, env = "AUTOMATO_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,

    /// Seconds between scheduler ticks
    #[arg(short = 'i', long, default_value_t = DEFAULT_PERIOD_SECS)]
    interval: u64,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,

    /// Log filter, overrides RUST_LOG
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{}'", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref())?;

    info!(config_dir = %args.config_dir.display(), "Starting automato");

    let documents = load_documents(&args.config_dir)
        .with_context(|| format!("failed to load {}", args.config_dir.display()))?;
    if !documents.skipped.is_empty() {
        warn!(skipped = ?documents.skipped, "Some configuration entries were skipped");
    }

    let engine = Engine::build(&documents, Arc::new(SystemClock));
    debug!(triggers = ?engine.triggers.names().collect::<Vec<_>>(), "Triggers configured");
    engine.endpoints.check_transports().await;

    let mut scheduler = Scheduler::new(engine.actions, Duration::from_secs(args.interval.max(1)));

    if args.once {
        scheduler.tick().await;
        return Ok(());
    }

    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Shutting down...");
    Ok(())
}
