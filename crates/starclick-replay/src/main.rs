//! Command-script replay for the Starclick economy.
//!
//! Runs a JSON script of timestamped player commands through the economy
//! service and prints one JSON line per step,
//! followed by each registered player's final state, ledger and audit
//! verdict. The exit status is non-zero if any ledger fails to reconcile.
//!
//! ```text
//! starclick-replay <script.json> [--config <path>] [--catalog <path>] [--seed <n>] [--postgres]
//! ```
//!
//! Storage is in memory unless `--postgres` is given, in which case the run
//! goes to `infrastructure.postgres_url` (or `DATABASE_URL`). The script's
//! player ids must not exist in that database yet.
//!
//! # Startup Sequence
//!
//! 1. Parse arguments
//! 2. Load configuration (`--config`, else `starclick-config.yaml`, else defaults)
//! 3. Initialize structured logging on stderr
//! 4. Load the catalog and the script
//! 5. Open the database when `--postgres` is given
//! 6. Replay and audit

mod args;
mod error;
mod replay;
mod report;
mod script;

use std::path::Path;

use starclick_core::config::LoggingConfig;
use starclick_core::{EconomyConfig, EffectCatalog, LogFormat};
use starclick_db::PostgresPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::Args;
use crate::error::ReplayError;
use crate::script::Script;

/// Config file picked up from the working directory.
const DEFAULT_CONFIG_PATH: &str = "starclick-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error for bad arguments, unreadable inputs, or when any
/// player's ledger does not reconcile.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1))?;

    let mut config = load_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.service.rng_seed = Some(seed);
    }
    init_tracing(&config.logging);
    info!(
        script = %args.script.display(),
        seed = ?config.service.rng_seed,
        "starclick-replay starting"
    );

    let catalog = match &args.catalog {
        Some(path) => EffectCatalog::from_file(path).map_err(ReplayError::from)?,
        None => EffectCatalog::standard(),
    };
    let script = Script::from_file(&args.script).map_err(ReplayError::from)?;
    info!(
        players = script.players.len(),
        steps = script.steps.len(),
        catalog_version = catalog.version(),
        "Script loaded"
    );

    let mut stdout = std::io::stdout().lock();
    let summary = if args.postgres {
        let pool = PostgresPool::open(&replay::postgres_config(&config.infrastructure))
            .await
            .map_err(ReplayError::from)?;
        let (gateway, ledger) = (pool.player_store(), pool.ledger_store());
        let summary = replay::run(&script, catalog, config, gateway, ledger, &mut stdout).await;
        pool.close().await;
        summary?
    } else {
        replay::run_in_memory(&script, catalog, config, &mut stdout).await?
    };
    if summary.unbalanced > 0 {
        return Err(ReplayError::Unbalanced {
            count: summary.unbalanced,
        }
        .into());
    }
    Ok(())
}

/// Load configuration from `path`, or from `starclick-config.yaml` when
/// it exists, or fall back to defaults.
fn load_config(path: Option<&Path>) -> Result<EconomyConfig, ReplayError> {
    if let Some(path) = path {
        return Ok(EconomyConfig::from_file(path)?);
    }
    let config_path = Path::new(DEFAULT_CONFIG_PATH);
    if config_path.exists() {
        Ok(EconomyConfig::from_file(config_path)?)
    } else {
        Ok(EconomyConfig::default())
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
