//! Drives a script through an [`EconomyService`] over whichever stores the
//! caller supplies: [`MemoryStore`] by default, `PostgreSQL` with
//! `--postgres`.
//!
//! Every step pins a [`ManualClock`] to the step's `at` before dispatching,
//! so offline income, cooldowns and booster expiry replay exactly. With a
//! fixed `service.rng_seed` the whole run, critical hits included, is
//! reproducible.

use std::io::Write;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use starclick_core::config::InfrastructureConfig;
use starclick_core::{EconomyConfig, EffectCatalog, ManualClock};
use starclick_db::{LedgerRecorder, MemoryStore, PersistenceGateway, PostgresConfig};
use starclick_service::{EconomyService, ServiceError};

use crate::error::ReplayError;
use crate::report::{self, PlayerReport, StepReport};
use crate::script::Script;

/// Totals for a finished replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Steps that succeeded.
    pub succeeded: usize,
    /// Steps the service rejected.
    pub rejected: usize,
    /// Registered players whose audit found an anomaly.
    pub unbalanced: usize,
}

/// Pool settings for the `--postgres` backend.
pub fn postgres_config(infrastructure: &InfrastructureConfig) -> PostgresConfig {
    PostgresConfig::new(
        infrastructure.postgres_url.as_str(),
        infrastructure.max_connections,
    )
}

/// Replay on a fresh [`MemoryStore`].
///
/// # Errors
///
/// See [`run`].
pub async fn run_in_memory(
    script: &Script,
    catalog: EffectCatalog,
    config: EconomyConfig,
    out: &mut impl Write,
) -> Result<ReplaySummary, ReplayError> {
    let store = MemoryStore::new();
    run(script, catalog, config, store.clone(), store, out).await
}

/// Run `script` and write one JSON line per step, then one per registered
/// player.
///
/// Player ids come from the script, so a persistent backend must not
/// already hold them: registration would be rejected.
///
/// # Errors
///
/// Rejected commands are reported, not returned. Errors come from writing
/// the report or from the final per-player queries.
pub async fn run<G, L>(
    script: &Script,
    catalog: EffectCatalog,
    config: EconomyConfig,
    gateway: G,
    ledger: L,
    out: &mut impl Write,
) -> Result<ReplaySummary, ReplayError>
where
    G: PersistenceGateway,
    L: LedgerRecorder + Clone,
{
    let clock = ManualClock::new(script.start().unwrap_or_else(Utc::now));
    let service = EconomyService::new(
        Arc::new(catalog),
        Arc::new(config),
        gateway,
        ledger.clone(),
        clock.clone(),
    );

    let mut summary = ReplaySummary::default();
    for (index, step) in script.steps.iter().enumerate() {
        let Some(player_id) = script.player_id(&step.player) else {
            continue;
        };
        clock.set(step.at);
        let result = service.dispatch(player_id, &step.command).await;
        if result.is_ok() {
            summary.succeeded = summary.succeeded.saturating_add(1);
        } else {
            summary.rejected = summary.rejected.saturating_add(1);
        }

        let line = StepReport::new(
            index.saturating_add(1),
            &step.player,
            step.at,
            step.command.name(),
            &result,
        );
        serde_json::to_writer(&mut *out, &line)?;
        writeln!(out)?;
    }

    for (label, player_id) in &script.players {
        let state = match service.state(*player_id).await {
            Ok(state) => state,
            Err(ServiceError::PlayerNotFound { .. }) => continue,
            Err(e) => return Err(e.into()),
        };
        let verdict = service.audit(*player_id).await?;
        let balance = service.balance_summary(*player_id).await?;
        let entries = ledger
            .entries(*player_id)
            .await
            .map_err(ServiceError::Persistence)?;

        if !verdict.is_balanced() {
            warn!(player = %label, "Ledger does not reconcile");
            summary.unbalanced = summary.unbalanced.saturating_add(1);
        }

        let line = PlayerReport {
            player: label,
            player_id: *player_id,
            state: &state,
            summary: balance,
            ledger: &entries,
            verdict: report::verdict(&verdict),
        };
        serde_json::to_writer(&mut *out, &line)?;
        writeln!(out)?;
    }

    info!(
        steps = script.steps.len(),
        succeeded = summary.succeeded,
        rejected = summary.rejected,
        unbalanced = summary.unbalanced,
        "Replay finished"
    );
    Ok(summary)
}
