//! The command surface: one method per economy operation.
//!
//! Every mutating command runs the same pipeline:
//!
//! ```text
//! acquire lease ─> load snapshot ─> flush outbox ─> engine ─> save(expected_version)
//!                      ^                                          │
//!                      └────────── version conflict (bounded) ────┘
//!                                                                 │
//!                                              append entries <───┘
//! ```
//!
//! The engine computes the whole transition in memory, so a command that
//! fails validation, times out or exhausts its conflict retries has written
//! nothing. The save carries the new ledger entries as the snapshot's
//! outbox; if the following append fails the command reports
//! [`ServiceError::LedgerUnavailable`] and the outbox is appended before the
//! player's next command.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::Instant;

use starclick_core::{
    CommandContext, EconomyConfig, EconomyEngine, EconomyError, EffectCatalog, SystemClock,
    TimeSource, Transition,
};
use starclick_db::{LedgerRecorder, PersistenceGateway, PlayerSnapshot};
use starclick_ledger::{ReconciliationResult, reconcile, summarize};
use starclick_types::{
    AdResult, AdType, AdjustmentResult, ArtifactToggleResult, BalanceSummary, ClickResult,
    Command, CommandOutcome, DailyResult, ItemId, ItemUseResult, LedgerEntry, LedgerQuery,
    OfflineResult, PlayerId, PurchaseResult, ReevaluationResult, ReferralResult, ResourceState,
};

use crate::error::ServiceError;
use crate::guard::ConcurrencyGuard;

/// Runs economy commands against shared storage.
///
/// Generic over the snapshot store `G`, the ledger recorder `L` and the
/// clock `C`, so tests can substitute in-memory stores and a manual clock.
#[derive(Debug)]
pub struct EconomyService<G, L, C = SystemClock> {
    catalog: Arc<EffectCatalog>,
    config: Arc<EconomyConfig>,
    gateway: G,
    ledger: L,
    clock: C,
    guard: ConcurrencyGuard,
    rng: Mutex<StdRng>,
}

impl<G, L, C> EconomyService<G, L, C>
where
    G: PersistenceGateway,
    L: LedgerRecorder,
    C: TimeSource,
{
    /// Create a service. Critical rolls are seeded from
    /// `service.rng_seed` when set, otherwise from the OS.
    pub fn new(
        catalog: Arc<EffectCatalog>,
        config: Arc<EconomyConfig>,
        gateway: G,
        ledger: L,
        clock: C,
    ) -> Self {
        let rng = config
            .service
            .rng_seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        let guard = ConcurrencyGuard::new(config.service.guard_policy);
        tracing::info!(
            catalog_version = catalog.version(),
            guard_policy = ?config.service.guard_policy,
            deadline_ms = config.service.command_deadline_ms,
            max_conflict_retries = config.service.max_conflict_retries,
            seeded = config.service.rng_seed.is_some(),
            "Economy service ready"
        );
        Self {
            catalog,
            config,
            gateway,
            ledger,
            clock,
            guard,
            rng: Mutex::new(rng),
        }
    }

    /// The catalog commands are evaluated against.
    pub fn catalog(&self) -> &EffectCatalog {
        &self.catalog
    }

    /// The concurrency guard, for inspecting contention.
    pub const fn guard(&self) -> &ConcurrencyGuard {
        &self.guard
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Create a player with the opening balance.
    ///
    /// # Errors
    ///
    /// [`ServiceError::AlreadyRegistered`] if the player exists, plus the
    /// contention and storage errors every command can return.
    pub async fn register(&self, player_id: PlayerId) -> Result<Transition<u64>, ServiceError> {
        let deadline = self.deadline(player_id)?;
        let _lease = self.guard.acquire(player_id, deadline).await?;

        if self.load(player_id).await?.is_some() {
            return Err(ServiceError::AlreadyRegistered { player_id });
        }

        let ctx = CommandContext::new(player_id, self.clock.now());
        let mut transition = self.engine().register(&ctx)?;
        ensure_before(deadline, player_id)?;

        match self
            .gateway
            .save(&transition.state, &transition.entries, 0)
            .await
        {
            Ok(version) => transition.state.version = version,
            Err(e) if e.is_conflict() => {
                return Err(ServiceError::AlreadyRegistered { player_id });
            }
            Err(e) => return Err(ServiceError::Persistence(e)),
        }
        self.publish(player_id, &transition.entries).await?;
        Ok(transition)
    }

    /// Run any [`Command`] for `player_id`.
    ///
    /// # Errors
    ///
    /// Whatever the command's dedicated method returns.
    pub async fn dispatch(
        &self,
        player_id: PlayerId,
        command: &Command,
    ) -> Result<Transition<CommandOutcome>, ServiceError> {
        match command {
            Command::Register => {
                return Ok(self
                    .register(player_id)
                    .await?
                    .map(|stars| CommandOutcome::Registered { stars }));
            }
            Command::Referral { referred } => {
                return Ok(self
                    .record_referral(player_id, *referred)
                    .await?
                    .map(CommandOutcome::Referral));
            }
            _ => {}
        }
        self.run(player_id, command.name(), |engine, state, ctx, rng| {
            engine.execute(state, command, ctx, rng)
        })
        .await
    }

    /// Resolve one tap.
    ///
    /// # Errors
    ///
    /// Engine rejections such as [`EconomyError::InsufficientEnergy`], plus
    /// contention and storage errors.
    pub async fn click(&self, player_id: PlayerId) -> Result<Transition<ClickResult>, ServiceError> {
        self.run(player_id, "click", |engine, state, ctx, rng| {
            engine.click(state, ctx, rng)
        })
        .await
    }

    /// Credit idle income and regenerate energy since the last activity.
    ///
    /// # Errors
    ///
    /// Engine rejections, plus contention and storage errors.
    pub async fn reconcile_offline(
        &self,
        player_id: PlayerId,
    ) -> Result<Transition<OfflineResult>, ServiceError> {
        self.run(player_id, "reconcile_offline", |engine, state, ctx, _| {
            engine.reconcile_offline(state, ctx)
        })
        .await
    }

    /// Buy `quantity` of a catalog item.
    ///
    /// # Errors
    ///
    /// Engine rejections such as [`EconomyError::InsufficientFunds`] or
    /// [`EconomyError::AlreadyOwned`], plus contention and storage errors.
    pub async fn purchase(
        &self,
        player_id: PlayerId,
        item_id: &ItemId,
        quantity: u32,
    ) -> Result<Transition<PurchaseResult>, ServiceError> {
        self.run(player_id, "purchase", |engine, state, ctx, _| {
            engine.purchase(state, item_id, quantity, ctx)
        })
        .await
    }

    /// Consume one stocked booster or energy pack.
    ///
    /// # Errors
    ///
    /// Engine rejections such as [`EconomyError::BoosterAlreadyActive`],
    /// plus contention and storage errors.
    pub async fn use_item(
        &self,
        player_id: PlayerId,
        item_id: &ItemId,
    ) -> Result<Transition<ItemUseResult>, ServiceError> {
        self.run(player_id, "use_item", |engine, state, ctx, _| {
            engine.use_item(state, item_id, ctx)
        })
        .await
    }

    /// Equip or unequip an owned artifact.
    ///
    /// # Errors
    ///
    /// Engine rejections, plus contention and storage errors.
    pub async fn toggle_artifact(
        &self,
        player_id: PlayerId,
        item_id: &ItemId,
    ) -> Result<Transition<ArtifactToggleResult>, ServiceError> {
        self.run(player_id, "toggle_artifact", |engine, state, ctx, _| {
            engine.toggle_artifact(state, item_id, ctx)
        })
        .await
    }

    /// Grant a validated ad reward.
    ///
    /// # Errors
    ///
    /// Engine rejections such as [`EconomyError::AdCooldown`], plus
    /// contention and storage errors.
    pub async fn ad_reward(
        &self,
        player_id: PlayerId,
        ad_type: AdType,
        reward: u64,
    ) -> Result<Transition<AdResult>, ServiceError> {
        self.run(player_id, "ad_reward", |engine, state, ctx, _| {
            engine.ad_reward(state, ad_type, reward, ctx)
        })
        .await
    }

    /// Claim today's daily reward.
    ///
    /// # Errors
    ///
    /// [`EconomyError::DailyLimitReached`] on a second claim the same UTC
    /// day, plus contention and storage errors.
    pub async fn daily_reward(
        &self,
        player_id: PlayerId,
    ) -> Result<Transition<DailyResult>, ServiceError> {
        self.run(player_id, "daily_reward", |engine, state, ctx, _| {
            engine.daily_reward(state, ctx)
        })
        .await
    }

    /// Operator credit.
    ///
    /// # Errors
    ///
    /// Engine rejections, plus contention and storage errors.
    pub async fn admin_grant(
        &self,
        player_id: PlayerId,
        amount: u64,
        note: &str,
    ) -> Result<Transition<AdjustmentResult>, ServiceError> {
        self.run(player_id, "admin_grant", |engine, state, ctx, _| {
            engine.admin_grant(state, amount, note, ctx)
        })
        .await
    }

    /// Operator debit.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InsufficientFunds`] if the balance would go
    /// negative, plus contention and storage errors.
    pub async fn admin_remove(
        &self,
        player_id: PlayerId,
        amount: u64,
        note: &str,
    ) -> Result<Transition<AdjustmentResult>, ServiceError> {
        self.run(player_id, "admin_remove", |engine, state, ctx, _| {
            engine.admin_remove(state, amount, note, ctx)
        })
        .await
    }

    /// Credit `referrer` for bringing in `referred`.
    ///
    /// Both players must exist. The referred player is marked first, so a
    /// second referrer of the same player is rejected; if the referrer's
    /// reward then fails to commit, the mark is cleared again.
    ///
    /// # Errors
    ///
    /// [`ServiceError::PlayerNotFound`] for either player,
    /// [`EconomyError::AlreadyReferred`] or a self-referral rejection, plus
    /// contention and storage errors.
    pub async fn record_referral(
        &self,
        referrer: PlayerId,
        referred: PlayerId,
    ) -> Result<Transition<ReferralResult>, ServiceError> {
        let snapshot = self.load_existing(referrer).await?;
        let ctx = CommandContext::new(referrer, self.clock.now());
        self.engine().referral(&snapshot.state, referred, &ctx)?;

        self.run(referred, "mark_referred", |engine, state, ctx, _| {
            engine.mark_referred(state, referrer, ctx)
        })
        .await?;

        let rewarded = self
            .run(referrer, "referral", |engine, state, ctx, _| {
                engine.referral(state, referred, ctx)
            })
            .await;
        if let Err(reward_error) = &rewarded {
            tracing::warn!(
                %referrer,
                %referred,
                error = %reward_error,
                "Referral reward failed, clearing referred mark"
            );
            if let Err(e) = self
                .run(referred, "unmark_referred", |engine, state, ctx, _| {
                    engine.unmark_referred(state, referrer, ctx)
                })
                .await
            {
                tracing::error!(%referrer, %referred, error = %e, "Referred mark left in place");
            }
        }
        rewarded
    }

    /// Set or clear the player's ban flag.
    ///
    /// # Errors
    ///
    /// Contention and storage errors.
    pub async fn set_banned(
        &self,
        player_id: PlayerId,
        banned: bool,
    ) -> Result<Transition<bool>, ServiceError> {
        self.run(player_id, "set_banned", |engine, state, ctx, _| {
            engine.set_banned(state, banned, ctx)
        })
        .await
    }

    /// Evaluate every achievement family for the player.
    ///
    /// # Errors
    ///
    /// Engine rejections, plus contention and storage errors.
    pub async fn reevaluate_achievements(
        &self,
        player_id: PlayerId,
    ) -> Result<Transition<ReevaluationResult>, ServiceError> {
        self.run(player_id, "reevaluate_achievements", |engine, state, ctx, _| {
            engine.reevaluate_achievements(state, ctx)
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The player's current state.
    ///
    /// # Errors
    ///
    /// [`ServiceError::PlayerNotFound`] or a storage error.
    pub async fn state(&self, player_id: PlayerId) -> Result<ResourceState, ServiceError> {
        Ok(self.load_existing(player_id).await?.state)
    }

    /// One page of the player's ledger, newest first.
    ///
    /// # Errors
    ///
    /// [`ServiceError::PlayerNotFound`], or a storage error.
    pub async fn get_ledger(
        &self,
        player_id: PlayerId,
        query: &LedgerQuery,
    ) -> Result<Vec<LedgerEntry>, ServiceError> {
        self.flushed(player_id).await?;
        self.ledger
            .page(player_id, query)
            .await
            .map_err(ServiceError::Persistence)
    }

    /// Total income, total expenses and current balance.
    ///
    /// # Errors
    ///
    /// [`ServiceError::PlayerNotFound`], a storage error, or an overflow
    /// while summing.
    pub async fn balance_summary(
        &self,
        player_id: PlayerId,
    ) -> Result<BalanceSummary, ServiceError> {
        self.flushed(player_id).await?;
        let entries = self.entries(player_id).await?;
        summarize(&entries).map_err(|e| ServiceError::Economy(EconomyError::from(e)))
    }

    /// Check the stored state against the stored ledger.
    ///
    /// # Errors
    ///
    /// [`ServiceError::PlayerNotFound`] or a storage error. An anomaly is a
    /// successful result, not an error.
    pub async fn audit(&self, player_id: PlayerId) -> Result<ReconciliationResult, ServiceError> {
        let snapshot = self.flushed(player_id).await?;
        let entries = self.entries(player_id).await?;
        let result = reconcile(
            player_id,
            snapshot.state.stars,
            snapshot.state.ledger_sequence,
            &entries,
        );
        if let ReconciliationResult::Anomaly(anomaly) = &result {
            tracing::warn!(%player_id, kind = ?anomaly.kind, "{anomaly}");
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    async fn run<T>(
        &self,
        player_id: PlayerId,
        command: &'static str,
        mut apply: impl FnMut(
            &EconomyEngine<'_>,
            &ResourceState,
            &CommandContext,
            &mut StdRng,
        ) -> Result<Transition<T>, EconomyError>,
    ) -> Result<Transition<T>, ServiceError> {
        let deadline = self.deadline(player_id)?;
        let _lease = self.guard.acquire(player_id, deadline).await?;
        let max_attempts = self.config.service.max_conflict_retries.saturating_add(1);

        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            let snapshot = self.flushed(player_id).await?;

            let ctx = CommandContext::new(player_id, self.clock.now());
            let mut transition = {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                apply(&self.engine(), &snapshot.state, &ctx, &mut rng)?
            };
            ensure_before(deadline, player_id)?;

            match self
                .gateway
                .save(&transition.state, &transition.entries, snapshot.version)
                .await
            {
                Ok(version) => {
                    transition.state.version = version;
                    self.publish(player_id, &transition.entries).await?;
                    tracing::debug!(
                        %player_id,
                        command,
                        version,
                        attempts,
                        entries = transition.entries.len(),
                        "Command committed"
                    );
                    return Ok(transition);
                }
                Err(e) if e.is_conflict() && attempts < max_attempts => {
                    tracing::warn!(%player_id, command, attempts, "Version conflict, retrying");
                }
                Err(e) if e.is_conflict() => {
                    tracing::warn!(%player_id, command, attempts, "Version conflict, giving up");
                    return Err(ServiceError::Conflict {
                        player_id,
                        attempts,
                    });
                }
                Err(e) => return Err(ServiceError::Persistence(e)),
            }
        }
    }

    fn engine(&self) -> EconomyEngine<'_> {
        EconomyEngine::new(&self.catalog, &self.config)
    }

    fn deadline(&self, player_id: PlayerId) -> Result<Instant, ServiceError> {
        let budget = Duration::from_millis(self.config.service.command_deadline_ms);
        Instant::now()
            .checked_add(budget)
            .ok_or(ServiceError::Timeout { player_id })
    }

    async fn load(&self, player_id: PlayerId) -> Result<Option<PlayerSnapshot>, ServiceError> {
        self.gateway
            .load(player_id)
            .await
            .map_err(ServiceError::Persistence)
    }

    async fn load_existing(&self, player_id: PlayerId) -> Result<PlayerSnapshot, ServiceError> {
        self.load(player_id)
            .await?
            .ok_or(ServiceError::PlayerNotFound { player_id })
    }

    /// Load the snapshot and make sure its outbox reached the recorder.
    async fn flushed(&self, player_id: PlayerId) -> Result<PlayerSnapshot, ServiceError> {
        let snapshot = self.load_existing(player_id).await?;
        if !snapshot.pending_ledger.is_empty() {
            self.publish(player_id, &snapshot.pending_ledger).await?;
        }
        Ok(snapshot)
    }

    async fn entries(&self, player_id: PlayerId) -> Result<Vec<LedgerEntry>, ServiceError> {
        self.ledger
            .entries(player_id)
            .await
            .map_err(ServiceError::Persistence)
    }

    async fn publish(&self, player_id: PlayerId, entries: &[LedgerEntry]) -> Result<(), ServiceError> {
        if entries.is_empty() {
            return Ok(());
        }
        match self.ledger.append(entries).await {
            Ok(_) => Ok(()),
            Err(source) => {
                tracing::error!(
                    %player_id,
                    pending = entries.len(),
                    error = %source,
                    "Ledger append failed, entries left in outbox"
                );
                Err(ServiceError::LedgerUnavailable { player_id, source })
            }
        }
    }
}

fn ensure_before(deadline: Instant, player_id: PlayerId) -> Result<(), ServiceError> {
    if Instant::now() >= deadline {
        tracing::warn!(%player_id, "Command deadline passed before save");
        return Err(ServiceError::Timeout { player_id });
    }
    Ok(())
}
