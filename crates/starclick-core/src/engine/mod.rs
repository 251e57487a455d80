//! The economy engine: pure state transitions.
//!
//! Every command is a function of `(state, catalog, config, command, now)`
//! that returns either an error or a [`Transition`]: the successor state,
//! the ledger entries that explain every star it gained or lost, and the
//! events to show the player. The engine performs no I/O and reads no clock;
//! callers pass `now` in a [`CommandContext`] and, for taps, a random number
//! generator for critical rolls.
//!
//! # Transitions
//!
//! Handlers work on a private copy of the state and return it only after
//! the invariant checks in [`crate::invariants`] pass. On error the copy is
//! dropped, so the caller's state is never partially mutated.
//!
//! # Modules
//!
//! - `click` -- tap resolution
//! - `offline` -- idle income and energy regeneration
//! - `purchase` -- upgrades, energy packs, boosters, artifacts, bundles
//! - `inventory` -- using stocked items and toggling artifacts
//! - `rewards` -- ad rewards and the daily reward
//! - `admin` -- operator adjustments, referrals, bans, achievement back-fill
//! - `progression` -- leveling and achievement unlocks

mod admin;
mod click;
mod draft;
mod inventory;
mod offline;
mod progression;
mod purchase;
mod rewards;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;

use starclick_types::{
    AdStats, Command, CommandOutcome, CorrelationId, DailyRewardState, EconomyEvent,
    LedgerEntry, LedgerEntryType, PlayerId, ResourceState, Statistics,
};

use crate::catalog::EffectCatalog;
use crate::config::EconomyConfig;
use crate::error::EconomyError;

use draft::Draft;

// ---------------------------------------------------------------------------
// Context and results
// ---------------------------------------------------------------------------

/// Who a command is for, which request it belongs to, and when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    /// The player whose state is mutated.
    pub player_id: PlayerId,
    /// Stamped on every ledger entry the command produces.
    pub correlation_id: CorrelationId,
    /// The instant the command is evaluated at.
    pub now: DateTime<Utc>,
}

impl CommandContext {
    /// Context with a fresh correlation id.
    pub fn new(player_id: PlayerId, now: DateTime<Utc>) -> Self {
        Self {
            player_id,
            correlation_id: CorrelationId::new(),
            now,
        }
    }
}

/// The result of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<T> {
    /// Successor state.
    pub state: ResourceState,
    /// Ledger entries in sequence order.
    pub entries: Vec<LedgerEntry>,
    /// Events for the player, in the order they happened.
    pub events: Vec<EconomyEvent>,
    /// Command-specific result.
    pub outcome: T,
}

impl<T> Transition<T> {
    /// Transform the outcome, keeping state, entries and events.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Transition<U> {
        Transition {
            state: self.state,
            entries: self.entries,
            events: self.events,
            outcome: f(self.outcome),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Applies commands to player state against a catalog and tuning config.
///
/// The engine only borrows its inputs and is cheap to construct per
/// command.
#[derive(Debug, Clone, Copy)]
pub struct EconomyEngine<'a> {
    catalog: &'a EffectCatalog,
    config: &'a EconomyConfig,
}

impl<'a> EconomyEngine<'a> {
    /// Create an engine over `catalog` and `config`.
    pub const fn new(catalog: &'a EffectCatalog, config: &'a EconomyConfig) -> Self {
        Self { catalog, config }
    }

    /// The catalog in use.
    pub const fn catalog(&self) -> &EffectCatalog {
        self.catalog
    }

    /// Create a new player's state with the opening balance recorded as
    /// the first ledger entry.
    ///
    /// # Errors
    ///
    /// Only internal errors.
    pub fn register(&self, ctx: &CommandContext) -> Result<Transition<u64>, EconomyError> {
        let start = &self.config.starting;
        let base = ResourceState {
            player_id: ctx.player_id,
            stars: 0,
            energy: start.energy,
            max_energy: start.max_energy,
            click_power: start.click_power,
            passive_income: start.passive_income,
            total_clicks: 0,
            level: 1,
            experience: 0,
            critical_chance: Decimal::ZERO,
            critical_multiplier: 1,
            owned_upgrades: BTreeSet::new(),
            unlocked_achievements: BTreeMap::new(),
            inventory: BTreeMap::new(),
            active_boosters: Vec::new(),
            ad_stats: AdStats::new(ctx.now),
            daily: DailyRewardState::default(),
            referrals: BTreeSet::new(),
            referred_by: None,
            statistics: Statistics::default(),
            banned: false,
            ledger_sequence: 0,
            created_at: ctx.now,
            last_active_at: ctx.now,
            last_save: ctx.now,
            version: 0,
        };

        let mut draft = Draft::new(&base, ctx);
        draft.credit(
            LedgerEntryType::Opening,
            start.stars,
            "opening balance".to_owned(),
            None,
        )?;
        tracing::info!(player_id = %ctx.player_id, stars = start.stars, "player registered");
        draft.finish(self.config.leveling.exp_factor, start.stars)
    }

    /// Apply any command except [`Command::Register`] to an existing state.
    ///
    /// # Errors
    ///
    /// Whatever the command's handler returns;
    /// [`EconomyError::InvalidCommand`] for `Register`.
    pub fn execute(
        &self,
        state: &ResourceState,
        command: &Command,
        ctx: &CommandContext,
        rng: &mut impl Rng,
    ) -> Result<Transition<CommandOutcome>, EconomyError> {
        let transition = match command {
            Command::Register => {
                return Err(EconomyError::invalid("player is already registered"));
            }
            Command::Click => self.click(state, ctx, rng)?.map(CommandOutcome::Click),
            Command::ReconcileOffline => self
                .reconcile_offline(state, ctx)?
                .map(CommandOutcome::Offline),
            Command::Purchase { item_id, quantity } => self
                .purchase(state, item_id, *quantity, ctx)?
                .map(CommandOutcome::Purchase),
            Command::UseItem { item_id } => self
                .use_item(state, item_id, ctx)?
                .map(CommandOutcome::ItemUsed),
            Command::ToggleArtifact { item_id } => self
                .toggle_artifact(state, item_id, ctx)?
                .map(CommandOutcome::ArtifactToggled),
            Command::AdReward { ad_type, reward } => self
                .ad_reward(state, *ad_type, *reward, ctx)?
                .map(CommandOutcome::AdReward),
            Command::DailyReward => self
                .daily_reward(state, ctx)?
                .map(CommandOutcome::DailyReward),
            Command::AdminGrant { amount, note } => self
                .admin_grant(state, *amount, note, ctx)?
                .map(CommandOutcome::Adjustment),
            Command::AdminRemove { amount, note } => self
                .admin_remove(state, *amount, note, ctx)?
                .map(CommandOutcome::Adjustment),
            Command::Referral { referred } => self
                .referral(state, *referred, ctx)?
                .map(CommandOutcome::Referral),
            Command::SetBanned { banned } => self
                .set_banned(state, *banned, ctx)?
                .map(|banned| CommandOutcome::BanUpdated { banned }),
            Command::ReevaluateAchievements => self
                .reevaluate_achievements(state, ctx)?
                .map(CommandOutcome::Reevaluation),
        };
        tracing::debug!(
            player_id = %ctx.player_id,
            command = command.name(),
            entries = transition.entries.len(),
            events = transition.events.len(),
            "command applied"
        );
        Ok(transition)
    }
}
