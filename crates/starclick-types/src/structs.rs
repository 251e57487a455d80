//! Core data structures: the per-player resource state and ledger entries.
//!
//! [`ResourceState`] is pure data. All mutation goes through the economy
//! engine in `starclick-core`, which enforces the invariants documented
//! on each field.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AdType, BoosterKind, LedgerEntryType};
use crate::ids::{AchievementId, CorrelationId, ItemId, LedgerEntryId, PlayerId};

// ---------------------------------------------------------------------------
// Resource state
// ---------------------------------------------------------------------------

/// A player's complete economy state.
///
/// One value exists per player. It is owned exclusively by the command
/// currently holding that player's lock.
///
/// # Invariants
///
/// - `stars` equals the running sum of the player's ledger entries.
/// - `0 <= energy <= max_energy` and `max_energy >= 10`.
/// - `click_power >= 1`, `critical_multiplier >= 1`, `level >= 1`.
/// - `total_clicks`, `owned_upgrades` and `unlocked_achievements` never shrink.
/// - `experience < level * LEVEL_EXP_FACTOR` once leveling has resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceState {
    /// Owner of this state.
    pub player_id: PlayerId,
    /// Spendable currency.
    pub stars: u64,
    /// Click fuel.
    pub energy: u32,
    /// Energy capacity.
    pub max_energy: u32,
    /// Stars per tap before boosters and criticals.
    pub click_power: u64,
    /// Stars per idle second.
    pub passive_income: u64,
    /// Lifetime tap count.
    pub total_clicks: u64,
    /// Current level, starting at 1.
    pub level: u32,
    /// Experience towards the next level.
    pub experience: u64,
    /// Probability in `[0, 1]` that a tap is critical.
    #[ts(as = "String")]
    pub critical_chance: Decimal,
    /// Factor applied to a critical tap.
    pub critical_multiplier: u32,
    /// Permanent upgrades purchased so far.
    pub owned_upgrades: BTreeSet<ItemId>,
    /// Unlocked achievements with the reward granted at unlock time.
    pub unlocked_achievements: BTreeMap<AchievementId, UnlockedAchievement>,
    /// Consumable and collectible items.
    pub inventory: BTreeMap<ItemId, InventorySlot>,
    /// Boosters in activation order (oldest first).
    pub active_boosters: Vec<ActiveBooster>,
    /// Ad view counters.
    pub ad_stats: AdStats,
    /// Daily login reward tracking.
    pub daily: DailyRewardState,
    /// Players this player has referred.
    pub referrals: BTreeSet<PlayerId>,
    /// The player credited for referring this one, set at most once.
    #[serde(default)]
    pub referred_by: Option<PlayerId>,
    /// High-water marks.
    pub statistics: Statistics,
    /// Banned players cannot issue mutating commands.
    pub banned: bool,
    /// Number of ledger entries ever produced for this player.
    pub ledger_sequence: u64,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Time of the last command that counted as player activity.
    pub last_active_at: DateTime<Utc>,
    /// Time of the last successful save.
    pub last_save: DateTime<Utc>,
    /// Optimistic-concurrency token, bumped by every save.
    pub version: u64,
}

impl ResourceState {
    /// Whether a booster of `kind` is still running at `now`.
    pub fn has_active_booster(&self, kind: BoosterKind, now: DateTime<Utc>) -> bool {
        self.active_boosters
            .iter()
            .any(|b| b.kind == kind && b.is_active(now))
    }

    /// Boosters of `kind` that are still running at `now`, oldest first.
    pub fn boosters_of(
        &self,
        kind: BoosterKind,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &ActiveBooster> {
        self.active_boosters
            .iter()
            .filter(move |b| b.kind == kind && b.is_active(now))
    }

    /// Number of items of `item` held in the inventory.
    pub fn inventory_count(&self, item: &ItemId) -> u32 {
        self.inventory.get(item).map_or(0, |slot| slot.count)
    }
}

/// Record of an unlocked achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UnlockedAchievement {
    /// Stars granted when the achievement unlocked.
    pub reward: u64,
    /// Unlock time.
    pub unlocked_at: DateTime<Utc>,
}

/// One inventory slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct InventorySlot {
    /// Number of units held.
    pub count: u32,
    /// Whether an artifact's bonus is currently applied.
    pub equipped: bool,
}

/// A running booster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActiveBooster {
    /// Catalog item that activated the booster.
    pub booster_id: ItemId,
    /// Income stream the booster multiplies.
    pub kind: BoosterKind,
    /// Multiplier applied with floor rounding.
    #[ts(as = "String")]
    pub multiplier: Decimal,
    /// Activation time.
    pub activated_at: DateTime<Utc>,
    /// Expiry time. At or after this instant the booster has no effect.
    pub expires_at: DateTime<Utc>,
}

impl ActiveBooster {
    /// A booster is active strictly before its expiry.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Ad view counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AdStats {
    /// Views granted since `daily_reset`.
    pub ads_watched_today: u32,
    /// Lifetime views.
    pub total_ads_watched: u64,
    /// Lifetime stars earned from ads.
    pub total_earned_from_ads: u64,
    /// Start of the current daily window.
    pub daily_reset: DateTime<Utc>,
    /// Time of the last granted view.
    pub last_ad_watch: Option<DateTime<Utc>>,
    /// Time of the last granted view per ad type, for cooldowns.
    pub last_watch_by_type: BTreeMap<AdType, DateTime<Utc>>,
}

impl AdStats {
    /// Fresh counters whose daily window starts at `now`.
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            ads_watched_today: 0,
            total_ads_watched: 0,
            total_earned_from_ads: 0,
            daily_reset: now,
            last_ad_watch: None,
            last_watch_by_type: BTreeMap::new(),
        }
    }
}

/// Daily login reward tracking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DailyRewardState {
    /// UTC date of the last claim.
    pub last_claim_date: Option<NaiveDate>,
    /// Consecutive days claimed, including the last claim.
    pub streak: u32,
    /// Most recent claims, oldest first.
    pub history: Vec<DailyClaim>,
}

/// A single daily reward claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DailyClaim {
    /// UTC date of the claim.
    pub date: NaiveDate,
    /// Stars granted.
    pub reward: u64,
    /// Streak after the claim.
    pub streak: u32,
}

/// High-water marks kept for leaderboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Statistics {
    /// Highest star balance ever held.
    pub max_stars: u64,
    /// Highest click power ever reached.
    pub max_click_power: u64,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One immutable balance-changing event.
///
/// Entries are created exactly once and never edited. A correction is a
/// new entry with the opposite sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerEntry {
    /// Unique entry identifier.
    pub id: LedgerEntryId,
    /// Player whose balance changed.
    pub player_id: PlayerId,
    /// Position in the player's ledger, contiguous from 1.
    pub sequence: u64,
    /// The category of the event.
    pub entry_type: LedgerEntryType,
    /// Signed change in stars, never zero.
    pub amount: i64,
    /// Star balance after this entry.
    pub resulting_balance: u64,
    /// Human-readable description (e.g. `"UPGRADE double_click"`).
    pub reason: String,
    /// Related catalog id, ad type or player, if any.
    pub reference: Option<String>,
    /// Shared by every entry produced by the same command.
    pub correlation_id: CorrelationId,
    /// Command time.
    pub timestamp: DateTime<Utc>,
}

/// Aggregate income and spending over a set of ledger entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BalanceSummary {
    /// Sum of all positive amounts.
    pub total_income: u64,
    /// Sum of the magnitudes of all negative amounts.
    pub total_expenses: u64,
    /// Balance after the last entry.
    pub current_balance: u64,
    /// Number of entries summarized.
    pub entry_count: u64,
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn booster(kind: BoosterKind, expires_in_secs: i64, now: DateTime<Utc>) -> ActiveBooster {
        ActiveBooster {
            booster_id: ItemId::from("booster_2x_1h"),
            kind,
            multiplier: Decimal::TWO,
            activated_at: now,
            expires_at: now + Duration::seconds(expires_in_secs),
        }
    }

    #[test]
    fn booster_expiring_now_is_inactive() {
        let now = Utc::now();
        assert!(!booster(BoosterKind::Click, 0, now).is_active(now));
        assert!(booster(BoosterKind::Click, 1, now).is_active(now));
    }

    #[test]
    fn boosters_of_filters_kind_and_expiry() {
        let now = Utc::now();
        let player_id = PlayerId::new();
        let state = ResourceState {
            player_id,
            stars: 0,
            energy: 0,
            max_energy: 100,
            click_power: 1,
            passive_income: 0,
            total_clicks: 0,
            level: 1,
            experience: 0,
            critical_chance: Decimal::ZERO,
            critical_multiplier: 1,
            owned_upgrades: BTreeSet::new(),
            unlocked_achievements: BTreeMap::new(),
            inventory: BTreeMap::new(),
            active_boosters: vec![
                booster(BoosterKind::Click, 60, now),
                booster(BoosterKind::Click, -1, now),
                booster(BoosterKind::Passive, 60, now),
            ],
            ad_stats: AdStats::new(now),
            daily: DailyRewardState::default(),
            referrals: BTreeSet::new(),
            referred_by: None,
            statistics: Statistics::default(),
            banned: false,
            ledger_sequence: 0,
            created_at: now,
            last_active_at: now,
            last_save: now,
            version: 0,
        };
        assert_eq!(state.boosters_of(BoosterKind::Click, now).count(), 1);
        assert!(state.has_active_booster(BoosterKind::Passive, now));
        assert_eq!(state.inventory_count(&ItemId::from("artifact_star")), 0);
    }
}
