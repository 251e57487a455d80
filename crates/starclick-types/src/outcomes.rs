//! Result payloads and events returned by economy commands.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AdType, BoosterKind, ItemCategory, LedgerEntryType};
use crate::ids::{AchievementId, ItemId, PlayerId};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A notable side effect of a command, surfaced to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EconomyEvent {
    /// One or more levels were gained.
    LevelUp {
        /// Level before the cascade.
        from: u32,
        /// Level after the cascade.
        to: u32,
        /// Stars granted for the whole cascade.
        reward: u64,
    },
    /// An achievement unlocked for the first time.
    AchievementUnlocked {
        /// The achievement.
        achievement_id: AchievementId,
        /// Stars granted.
        reward: u64,
    },
    /// A booster started running.
    BoosterActivated {
        /// The booster item.
        booster_id: ItemId,
        /// Income stream it multiplies.
        kind: BoosterKind,
        /// When it stops.
        expires_at: DateTime<Utc>,
    },
}

// ---------------------------------------------------------------------------
// Command results
// ---------------------------------------------------------------------------

/// Outcome of a resolved tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClickResult {
    /// Stars earned by the tap.
    pub value: u64,
    /// Whether the critical roll succeeded.
    pub is_critical: bool,
}

/// Outcome of offline-income reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OfflineResult {
    /// Seconds credited after capping.
    pub elapsed_seconds: u64,
    /// Stars credited.
    pub passive_income: u64,
    /// Energy actually restored (after the capacity cap).
    pub energy_recovered: u32,
}

/// Outcome of a catalog purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PurchaseResult {
    /// The purchased item.
    pub item_id: ItemId,
    /// Its category.
    pub category: ItemCategory,
    /// Units bought.
    pub quantity: u32,
    /// Stars spent.
    pub total_cost: u64,
    /// Experience granted by the purchase.
    pub experience_gained: u64,
}

/// Outcome of consuming one stocked item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ItemUseResult {
    /// The consumed item.
    pub item_id: ItemId,
    /// Its category.
    pub category: ItemCategory,
    /// Units left in the inventory.
    pub remaining: u32,
    /// Energy actually restored (zero for boosters).
    pub energy_restored: u32,
}

/// Outcome of equipping or unequipping an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ArtifactToggleResult {
    /// The artifact.
    pub item_id: ItemId,
    /// Whether it is equipped now.
    pub equipped: bool,
    /// Units whose bonus was applied or removed.
    pub count: u32,
}

/// Outcome of a granted ad reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AdResult {
    /// Placement type.
    pub ad_type: AdType,
    /// Stars granted.
    pub reward: u64,
    /// Views granted in the current daily window.
    pub ads_watched_today: u32,
    /// Views still available in the current daily window.
    pub ads_remaining_today: u32,
}

/// Outcome of a daily reward claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DailyResult {
    /// Stars granted.
    pub reward: u64,
    /// Streak after the claim.
    pub streak: u32,
    /// UTC date claimed.
    pub date: NaiveDate,
}

/// Outcome of an operator balance adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AdjustmentResult {
    /// Signed change applied.
    pub amount: i64,
    /// Balance afterwards.
    pub balance: u64,
}

/// Outcome of a recorded referral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ReferralResult {
    /// The newly referred player.
    pub referred: PlayerId,
    /// Stars credited to the referrer.
    pub reward: u64,
    /// Referrer's total referral count.
    pub referral_count: u64,
}

/// Outcome of a full achievement re-scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ReevaluationResult {
    /// Achievements unlocked by this scan.
    pub unlocked: Vec<AchievementId>,
}

/// The result of any command, tagged by kind.
///
/// Used where commands are handled generically, for example when replaying
/// a command script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "result", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CommandOutcome {
    /// The player was created with this opening balance.
    Registered {
        /// Opening balance.
        stars: u64,
    },
    /// A tap was resolved.
    Click(ClickResult),
    /// Idle income was credited.
    Offline(OfflineResult),
    /// An item was bought.
    Purchase(PurchaseResult),
    /// A stocked item was consumed.
    ItemUsed(ItemUseResult),
    /// An artifact was equipped or unequipped.
    ArtifactToggled(ArtifactToggleResult),
    /// An ad reward was granted.
    AdReward(AdResult),
    /// The daily reward was claimed.
    DailyReward(DailyResult),
    /// An operator adjusted the balance.
    Adjustment(AdjustmentResult),
    /// A referral was credited.
    Referral(ReferralResult),
    /// The ban flag changed.
    BanUpdated {
        /// New ban flag.
        banned: bool,
    },
    /// Achievements were re-evaluated.
    Reevaluation(ReevaluationResult),
}

// ---------------------------------------------------------------------------
// Ledger queries
// ---------------------------------------------------------------------------

/// Pagination and filtering for ledger reads. Results are newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LedgerQuery {
    /// Entries to skip.
    #[serde(default)]
    pub offset: u64,
    /// Maximum entries to return.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Restrict to one entry type.
    #[serde(default)]
    pub entry_type: Option<LedgerEntryType>,
}

/// Largest page a single ledger query may return.
pub const MAX_LEDGER_PAGE: u32 = 200;

/// Default ledger page size.
pub const DEFAULT_LEDGER_PAGE: u32 = 50;

const fn default_limit() -> u32 {
    DEFAULT_LEDGER_PAGE
}

impl Default for LedgerQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LEDGER_PAGE,
            entry_type: None,
        }
    }
}

impl LedgerQuery {
    /// First page of at most `limit` entries.
    pub const fn first(limit: u32) -> Self {
        Self {
            offset: 0,
            limit,
            entry_type: None,
        }
    }

    /// Restrict the query to one entry type.
    #[must_use]
    pub const fn of_type(mut self, entry_type: LedgerEntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    /// Page size after applying the upper bound. Zero means the default.
    pub const fn effective_limit(&self) -> u32 {
        if self.limit == 0 {
            DEFAULT_LEDGER_PAGE
        } else if self.limit > MAX_LEDGER_PAGE {
            MAX_LEDGER_PAGE
        } else {
            self.limit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(LedgerQuery::first(0).effective_limit(), DEFAULT_LEDGER_PAGE);
        assert_eq!(LedgerQuery::first(10_000).effective_limit(), MAX_LEDGER_PAGE);
        assert_eq!(LedgerQuery::first(7).effective_limit(), 7);
    }

    #[test]
    fn query_defaults_apply_when_fields_missing() {
        let query: LedgerQuery = serde_json::from_str("{}").unwrap_or_default();
        assert_eq!(query, LedgerQuery::default());
        let filtered: Option<LedgerQuery> =
            serde_json::from_str(r#"{"limit": 5, "entry_type": "click"}"#).ok();
        assert_eq!(
            filtered,
            Some(LedgerQuery::first(5).of_type(LedgerEntryType::Click))
        );
    }

    #[test]
    fn events_are_tagged() {
        let event = EconomyEvent::LevelUp {
            from: 1,
            to: 3,
            reward: 2000,
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["event"], "level_up");
        assert_eq!(json["reward"], 2000);
    }

    #[test]
    fn outcomes_are_tagged_by_kind() {
        let outcome = CommandOutcome::Click(ClickResult {
            value: 12,
            is_critical: true,
        });
        let json = serde_json::to_value(&outcome).unwrap_or_default();
        assert_eq!(json["result"], "click");
        assert_eq!(json["value"], 12);
        assert_eq!(json["is_critical"], true);
    }
}
