//! Enumeration types shared across the economy.
//!
//! Enums that cross the client boundary or land in the ledger table
//! serialize in `snake_case`, matching the values stored in `PostgreSQL`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Ledger entry types
// ---------------------------------------------------------------------------

/// The category of a balance-changing event in a player's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LedgerEntryType {
    /// Starting balance granted at registration.
    Opening,
    /// Stars earned from a single tap.
    Click,
    /// Idle income accrued while the player was away.
    Passive,
    /// Reward for a completed ad view.
    AdReward,
    /// Stars spent on a catalog item.
    Purchase,
    /// Stars contained in a purchased bundle.
    BundleGrant,
    /// One-time achievement reward.
    Achievement,
    /// Aggregated reward for one or more level-ups.
    LevelUp,
    /// Daily login reward.
    DailyReward,
    /// Manual credit issued by an operator.
    AdminGrant,
    /// Manual debit issued by an operator.
    AdminRemove,
    /// Reward for bringing a new player into the game.
    Referral,
}

impl LedgerEntryType {
    /// Every entry type, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Opening,
        Self::Click,
        Self::Passive,
        Self::AdReward,
        Self::Purchase,
        Self::BundleGrant,
        Self::Achievement,
        Self::LevelUp,
        Self::DailyReward,
        Self::AdminGrant,
        Self::AdminRemove,
        Self::Referral,
    ];

    /// Whether entries of this type add stars (positive amount).
    ///
    /// Debit types (`Purchase`, `AdminRemove`) always carry a negative
    /// amount; every other type carries a positive one.
    pub const fn is_credit(self) -> bool {
        !matches!(self, Self::Purchase | Self::AdminRemove)
    }

    /// Stable database and wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Click => "click",
            Self::Passive => "passive",
            Self::AdReward => "ad_reward",
            Self::Purchase => "purchase",
            Self::BundleGrant => "bundle_grant",
            Self::Achievement => "achievement",
            Self::LevelUp => "level_up",
            Self::DailyReward => "daily_reward",
            Self::AdminGrant => "admin_grant",
            Self::AdminRemove => "admin_remove",
            Self::Referral => "referral",
        }
    }

    /// Parse a database name produced by [`LedgerEntryType::as_str`].
    pub fn from_db(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl core::fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Boosters
// ---------------------------------------------------------------------------

/// Which income stream a booster multiplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum BoosterKind {
    /// Multiplies the value of each tap.
    Click,
    /// Multiplies idle income during offline reconciliation.
    Passive,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Broad category of a purchasable catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ItemCategory {
    /// Permanent stat upgrade, owned at most once.
    Upgrade,
    /// Consumable energy refill.
    EnergyPack,
    /// Time-limited income multiplier.
    Booster,
    /// Repeatable permanent stat multiplier kept in the inventory.
    Artifact,
    /// Package of stars, boosters and artifacts.
    Bundle,
}

/// A numeric player stat an item effect can modify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Stat {
    /// Stars per tap before boosters and criticals.
    ClickPower,
    /// Energy capacity.
    MaxEnergy,
    /// Stars per idle second.
    PassiveIncome,
}

/// The predicate family an achievement belongs to.
///
/// Only the family touched by a mutation is re-evaluated after that
/// mutation, so each achievement declares exactly one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AchievementFamily {
    /// Lifetime tap count.
    Clicks,
    /// Current star balance.
    Stars,
    /// Player level.
    Levels,
    /// Number of owned permanent upgrades.
    Upgrades,
    /// Lifetime ad views.
    Ads,
    /// Number of referred players.
    Referrals,
}

impl AchievementFamily {
    /// Every family, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Clicks,
        Self::Stars,
        Self::Levels,
        Self::Upgrades,
        Self::Ads,
        Self::Referrals,
    ];
}

// ---------------------------------------------------------------------------
// Ads
// ---------------------------------------------------------------------------

/// Ad placement type reported by the ad-validation collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AdType {
    /// Full-screen video watched to completion.
    RewardedVideo,
    /// Interstitial shown between screens.
    Interstitial,
    /// Banner impression.
    Banner,
    /// Completed offerwall task.
    Offerwall,
}

impl AdType {
    /// Stable wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RewardedVideo => "rewarded_video",
            Self::Interstitial => "interstitial",
            Self::Banner => "banner",
            Self::Offerwall => "offerwall",
        }
    }
}
