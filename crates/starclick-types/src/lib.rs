//! Shared type definitions for the Starclick player economy.
//!
//! This crate is the single source of truth for all types used across the
//! Starclick workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the game client.
//!
//! # Modules
//!
//! - [`ids`] -- Player/ledger UUID wrappers and catalog keys
//! - [`enums`] -- Ledger entry types, booster kinds, ad types, catalog enums
//! - [`structs`] -- [`ResourceState`] and [`LedgerEntry`]
//! - [`outcomes`] -- Command results, events and ledger queries
//! - [`commands`] -- The explicit [`Command`] objects

pub mod commands;
pub mod enums;
pub mod ids;
pub mod outcomes;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use commands::Command;
pub use enums::{AchievementFamily, AdType, BoosterKind, ItemCategory, LedgerEntryType, Stat};
pub use ids::{AchievementId, CorrelationId, ItemId, LedgerEntryId, PlayerId};
pub use outcomes::{
    AdResult, AdjustmentResult, ArtifactToggleResult, ClickResult, CommandOutcome,
    DEFAULT_LEDGER_PAGE, DailyResult, EconomyEvent, ItemUseResult, LedgerQuery, MAX_LEDGER_PAGE,
    OfflineResult, PurchaseResult, ReevaluationResult, ReferralResult,
};
pub use structs::{
    ActiveBooster, AdStats, BalanceSummary, DailyClaim, DailyRewardState, InventorySlot,
    LedgerEntry, ResourceState, Statistics, UnlockedAchievement,
};
