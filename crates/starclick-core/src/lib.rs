//! Economy engine, effect catalog and configuration for Starclick.
//!
//! This crate owns every rule that changes a player's resources: taps,
//! offline income, purchases, leveling, achievements, ad and daily rewards,
//! operator adjustments and referrals. The rules are pure functions over
//! [`ResourceState`](starclick_types::ResourceState); persistence and
//! locking live in the service crate.
//!
//! # Modules
//!
//! - [`catalog`] -- Immutable [`EffectCatalog`] of items and achievements.
//! - [`clock`] -- [`TimeSource`] trait, system clock and a manual test clock.
//! - [`config`] -- Configuration loading from `starclick-config.yaml` into
//!   strongly-typed structs.
//! - [`engine`] -- [`EconomyEngine`] command handlers and [`Transition`].
//! - [`error`] -- [`EconomyError`] with stable machine codes.
//! - [`invariants`] -- Post-transition consistency checks.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod invariants;

pub use catalog::{CatalogError, EffectCatalog};
pub use clock::{ManualClock, SystemClock, TimeSource};
pub use config::{ConfigError, EconomyConfig, GuardPolicy, LogFormat};
pub use engine::{CommandContext, EconomyEngine, Transition};
pub use error::{EconomyError, ErrorBody};
