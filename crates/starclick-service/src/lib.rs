//! Command execution service for the Starclick economy.
//!
//! [`EconomyService`] is the surface the game server calls. It wraps the
//! pure [`EconomyEngine`](starclick_core::EconomyEngine) with everything a
//! shared, persisted economy needs:
//!
//! - **Single writer per player** via the [`ConcurrencyGuard`]. Commands for
//!   different players run fully in parallel.
//! - **Optimistic concurrency** on the stored snapshot, with bounded
//!   reload-and-retry on a version conflict.
//! - **Command deadlines** covering time spent queued for the player's lock.
//! - **Transactional outbox**: ledger entries are saved with the state and
//!   then appended to the ledger; a failed append is retried before the
//!   player's next command.
//!
//! # Modules
//!
//! - [`guard`] -- [`ConcurrencyGuard`] and [`PlayerLease`]
//! - [`service`] -- [`EconomyService`]
//! - [`error`] -- [`ServiceError`] with stable machine codes

pub mod error;
pub mod guard;
pub mod service;

pub use error::ServiceError;
pub use guard::{ConcurrencyGuard, PlayerLease};
pub use service::EconomyService;
