//! Data layer for the Starclick economy.
//!
//! The service talks to storage only through two contracts defined in
//! [`gateway`]:
//!
//! - [`PersistenceGateway`] loads a player's snapshot and saves it back
//!   conditionally on the version it was loaded at.
//! - [`LedgerRecorder`] appends ledger entries idempotently and serves
//!   ledger pages.
//!
//! Both are implemented twice: over `PostgreSQL` for production and in
//! memory for tests and the replay tool.
//!
//! # Architecture (transactional outbox)
//!
//! ```text
//! Command
//!     |
//!     +-- save(state, entries, expected_version) --> player_state (one row)
//!     |                                                 |-- state JSONB
//!     |                                                 +-- pending_ledger JSONB
//!     |
//!     +-- append(entries) --------------------------> ledger (append-only)
//! ```
//!
//! # Modules
//!
//! - [`gateway`] -- Storage traits and [`PlayerSnapshot`]
//! - [`memory`] -- [`MemoryStore`], the in-process implementation
//! - [`postgres`] -- `PostgreSQL` connection pool and configuration
//! - [`player_store`] -- Conditional snapshot saves in `player_state`
//! - [`ledger_store`] -- Batch ledger insertion and paging
//! - [`error`] -- Shared error types

pub mod error;
pub mod gateway;
pub mod ledger_store;
pub mod memory;
pub mod player_store;
pub mod postgres;

// Re-export primary types for convenience.
pub use error::{DbError, GatewayError};
pub use gateway::{LedgerRecorder, PersistenceGateway, PlayerSnapshot};
pub use ledger_store::{LedgerRow, PgLedgerStore};
pub use memory::MemoryStore;
pub use player_store::{PgPlayerStore, PlayerStateRow};
pub use postgres::{PostgresConfig, PostgresPool};
