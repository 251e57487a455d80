//! Error types for the data layer.
//!
//! Backend failures are reported as [`DbError`], which wraps the underlying
//! [`sqlx`] and [`serde_json`] errors. The storage contracts in
//! [`crate::gateway`] return [`GatewayError`], which adds the outcomes a
//! caller is expected to act on: a lost optimistic-concurrency race and a
//! ledger batch that does not continue the stored chain.

use starclick_ledger::LedgerError;
use starclick_types::PlayerId;

/// Errors that can occur in a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value cannot be mapped back onto the domain types.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors returned by [`PersistenceGateway`](crate::PersistenceGateway) and
/// [`LedgerRecorder`](crate::LedgerRecorder).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The stored snapshot moved on since it was loaded.
    ///
    /// `expected == 0` means the caller tried to create a player that
    /// already exists; `actual == 0` means the player does not exist.
    #[error("version conflict for player {player_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// The player whose snapshot was written.
        player_id: PlayerId,
        /// Version the caller loaded.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// An appended entry does not continue the stored ledger chain.
    #[error("ledger append rejected: {0}")]
    Ledger(#[from] LedgerError),

    /// The storage backend failed.
    #[error(transparent)]
    Backend(#[from] DbError),
}

impl GatewayError {
    /// Whether the caller should reload and retry the command.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
