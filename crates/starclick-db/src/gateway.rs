//! Storage contracts consumed by the economy service.
//!
//! A player is persisted as one [`PlayerSnapshot`]: the full resource state,
//! a monotonically increasing version, and the ledger entries produced by
//! the command that wrote it (the outbox). Writes are conditional on the
//! version the caller loaded, so two writers racing on the same player
//! cannot both succeed.
//!
//! Ledger entries are additionally appended to a [`LedgerRecorder`], which
//! must accept a batch it has already stored so that an outbox can be
//! re-flushed after a crash without duplicating entries.

use std::future::Future;

use starclick_types::{LedgerEntry, LedgerQuery, PlayerId, ResourceState};

use crate::error::GatewayError;

/// One player's persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    /// The resource state. Its `version` field mirrors [`Self::version`].
    pub state: ResourceState,
    /// Version for optimistic concurrency; the first write stores 1.
    pub version: u64,
    /// Ledger entries written with this snapshot that may not have reached
    /// the [`LedgerRecorder`] yet.
    pub pending_ledger: Vec<LedgerEntry>,
}

/// Loads and conditionally saves player snapshots.
pub trait PersistenceGateway: Send + Sync {
    /// Load a player's snapshot, or `None` if the player does not exist.
    fn load(
        &self,
        player_id: PlayerId,
    ) -> impl Future<Output = Result<Option<PlayerSnapshot>, GatewayError>> + Send;

    /// Store `state` and its outbox if the stored version still equals
    /// `expected_version`, returning the new version.
    ///
    /// An `expected_version` of 0 creates the player. The outbox replaces
    /// whatever was pending before.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::VersionConflict`] when the stored version
    /// differs from `expected_version`.
    fn save(
        &self,
        state: &ResourceState,
        pending: &[LedgerEntry],
        expected_version: u64,
    ) -> impl Future<Output = Result<u64, GatewayError>> + Send;
}

/// Durable, append-only storage for ledger entries.
pub trait LedgerRecorder: Send + Sync {
    /// Append `entries`, skipping any already stored under the same
    /// `(player_id, sequence)`. Returns how many were newly stored.
    fn append(
        &self,
        entries: &[LedgerEntry],
    ) -> impl Future<Output = Result<usize, GatewayError>> + Send;

    /// One page of a player's entries, newest first.
    fn page(
        &self,
        player_id: PlayerId,
        query: &LedgerQuery,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, GatewayError>> + Send;

    /// A player's full ledger in sequence order.
    fn entries(
        &self,
        player_id: PlayerId,
    ) -> impl Future<Output = Result<Vec<LedgerEntry>, GatewayError>> + Send;
}
