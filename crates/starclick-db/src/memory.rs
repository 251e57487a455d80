//! In-memory storage for tests and the replay tool.
//!
//! [`MemoryStore`] implements both [`PersistenceGateway`] and
//! [`LedgerRecorder`] with the same semantics as the `PostgreSQL` stores:
//! conditional saves keyed on version, and idempotent ledger appends. Each
//! player's ledger is a [`PlayerLedger`], so a batch that breaks the chain
//! is rejected rather than stored. Clones share the same data.

use std::collections::HashMap;
use std::sync::Arc;

use starclick_ledger::{AppendOutcome, PlayerLedger};
use starclick_types::{LedgerEntry, LedgerQuery, PlayerId, ResourceState};
use tokio::sync::RwLock;

use crate::error::{DbError, GatewayError};
use crate::gateway::{LedgerRecorder, PersistenceGateway, PlayerSnapshot};

#[derive(Debug, Default)]
struct Inner {
    players: RwLock<HashMap<PlayerId, PlayerSnapshot>>,
    ledgers: RwLock<HashMap<PlayerId, PlayerLedger>>,
}

/// Process-local player and ledger storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored players.
    pub async fn player_count(&self) -> usize {
        self.inner.players.read().await.len()
    }

    /// Every stored player id, in no particular order.
    pub async fn player_ids(&self) -> Vec<PlayerId> {
        self.inner.players.read().await.keys().copied().collect()
    }
}

impl PersistenceGateway for MemoryStore {
    async fn load(&self, player_id: PlayerId) -> Result<Option<PlayerSnapshot>, GatewayError> {
        Ok(self.inner.players.read().await.get(&player_id).cloned())
    }

    async fn save(
        &self,
        state: &ResourceState,
        pending: &[LedgerEntry],
        expected_version: u64,
    ) -> Result<u64, GatewayError> {
        let player_id = state.player_id;
        let mut players = self.inner.players.write().await;
        let actual = players.get(&player_id).map_or(0, |s| s.version);
        if actual != expected_version {
            return Err(GatewayError::VersionConflict {
                player_id,
                expected: expected_version,
                actual,
            });
        }

        let version = actual.checked_add(1).ok_or_else(|| {
            DbError::Corrupt(format!("version counter exhausted for player {player_id}"))
        })?;
        let mut stored = state.clone();
        stored.version = version;
        players.insert(
            player_id,
            PlayerSnapshot {
                state: stored,
                version,
                pending_ledger: pending.to_vec(),
            },
        );

        tracing::debug!(%player_id, version, pending = pending.len(), "Saved player snapshot");
        Ok(version)
    }
}

impl LedgerRecorder for MemoryStore {
    /// Entries before a rejected one stay appended.
    async fn append(&self, entries: &[LedgerEntry]) -> Result<usize, GatewayError> {
        let mut ledgers = self.inner.ledgers.write().await;
        let mut appended: usize = 0;
        for entry in entries {
            let ledger = ledgers
                .entry(entry.player_id)
                .or_insert_with(|| PlayerLedger::new(entry.player_id));
            if ledger.append(entry.clone())? == AppendOutcome::Appended {
                appended = appended.saturating_add(1);
            }
        }
        tracing::debug!(count = entries.len(), appended, "Appended ledger entries");
        Ok(appended)
    }

    async fn page(
        &self,
        player_id: PlayerId,
        query: &LedgerQuery,
    ) -> Result<Vec<LedgerEntry>, GatewayError> {
        Ok(self
            .inner
            .ledgers
            .read()
            .await
            .get(&player_id)
            .map(|ledger| ledger.page(query))
            .unwrap_or_default())
    }

    async fn entries(&self, player_id: PlayerId) -> Result<Vec<LedgerEntry>, GatewayError> {
        Ok(self
            .inner
            .ledgers
            .read()
            .await
            .get(&player_id)
            .map(|ledger| ledger.entries().to_vec())
            .unwrap_or_default())
    }
}
