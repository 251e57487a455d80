//! Player snapshot persistence in the `player_state` table.
//!
//! The resource state and its outbox are stored as `JSONB` next to a
//! `BIGINT` version. Saves are a single conditional statement: an insert
//! that does nothing on an existing key for new players, and an update
//! guarded by `version = $expected` otherwise. No returned row means the
//! caller lost a race and gets [`GatewayError::VersionConflict`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use starclick_types::{LedgerEntry, PlayerId, ResourceState};

use crate::error::{DbError, GatewayError};
use crate::gateway::{PersistenceGateway, PlayerSnapshot};
use crate::postgres::PostgresPool;

/// Operations on the `player_state` table.
#[derive(Debug, Clone)]
pub struct PgPlayerStore {
    pool: PgPool,
}

impl PgPlayerStore {
    /// Create a store sharing `pool`'s connections.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    async fn current_version(&self, player_id: PlayerId) -> Result<u64, DbError> {
        let version: Option<i64> =
            sqlx::query_scalar(r"SELECT version FROM player_state WHERE player_id = $1")
                .bind(player_id.into_inner())
                .fetch_optional(&self.pool)
                .await?;
        version.map_or(Ok(0), |v| to_version(player_id, v))
    }
}

impl PersistenceGateway for PgPlayerStore {
    async fn load(&self, player_id: PlayerId) -> Result<Option<PlayerSnapshot>, GatewayError> {
        let row = sqlx::query_as::<_, PlayerStateRow>(
            r"SELECT player_id, version, state, pending_ledger, updated_at
              FROM player_state
              WHERE player_id = $1",
        )
        .bind(player_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        row.map(PlayerStateRow::into_snapshot)
            .transpose()
            .map_err(GatewayError::from)
    }

    async fn save(
        &self,
        state: &ResourceState,
        pending: &[LedgerEntry],
        expected_version: u64,
    ) -> Result<u64, GatewayError> {
        let player_id = state.player_id;
        let state_json = serde_json::to_value(state).map_err(DbError::from)?;
        let pending_json = serde_json::to_value(pending).map_err(DbError::from)?;

        let written: Option<i64> = if expected_version == 0 {
            sqlx::query_scalar(
                r"INSERT INTO player_state (player_id, version, state, pending_ledger, updated_at)
                  VALUES ($1, 1, $2, $3, NOW())
                  ON CONFLICT (player_id) DO NOTHING
                  RETURNING version",
            )
            .bind(player_id.into_inner())
            .bind(&state_json)
            .bind(&pending_json)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
        } else {
            let expected = i64::try_from(expected_version).ok().ok_or_else(|| {
                DbError::Corrupt(format!("version {expected_version} out of range"))
            })?;
            sqlx::query_scalar(
                r"UPDATE player_state
                  SET version = version + 1,
                      state = $2,
                      pending_ledger = $3,
                      updated_at = NOW()
                  WHERE player_id = $1 AND version = $4
                  RETURNING version",
            )
            .bind(player_id.into_inner())
            .bind(&state_json)
            .bind(&pending_json)
            .bind(expected)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
        };

        if let Some(version) = written {
            let version = to_version(player_id, version)?;
            tracing::debug!(%player_id, version, pending = pending.len(), "Saved player snapshot");
            return Ok(version);
        }

        let actual = self.current_version(player_id).await?;
        tracing::warn!(
            %player_id,
            expected = expected_version,
            actual,
            "Player snapshot version conflict"
        );
        Err(GatewayError::VersionConflict {
            player_id,
            expected: expected_version,
            actual,
        })
    }
}

/// A row from the `player_state` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlayerStateRow {
    /// Player UUID.
    pub player_id: Uuid,
    /// Optimistic concurrency version.
    pub version: i64,
    /// Serialized [`ResourceState`].
    pub state: serde_json::Value,
    /// Serialized outbox of [`LedgerEntry`] values.
    pub pending_ledger: serde_json::Value,
    /// Time of the last write.
    pub updated_at: DateTime<Utc>,
}

impl PlayerStateRow {
    /// Decode the row into a [`PlayerSnapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if a `JSONB` column does not
    /// decode, and [`DbError::Corrupt`] if the stored state names another
    /// player or the version is negative.
    pub fn into_snapshot(self) -> Result<PlayerSnapshot, DbError> {
        let player_id = PlayerId::from(self.player_id);
        let version = to_version(player_id, self.version)?;
        let mut state: ResourceState = serde_json::from_value(self.state)?;
        if state.player_id != player_id {
            return Err(DbError::Corrupt(format!(
                "row {player_id} holds state for {}",
                state.player_id
            )));
        }
        state.version = version;
        let pending_ledger: Vec<LedgerEntry> = serde_json::from_value(self.pending_ledger)?;
        Ok(PlayerSnapshot {
            state,
            version,
            pending_ledger,
        })
    }
}

fn to_version(player_id: PlayerId, version: i64) -> Result<u64, DbError> {
    u64::try_from(version).ok().ok_or_else(|| {
        DbError::Corrupt(format!("negative version {version} for player {player_id}"))
    })
}
