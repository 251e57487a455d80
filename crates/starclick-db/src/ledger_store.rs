//! Ledger persistence in the append-only `ledger` table.
//!
//! Entries are inserted in batches with a single multi-row `UNNEST` per
//! chunk, each chunk in its own transaction. The `(player_id, sequence)`
//! unique key makes appends idempotent: re-flushing an outbox that already
//! reached the table inserts nothing.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use starclick_types::{
    CorrelationId, LedgerEntry, LedgerEntryId, LedgerEntryType, LedgerQuery, PlayerId,
};

use crate::error::{DbError, GatewayError};
use crate::gateway::LedgerRecorder;
use crate::postgres::PostgresPool;

/// Default batch size for ledger inserts.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Operations on the `ledger` table.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    batch_size: usize,
}

impl PgLedgerStore {
    /// Create a store sharing `pool`'s connections.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the batch size for inserts. Zero is treated as one.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = if size == 0 { 1 } else { size };
        self
    }

    async fn insert_chunk(&self, chunk: &[LedgerEntry]) -> Result<u64, DbError> {
        let len = chunk.len();
        let mut ids = Vec::with_capacity(len);
        let mut player_ids = Vec::with_capacity(len);
        let mut sequences = Vec::with_capacity(len);
        let mut entry_types = Vec::with_capacity(len);
        let mut amounts = Vec::with_capacity(len);
        let mut balances = Vec::with_capacity(len);
        let mut reasons = Vec::with_capacity(len);
        let mut references: Vec<Option<String>> = Vec::with_capacity(len);
        let mut correlations = Vec::with_capacity(len);
        let mut timestamps = Vec::with_capacity(len);

        for entry in chunk {
            ids.push(entry.id.into_inner());
            player_ids.push(entry.player_id.into_inner());
            sequences.push(to_bigint(entry.sequence, "sequence")?);
            entry_types.push(entry.entry_type.as_str().to_owned());
            amounts.push(entry.amount);
            balances.push(to_bigint(entry.resulting_balance, "resulting_balance")?);
            reasons.push(entry.reason.clone());
            references.push(entry.reference.clone());
            correlations.push(entry.correlation_id.into_inner());
            timestamps.push(entry.timestamp);
        }

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"INSERT INTO ledger (id, player_id, sequence, entry_type, amount, resulting_balance, reason, reference, correlation_id, created_at)
              SELECT * FROM UNNEST($1::UUID[], $2::UUID[], $3::BIGINT[], $4::ledger_entry_type[], $5::BIGINT[], $6::BIGINT[], $7::TEXT[], $8::TEXT[], $9::UUID[], $10::TIMESTAMPTZ[])
              ON CONFLICT (player_id, sequence) DO NOTHING",
        )
        .bind(&ids)
        .bind(&player_ids)
        .bind(&sequences)
        .bind(&entry_types)
        .bind(&amounts)
        .bind(&balances)
        .bind(&reasons)
        .bind(&references)
        .bind(&correlations)
        .bind(&timestamps)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn fetch(
        &self,
        player_id: PlayerId,
        query: Option<&LedgerQuery>,
    ) -> Result<Vec<LedgerEntry>, DbError> {
        let rows = match query {
            None => {
                sqlx::query_as::<_, LedgerRow>(
                    r"SELECT id, player_id, sequence, entry_type::TEXT AS entry_type, amount, resulting_balance, reason, reference, correlation_id, created_at
                      FROM ledger
                      WHERE player_id = $1
                      ORDER BY sequence",
                )
                .bind(player_id.into_inner())
                .fetch_all(&self.pool)
                .await?
            }
            Some(query) => {
                let offset = to_bigint(query.offset, "offset")?;
                sqlx::query_as::<_, LedgerRow>(
                    r"SELECT id, player_id, sequence, entry_type::TEXT AS entry_type, amount, resulting_balance, reason, reference, correlation_id, created_at
                      FROM ledger
                      WHERE player_id = $1
                        AND ($2::TEXT IS NULL OR entry_type::TEXT = $2)
                      ORDER BY sequence DESC
                      OFFSET $3
                      LIMIT $4",
                )
                .bind(player_id.into_inner())
                .bind(query.entry_type.map(LedgerEntryType::as_str))
                .bind(offset)
                .bind(i64::from(query.effective_limit()))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(LedgerRow::into_entry).collect()
    }
}

impl LedgerRecorder for PgLedgerStore {
    async fn append(&self, entries: &[LedgerEntry]) -> Result<usize, GatewayError> {
        let mut inserted: u64 = 0;
        for chunk in entries.chunks(self.batch_size) {
            inserted = inserted.saturating_add(self.insert_chunk(chunk).await?);
        }
        tracing::debug!(
            count = entries.len(),
            inserted,
            "Inserted ledger entries (batch UNNEST)"
        );
        Ok(usize::try_from(inserted).unwrap_or(usize::MAX))
    }

    async fn page(
        &self,
        player_id: PlayerId,
        query: &LedgerQuery,
    ) -> Result<Vec<LedgerEntry>, GatewayError> {
        self.fetch(player_id, Some(query))
            .await
            .map_err(GatewayError::from)
    }

    async fn entries(&self, player_id: PlayerId) -> Result<Vec<LedgerEntry>, GatewayError> {
        self.fetch(player_id, None)
            .await
            .map_err(GatewayError::from)
    }
}

/// A row from the `ledger` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerRow {
    /// Ledger entry UUID.
    pub id: Uuid,
    /// Owning player.
    pub player_id: Uuid,
    /// Position in the player's ledger, from 1.
    pub sequence: i64,
    /// Entry type as a string (cast from the `PostgreSQL` enum).
    pub entry_type: String,
    /// Signed star amount.
    pub amount: i64,
    /// Balance after this entry.
    pub resulting_balance: i64,
    /// Human-readable reason.
    pub reason: String,
    /// Item, achievement or ad type the entry refers to.
    pub reference: Option<String>,
    /// Request that produced the entry.
    pub correlation_id: Uuid,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
}

impl LedgerRow {
    /// Decode the row into a [`LedgerEntry`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Corrupt`] for an unknown entry type or a negative
    /// sequence or balance.
    pub fn into_entry(self) -> Result<LedgerEntry, DbError> {
        let entry_type = LedgerEntryType::from_db(&self.entry_type).ok_or_else(|| {
            DbError::Corrupt(format!("unknown ledger entry type {}", self.entry_type))
        })?;
        Ok(LedgerEntry {
            id: LedgerEntryId::from(self.id),
            player_id: PlayerId::from(self.player_id),
            sequence: from_bigint(self.sequence, "sequence")?,
            entry_type,
            amount: self.amount,
            resulting_balance: from_bigint(self.resulting_balance, "resulting_balance")?,
            reason: self.reason,
            reference: self.reference,
            correlation_id: CorrelationId::from(self.correlation_id),
            timestamp: self.created_at,
        })
    }
}

fn to_bigint(value: u64, column: &'static str) -> Result<i64, DbError> {
    i64::try_from(value)
        .ok()
        .ok_or_else(|| DbError::Corrupt(format!("{column} {value} exceeds BIGINT")))
}

fn from_bigint(value: i64, column: &'static str) -> Result<u64, DbError> {
    u64::try_from(value)
        .ok()
        .ok_or_else(|| DbError::Corrupt(format!("negative {column} {value}")))
}
