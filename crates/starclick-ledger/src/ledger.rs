//! A single player's ledger: an append-only chain of balance changes.
//!
//! The [`PlayerLedger`] is the in-memory representation of one player's
//! ledger. It accepts only entries that extend the chain, so a ledger
//! built through [`PlayerLedger::append`] is always internally consistent.
//!
//! # Design
//!
//! - **Append-only**: entries are never modified or deleted.
//! - **Chained**: each entry's balance follows from the previous one.
//! - **Idempotent replays**: re-appending an identical entry is a no-op, so
//!   an outbox can be flushed more than once.

use starclick_types::{BalanceSummary, LedgerEntry, LedgerQuery, PlayerId};

use crate::LedgerError;
use crate::reconciliation::{ReconciliationResult, reconcile};

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The ledger of one player.
#[derive(Debug, Clone)]
pub struct PlayerLedger {
    player_id: PlayerId,
    /// All entries, in sequence order.
    entries: Vec<LedgerEntry>,
}

/// What [`PlayerLedger::append`] did with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry extended the chain.
    Appended,
    /// An identical entry was already present.
    AlreadyPresent,
}

impl PlayerLedger {
    /// Create an empty ledger for `player_id`.
    pub const fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            entries: Vec::new(),
        }
    }

    /// The owning player.
    pub const fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Return the number of entries in the ledger.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return whether the ledger has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in sequence order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Sequence of the last entry, or 0 when empty.
    pub fn last_sequence(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.sequence)
    }

    /// Balance after the last entry, or 0 when empty.
    pub fn balance(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.resulting_balance)
    }

    /// Append an entry that extends the chain.
    ///
    /// An entry whose sequence is already present is accepted only if it
    /// is identical to the stored one; it is then reported as
    /// [`AppendOutcome::AlreadyPresent`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ForeignEntry`] for another player's entry,
    /// [`LedgerError::OutOfSequence`] for gaps or conflicting duplicates,
    /// and [`LedgerError::BalanceMismatch`] if the resulting balance does
    /// not follow from the previous entry.
    pub fn append(&mut self, entry: LedgerEntry) -> Result<AppendOutcome, LedgerError> {
        if entry.player_id != self.player_id {
            return Err(LedgerError::ForeignEntry {
                expected: self.player_id,
                found: entry.player_id,
            });
        }

        let last = self.last_sequence();
        if entry.sequence <= last {
            let existing = entry
                .sequence
                .checked_sub(1)
                .and_then(|idx| usize::try_from(idx).ok())
                .and_then(|idx| self.entries.get(idx));
            return match existing {
                Some(stored) if *stored == entry => Ok(AppendOutcome::AlreadyPresent),
                _ => Err(LedgerError::OutOfSequence {
                    expected_previous: last,
                    found: entry.sequence,
                }),
            };
        }
        if Some(entry.sequence) != last.checked_add(1) {
            return Err(LedgerError::OutOfSequence {
                expected_previous: last,
                found: entry.sequence,
            });
        }

        let computed = i128::from(self.balance())
            .checked_add(i128::from(entry.amount))
            .ok_or(LedgerError::Overflow)?;
        if computed != i128::from(entry.resulting_balance) {
            return Err(LedgerError::BalanceMismatch {
                sequence: entry.sequence,
                computed,
                recorded: entry.resulting_balance,
            });
        }

        self.entries.push(entry);
        Ok(AppendOutcome::Appended)
    }

    /// Append every entry of `batch` in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Propagates the first [`LedgerError`] from [`PlayerLedger::append`].
    /// Entries before the failing one stay appended.
    pub fn append_all(&mut self, batch: &[LedgerEntry]) -> Result<usize, LedgerError> {
        let mut appended: usize = 0;
        for entry in batch {
            if self.append(entry.clone())? == AppendOutcome::Appended {
                appended = appended.saturating_add(1);
            }
        }
        Ok(appended)
    }

    /// One page of entries, newest first, optionally filtered by type.
    pub fn page(&self, query: &LedgerQuery) -> Vec<LedgerEntry> {
        let skip = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let take = usize::try_from(query.effective_limit()).unwrap_or(usize::MAX);
        self.entries
            .iter()
            .rev()
            .filter(|e| query.entry_type.is_none_or(|t| e.entry_type == t))
            .skip(skip)
            .take(take)
            .cloned()
            .collect()
    }

    /// Total income, total expenses and current balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if a total exceeds `u64`.
    pub fn summary(&self) -> Result<BalanceSummary, LedgerError> {
        summarize(&self.entries)
    }

    /// Reconcile this ledger against a player's state counters.
    pub fn reconcile(&self, state_stars: u64, state_sequence: u64) -> ReconciliationResult {
        reconcile(self.player_id, state_stars, state_sequence, &self.entries)
    }
}

/// Summarize income and expenses over `entries`.
///
/// # Errors
///
/// Returns [`LedgerError::Overflow`] if a total exceeds `u64`.
pub fn summarize(entries: &[LedgerEntry]) -> Result<BalanceSummary, LedgerError> {
    let mut summary = BalanceSummary::default();
    for entry in entries {
        let magnitude = entry.amount.unsigned_abs();
        if entry.amount > 0 {
            summary.total_income = summary
                .total_income
                .checked_add(magnitude)
                .ok_or(LedgerError::Overflow)?;
        } else {
            summary.total_expenses = summary
                .total_expenses
                .checked_add(magnitude)
                .ok_or(LedgerError::Overflow)?;
        }
        summary.entry_count = summary.entry_count.saturating_add(1);
        summary.current_balance = entry.resulting_balance;
    }
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;

    use starclick_types::{CorrelationId, LedgerEntryType};

    use super::*;
    use crate::EntryBuilder;

    fn entry(
        player: PlayerId,
        sequence: u64,
        entry_type: LedgerEntryType,
        amount: i64,
        balance: u64,
    ) -> LedgerEntry {
        EntryBuilder::new(player, entry_type)
            .sequence(sequence)
            .amount(amount)
            .resulting_balance(balance)
            .reason(entry_type.as_str().to_owned())
            .correlation(CorrelationId::new())
            .at(Utc::now())
            .build()
            .unwrap()
    }

    fn sample_ledger() -> PlayerLedger {
        let player = PlayerId::new();
        let mut ledger = PlayerLedger::new(player);
        ledger
            .append(entry(player, 1, LedgerEntryType::Opening, 1000, 1000))
            .unwrap();
        ledger
            .append(entry(player, 2, LedgerEntryType::Click, 3, 1003))
            .unwrap();
        ledger
            .append(entry(player, 3, LedgerEntryType::Purchase, -100, 903))
            .unwrap();
        ledger
            .append(entry(player, 4, LedgerEntryType::Click, 1, 904))
            .unwrap();
        ledger
    }

    #[test]
    fn appends_track_balance() {
        let ledger = sample_ledger();
        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.balance(), 904);
        assert_eq!(ledger.last_sequence(), 4);
    }

    #[test]
    fn gap_is_rejected() {
        let mut ledger = sample_ledger();
        let player = ledger.player_id();
        let err = ledger
            .append(entry(player, 6, LedgerEntryType::Click, 1, 905))
            .err();
        assert_eq!(
            err,
            Some(LedgerError::OutOfSequence {
                expected_previous: 4,
                found: 6
            })
        );
    }

    #[test]
    fn wrong_resulting_balance_is_rejected() {
        let mut ledger = sample_ledger();
        let player = ledger.player_id();
        let err = ledger
            .append(entry(player, 5, LedgerEntryType::Click, 1, 999))
            .err();
        assert!(matches!(err, Some(LedgerError::BalanceMismatch { sequence: 5, .. })));
    }

    #[test]
    fn identical_replay_is_idempotent() {
        let mut ledger = sample_ledger();
        let again = ledger.entries()[1].clone();
        assert_eq!(ledger.append(again).unwrap(), AppendOutcome::AlreadyPresent);
        assert_eq!(ledger.len(), 4);
    }

    #[test]
    fn conflicting_replay_is_rejected() {
        let mut ledger = sample_ledger();
        let player = ledger.player_id();
        let err = ledger
            .append(entry(player, 2, LedgerEntryType::Click, 3, 1003))
            .err();
        assert!(matches!(err, Some(LedgerError::OutOfSequence { found: 2, .. })));
    }

    #[test]
    fn foreign_entry_is_rejected() {
        let mut ledger = sample_ledger();
        let err = ledger
            .append(entry(PlayerId::new(), 5, LedgerEntryType::Click, 1, 905))
            .err();
        assert!(matches!(err, Some(LedgerError::ForeignEntry { .. })));
    }

    #[test]
    fn page_is_newest_first_and_filtered() {
        let ledger = sample_ledger();
        let page = ledger.page(&LedgerQuery::first(2));
        let sequences: Vec<u64> = page.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![4, 3]);

        let clicks = ledger.page(&LedgerQuery::first(10).of_type(LedgerEntryType::Click));
        let sequences: Vec<u64> = clicks.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![4, 2]);

        let beyond = ledger.page(&LedgerQuery {
            offset: 10,
            limit: 10,
            entry_type: None,
        });
        assert!(beyond.is_empty());
    }

    #[test]
    fn summary_splits_income_and_expenses() {
        let summary = sample_ledger().summary().unwrap();
        assert_eq!(summary.total_income, 1004);
        assert_eq!(summary.total_expenses, 100);
        assert_eq!(summary.current_balance, 904);
        assert_eq!(summary.entry_count, 4);
    }
}
