//! Ledger identity verification.
//!
//! The ledger is authoritative: a player's `stars` must equal the balance
//! after their last entry, and every entry's balance must follow from the
//! one before it. For a player P with entries `e[1..=n]`:
//!
//! ```text
//! e[k].sequence == k
//! e[k].resulting_balance == e[k-1].resulting_balance + e[k].amount   (e[0] = 0)
//! e[k].resulting_balance >= 0
//! state.stars == e[n].resulting_balance
//! state.ledger_sequence == n
//! ```
//!
//! Entries produced through the engine satisfy this by construction. The
//! check guards against corrupted storage, lost appends and any code path
//! that mutates `stars` without recording it.

use starclick_types::{LedgerEntry, PlayerId};

use crate::{AnomalyKind, LedgerAnomaly};

/// The result of reconciling one player's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationResult {
    /// State and ledger agree.
    Balanced,
    /// The ledger chain is broken or disagrees with the state.
    Anomaly(LedgerAnomaly),
}

impl ReconciliationResult {
    /// Whether reconciliation succeeded.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Verify that `entries` form an unbroken chain for `player_id`.
///
/// Entries must be in sequence order starting at 1.
pub fn verify_chain(player_id: PlayerId, entries: &[LedgerEntry]) -> ReconciliationResult {
    let mut expected_sequence: u64 = 1;
    let mut running: i128 = 0;

    for entry in entries {
        if entry.player_id != player_id {
            return anomaly(
                player_id,
                Some(entry.sequence),
                AnomalyKind::ForeignEntry,
                format!(
                    "LEDGER_ANOMALY for {player_id}: entry {} belongs to {}",
                    entry.sequence, entry.player_id
                ),
            );
        }
        if entry.sequence != expected_sequence {
            return anomaly(
                player_id,
                Some(entry.sequence),
                AnomalyKind::SequenceGap {
                    expected: expected_sequence,
                    found: entry.sequence,
                },
                format!(
                    "LEDGER_ANOMALY for {player_id}: expected sequence {expected_sequence}, found {}",
                    entry.sequence
                ),
            );
        }

        running = match running.checked_add(i128::from(entry.amount)) {
            Some(v) => v,
            None => return overflow_anomaly(player_id, entry.sequence),
        };
        if running < 0 {
            return anomaly(
                player_id,
                Some(entry.sequence),
                AnomalyKind::NegativeBalance,
                format!(
                    "LEDGER_ANOMALY for {player_id}: balance {running} below zero at entry {}",
                    entry.sequence
                ),
            );
        }
        if running != i128::from(entry.resulting_balance) {
            return anomaly(
                player_id,
                Some(entry.sequence),
                AnomalyKind::BalanceMismatch {
                    computed: running,
                    recorded: entry.resulting_balance,
                },
                format!(
                    "LEDGER_ANOMALY for {player_id}: entry {} records {} but chain gives {running}",
                    entry.sequence, entry.resulting_balance
                ),
            );
        }

        expected_sequence = match expected_sequence.checked_add(1) {
            Some(v) => v,
            None => return overflow_anomaly(player_id, entry.sequence),
        };
    }

    ReconciliationResult::Balanced
}

/// Verify the chain and compare it with the player's state counters.
pub fn reconcile(
    player_id: PlayerId,
    state_stars: u64,
    state_sequence: u64,
    entries: &[LedgerEntry],
) -> ReconciliationResult {
    let chain = verify_chain(player_id, entries);
    if !chain.is_balanced() {
        return chain;
    }

    let ledger_entries = u64::try_from(entries.len()).unwrap_or(u64::MAX);
    if ledger_entries != state_sequence {
        return anomaly(
            player_id,
            None,
            AnomalyKind::CountMismatch {
                state_sequence,
                ledger_entries,
            },
            format!(
                "LEDGER_ANOMALY for {player_id}: state expects {state_sequence} entries, ledger holds {ledger_entries}"
            ),
        );
    }

    let ledger_balance = entries.last().map_or(0, |e| e.resulting_balance);
    if ledger_balance != state_stars {
        return anomaly(
            player_id,
            None,
            AnomalyKind::StateDivergence {
                state_stars,
                ledger_balance,
            },
            format!(
                "LEDGER_ANOMALY for {player_id}: state holds {state_stars} stars, ledger sums to {ledger_balance}"
            ),
        );
    }

    ReconciliationResult::Balanced
}

fn anomaly(
    player_id: PlayerId,
    sequence: Option<u64>,
    kind: AnomalyKind,
    message: String,
) -> ReconciliationResult {
    tracing::warn!(player_id = %player_id, ?sequence, ?kind, "{message}");
    ReconciliationResult::Anomaly(LedgerAnomaly {
        player_id,
        sequence,
        kind,
        message,
    })
}

/// Construct an anomaly result for arithmetic overflow during summation.
fn overflow_anomaly(player_id: PlayerId, sequence: u64) -> ReconciliationResult {
    anomaly(
        player_id,
        Some(sequence),
        AnomalyKind::Overflow,
        format!("LEDGER_ANOMALY for {player_id}: arithmetic overflow at entry {sequence}"),
    )
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::panic)]
mod tests {
    use chrono::Utc;

    use starclick_types::{CorrelationId, LedgerEntryId, LedgerEntryType};

    use super::*;

    /// Helper to create a ledger entry without going through the builder.
    fn make_entry(
        player_id: PlayerId,
        sequence: u64,
        entry_type: LedgerEntryType,
        amount: i64,
        resulting_balance: u64,
    ) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new(),
            player_id,
            sequence,
            entry_type,
            amount,
            resulting_balance,
            reason: format!("{entry_type:?}"),
            reference: None,
            correlation_id: CorrelationId::new(),
            timestamp: Utc::now(),
        }
    }

    fn chain(player: PlayerId) -> Vec<LedgerEntry> {
        vec![
            make_entry(player, 1, LedgerEntryType::Opening, 1000, 1000),
            make_entry(player, 2, LedgerEntryType::Click, 1, 1001),
            make_entry(player, 3, LedgerEntryType::Purchase, -500, 501),
            make_entry(player, 4, LedgerEntryType::LevelUp, 1000, 1501),
        ]
    }

    #[test]
    fn empty_ledger_matches_empty_state() {
        let player = PlayerId::new();
        assert_eq!(reconcile(player, 0, 0, &[]), ReconciliationResult::Balanced);
    }

    #[test]
    fn consistent_chain_is_balanced() {
        let player = PlayerId::new();
        let entries = chain(player);
        assert_eq!(verify_chain(player, &entries), ReconciliationResult::Balanced);
        assert_eq!(
            reconcile(player, 1501, 4, &entries),
            ReconciliationResult::Balanced
        );
    }

    #[test]
    fn sequence_gap_detected() {
        let player = PlayerId::new();
        let mut entries = chain(player);
        entries.remove(1);
        let result = verify_chain(player, &entries);
        let ReconciliationResult::Anomaly(a) = result else {
            panic!("expected anomaly");
        };
        assert_eq!(
            a.kind,
            AnomalyKind::SequenceGap {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn tampered_balance_detected() {
        let player = PlayerId::new();
        let mut entries = chain(player);
        entries[2].resulting_balance = 600;
        let result = verify_chain(player, &entries);
        assert!(matches!(
            result,
            ReconciliationResult::Anomaly(LedgerAnomaly {
                sequence: Some(3),
                kind: AnomalyKind::BalanceMismatch { .. },
                ..
            })
        ));
    }

    #[test]
    fn negative_running_balance_detected() {
        let player = PlayerId::new();
        let entries = vec![make_entry(player, 1, LedgerEntryType::AdminRemove, -5, 0)];
        let result = verify_chain(player, &entries);
        assert!(matches!(
            result,
            ReconciliationResult::Anomaly(LedgerAnomaly {
                kind: AnomalyKind::NegativeBalance,
                ..
            })
        ));
    }

    #[test]
    fn foreign_entry_detected() {
        let player = PlayerId::new();
        let mut entries = chain(player);
        entries[1].player_id = PlayerId::new();
        assert!(!verify_chain(player, &entries).is_balanced());
    }

    #[test]
    fn state_divergence_detected() {
        let player = PlayerId::new();
        let entries = chain(player);
        let result = reconcile(player, 1502, 4, &entries);
        let ReconciliationResult::Anomaly(a) = result else {
            panic!("expected anomaly");
        };
        assert_eq!(
            a.kind,
            AnomalyKind::StateDivergence {
                state_stars: 1502,
                ledger_balance: 1501
            }
        );
        assert!(a.to_string().starts_with("LEDGER_ANOMALY"));
    }

    #[test]
    fn missing_entries_detected_by_count() {
        let player = PlayerId::new();
        let mut entries = chain(player);
        entries.pop();
        let result = reconcile(player, 501, 4, &entries);
        assert!(matches!(
            result,
            ReconciliationResult::Anomaly(LedgerAnomaly {
                kind: AnomalyKind::CountMismatch { .. },
                ..
            })
        ));
    }
}
