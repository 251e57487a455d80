//! Per-player ledger and balance reconciliation for the Starclick economy.
//!
//! Every change to a player's star balance is recorded as an immutable
//! [`LedgerEntry`](starclick_types::LedgerEntry). The ledger is the
//! authority: a player's `stars` must always equal the running sum of
//! their entries. The ledger never panics; it returns errors.
//!
//! # Architecture
//!
//! - [`entry`] -- The [`EntryBuilder`] for validated entry construction.
//! - [`ledger`] -- The [`PlayerLedger`]: append-only chain with paging and summaries.
//! - [`reconciliation`] -- Chain verification and state/ledger reconciliation.
//!
//! # Ledger identity
//!
//! For every player P and every entry n in P's ledger:
//!
//! ```text
//! entry[n].sequence          == n                       (contiguous from 1)
//! entry[n].resulting_balance == entry[n-1].resulting_balance + entry[n].amount
//! state.stars                == entry[last].resulting_balance
//! ```
//!
//! A violation produces a [`LedgerAnomaly`].
//!
//! # Sign convention
//!
//! | Type | Sign |
//! |------|------|
//! | `Purchase`, `AdminRemove` | negative |
//! | everything else | positive |
//!
//! # Usage
//!
//! ```
//! use chrono::Utc;
//! use starclick_ledger::{EntryBuilder, PlayerLedger, ReconciliationResult};
//! use starclick_types::{CorrelationId, LedgerEntryType, PlayerId};
//!
//! let player = PlayerId::new();
//! let mut ledger = PlayerLedger::new(player);
//!
//! let opening = EntryBuilder::new(player, LedgerEntryType::Opening)
//!     .sequence(1)
//!     .amount(1000)
//!     .resulting_balance(1000)
//!     .reason("OPENING".to_owned())
//!     .correlation(CorrelationId::new())
//!     .at(Utc::now())
//!     .build();
//! assert!(opening.is_ok());
//! if let Ok(entry) = opening {
//!     assert!(ledger.append(entry).is_ok());
//! }
//!
//! assert_eq!(ledger.balance(), 1000);
//! assert_eq!(ledger.reconcile(1000, 1), ReconciliationResult::Balanced);
//! ```

pub mod entry;
pub mod ledger;
pub mod reconciliation;

// Re-export primary types at crate root.
pub use entry::EntryBuilder;
pub use ledger::{AppendOutcome, PlayerLedger, summarize};
pub use reconciliation::{ReconciliationResult, reconcile, verify_chain};

use starclick_types::{LedgerEntryType, PlayerId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when building or appending ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Amount must be non-zero.
    #[error("ledger entry amount must be non-zero")]
    ZeroAmount,

    /// The amount's sign does not match the entry type.
    #[error("{entry_type} entries must be {expected}, got {amount}")]
    WrongSign {
        /// The entry type being validated.
        entry_type: LedgerEntryType,
        /// `"positive"` or `"negative"`.
        expected: &'static str,
        /// The invalid amount.
        amount: i64,
    },

    /// A required field was not set on the builder.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The entry belongs to another player's ledger.
    #[error("entry for player {found} appended to ledger of {expected}")]
    ForeignEntry {
        /// Owner of the ledger.
        expected: PlayerId,
        /// Player named by the entry.
        found: PlayerId,
    },

    /// The entry does not continue the chain.
    #[error("sequence {found} does not follow {expected_previous}")]
    OutOfSequence {
        /// Sequence of the current last entry (0 when empty).
        expected_previous: u64,
        /// Sequence carried by the rejected entry.
        found: u64,
    },

    /// The entry's resulting balance disagrees with the chain.
    #[error("entry {sequence} claims balance {recorded}, chain gives {computed}")]
    BalanceMismatch {
        /// Sequence of the rejected entry.
        sequence: u64,
        /// Balance computed from the previous entry and the amount.
        computed: i128,
        /// Balance stored on the entry.
        recorded: u64,
    },

    /// Summation overflowed.
    #[error("arithmetic overflow while summing ledger amounts")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// The specific integrity violation behind a [`LedgerAnomaly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    /// An entry belongs to another player.
    ForeignEntry,
    /// Sequences are not contiguous from 1.
    SequenceGap {
        /// Sequence that should have appeared.
        expected: u64,
        /// Sequence that did appear.
        found: u64,
    },
    /// A resulting balance does not follow from the previous one.
    BalanceMismatch {
        /// Balance implied by the chain.
        computed: i128,
        /// Balance stored on the entry.
        recorded: u64,
    },
    /// The running balance went below zero.
    NegativeBalance,
    /// The player's `stars` disagree with the ledger.
    StateDivergence {
        /// Value held in the resource state.
        state_stars: u64,
        /// Balance after the last ledger entry.
        ledger_balance: u64,
    },
    /// The state's entry counter disagrees with the ledger length.
    CountMismatch {
        /// Counter held in the resource state.
        state_sequence: u64,
        /// Entries present in the ledger.
        ledger_entries: u64,
    },
    /// Summation overflowed.
    Overflow,
}

/// A reconciliation failure for one player.
///
/// This is the economy's most critical integrity alert: the state and
/// the ledger no longer tell the same story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// The player whose ledger failed reconciliation.
    pub player_id: PlayerId,
    /// Sequence of the offending entry, if the anomaly is entry-specific.
    pub sequence: Option<u64>,
    /// What went wrong.
    pub kind: AnomalyKind,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
