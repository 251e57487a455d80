//! Validated construction of ledger entries.
//!
//! Provides an [`EntryBuilder`] that enforces the sign convention:
//! debit types carry negative amounts, credit types positive ones, and
//! no entry is ever zero. Builders validate inputs before producing a
//! [`LedgerEntry`].

use chrono::{DateTime, Utc};

use starclick_types::{CorrelationId, LedgerEntry, LedgerEntryId, LedgerEntryType, PlayerId};

use crate::LedgerError;

// ---------------------------------------------------------------------------
// Entry builder
// ---------------------------------------------------------------------------

/// Builder for constructing validated [`LedgerEntry`] values.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use starclick_ledger::EntryBuilder;
/// use starclick_types::{CorrelationId, LedgerEntryType, PlayerId};
///
/// let entry = EntryBuilder::new(PlayerId::new(), LedgerEntryType::Purchase)
///     .sequence(2)
///     .amount(-500)
///     .resulting_balance(500)
///     .reason("UPGRADE double_click".to_owned())
///     .reference("double_click")
///     .correlation(CorrelationId::new())
///     .at(Utc::now())
///     .build();
///
/// assert!(entry.is_ok());
/// ```
#[derive(Debug)]
pub struct EntryBuilder {
    player_id: PlayerId,
    entry_type: LedgerEntryType,
    sequence: Option<u64>,
    amount: Option<i64>,
    resulting_balance: Option<u64>,
    reason: Option<String>,
    reference: Option<String>,
    correlation_id: Option<CorrelationId>,
    timestamp: Option<DateTime<Utc>>,
}

impl EntryBuilder {
    /// Start building an entry of `entry_type` for `player_id`.
    pub const fn new(player_id: PlayerId, entry_type: LedgerEntryType) -> Self {
        Self {
            player_id,
            entry_type,
            sequence: None,
            amount: None,
            resulting_balance: None,
            reason: None,
            reference: None,
            correlation_id: None,
            timestamp: None,
        }
    }

    /// Set the entry's position in the player's ledger.
    #[must_use]
    pub const fn sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Set the signed change in stars.
    #[must_use]
    pub const fn amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set the balance after this entry.
    #[must_use]
    pub const fn resulting_balance(mut self, balance: u64) -> Self {
        self.resulting_balance = Some(balance);
        self
    }

    /// Set the human-readable reason.
    #[must_use]
    pub fn reason(mut self, reason: String) -> Self {
        self.reason = Some(reason);
        self
    }

    /// Set an optional reference to a catalog id, ad type or player.
    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Set the command correlation id.
    #[must_use]
    pub const fn correlation(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Set the command time.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Validate inputs and produce a [`LedgerEntry`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MissingField`] if a required field is unset
    /// (the reference is optional), [`LedgerError::ZeroAmount`] for a
    /// zero amount, [`LedgerError::WrongSign`] if the sign contradicts the
    /// entry type, and [`LedgerError::OutOfSequence`] for sequence 0.
    pub fn build(self) -> Result<LedgerEntry, LedgerError> {
        let sequence = self.sequence.ok_or(LedgerError::MissingField("sequence"))?;
        let amount = self.amount.ok_or(LedgerError::MissingField("amount"))?;
        let resulting_balance = self
            .resulting_balance
            .ok_or(LedgerError::MissingField("resulting_balance"))?;
        let reason = self.reason.ok_or(LedgerError::MissingField("reason"))?;
        let correlation_id = self
            .correlation_id
            .ok_or(LedgerError::MissingField("correlation_id"))?;
        let timestamp = self.timestamp.ok_or(LedgerError::MissingField("timestamp"))?;

        if sequence == 0 {
            return Err(LedgerError::OutOfSequence {
                expected_previous: 0,
                found: 0,
            });
        }
        validate_sign(self.entry_type, amount)?;

        Ok(LedgerEntry {
            id: LedgerEntryId::new(),
            player_id: self.player_id,
            sequence,
            entry_type: self.entry_type,
            amount,
            resulting_balance,
            reason,
            reference: self.reference,
            correlation_id,
            timestamp,
        })
    }
}

/// Check that `amount` is non-zero and signed according to `entry_type`.
///
/// # Errors
///
/// Returns [`LedgerError::ZeroAmount`] or [`LedgerError::WrongSign`].
pub const fn validate_sign(entry_type: LedgerEntryType, amount: i64) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }
    let credit = entry_type.is_credit();
    if credit && amount < 0 {
        return Err(LedgerError::WrongSign {
            entry_type,
            expected: "positive",
            amount,
        });
    }
    if !credit && amount > 0 {
        return Err(LedgerError::WrongSign {
            entry_type,
            expected: "negative",
            amount,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(entry_type: LedgerEntryType, amount: i64) -> EntryBuilder {
        EntryBuilder::new(PlayerId::new(), entry_type)
            .sequence(1)
            .amount(amount)
            .resulting_balance(1000)
            .reason("TEST".to_owned())
            .correlation(CorrelationId::new())
            .at(Utc::now())
    }

    #[test]
    fn credit_entry_builds() {
        let entry = builder(LedgerEntryType::Click, 5).build();
        assert!(entry.is_ok());
        if let Ok(e) = entry {
            assert_eq!(e.amount, 5);
            assert_eq!(e.reference, None);
        }
    }

    #[test]
    fn zero_amount_rejected() {
        let err = builder(LedgerEntryType::Click, 0).build().err();
        assert_eq!(err, Some(LedgerError::ZeroAmount));
    }

    #[test]
    fn negative_credit_rejected() {
        let err = builder(LedgerEntryType::DailyReward, -100).build().err();
        assert!(matches!(
            err,
            Some(LedgerError::WrongSign {
                expected: "positive",
                ..
            })
        ));
    }

    #[test]
    fn positive_purchase_rejected() {
        let err = builder(LedgerEntryType::Purchase, 100).build().err();
        assert!(matches!(
            err,
            Some(LedgerError::WrongSign {
                expected: "negative",
                ..
            })
        ));
    }

    #[test]
    fn missing_reason_rejected() {
        let err = EntryBuilder::new(PlayerId::new(), LedgerEntryType::Click)
            .sequence(1)
            .amount(1)
            .resulting_balance(1)
            .correlation(CorrelationId::new())
            .at(Utc::now())
            .build()
            .err();
        assert_eq!(err, Some(LedgerError::MissingField("reason")));
    }

    #[test]
    fn sequence_zero_rejected() {
        let err = builder(LedgerEntryType::Click, 1).sequence(0).build().err();
        assert!(matches!(err, Some(LedgerError::OutOfSequence { .. })));
    }
}
