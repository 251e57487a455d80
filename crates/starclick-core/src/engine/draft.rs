//! Candidate state under construction.
//!
//! A [`Draft`] owns a copy of the player's state. Command handlers mutate the
//! copy and record every star movement through [`Draft::credit`] and
//! [`Draft::debit`], which keep `stars`, `ledger_sequence` and the entry
//! chain in lockstep. Nothing reaches the caller until [`Draft::finish`]
//! has run the invariant checks, so an early `?` simply drops the draft.
//!
//! Boosters that expired before the command's `now` are dropped when the
//! draft opens, and every finished draft stamps `last_save`.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use starclick_ledger::EntryBuilder;
use starclick_types::{EconomyEvent, LedgerEntry, LedgerEntryType, ResourceState};

use super::{CommandContext, Transition};
use crate::error::EconomyError;
use crate::invariants;

pub(crate) struct Draft<'a> {
    before: &'a ResourceState,
    ctx: &'a CommandContext,
    pub(crate) state: ResourceState,
    entries: Vec<LedgerEntry>,
    events: Vec<EconomyEvent>,
}

impl<'a> Draft<'a> {
    pub(crate) fn new(before: &'a ResourceState, ctx: &'a CommandContext) -> Self {
        let mut state = before.clone();
        state.active_boosters.retain(|b| b.is_active(ctx.now));
        Self {
            before,
            ctx,
            state,
            entries: Vec::new(),
            events: Vec::new(),
        }
    }

    pub(crate) const fn ctx(&self) -> &CommandContext {
        self.ctx
    }

    /// Add `amount` stars and record the matching entry. Zero is a no-op.
    pub(crate) fn credit(
        &mut self,
        entry_type: LedgerEntryType,
        amount: u64,
        reason: String,
        reference: Option<String>,
    ) -> Result<(), EconomyError> {
        if amount == 0 {
            return Ok(());
        }
        let signed = i64::try_from(amount)
            .ok()
            .ok_or(EconomyError::overflow("credit amount"))?;
        let balance = self
            .state
            .stars
            .checked_add(amount)
            .ok_or(EconomyError::overflow("stars"))?;
        self.record(entry_type, signed, balance, reason, reference)
    }

    /// Remove `amount` stars and record the matching entry.
    pub(crate) fn debit(
        &mut self,
        entry_type: LedgerEntryType,
        amount: u64,
        reason: String,
        reference: Option<String>,
    ) -> Result<(), EconomyError> {
        let balance =
            self.state
                .stars
                .checked_sub(amount)
                .ok_or(EconomyError::InsufficientFunds {
                    required: amount,
                    available: self.state.stars,
                })?;
        let signed = i64::try_from(amount)
            .ok()
            .and_then(i64::checked_neg)
            .ok_or(EconomyError::overflow("debit amount"))?;
        self.record(entry_type, signed, balance, reason, reference)
    }

    fn record(
        &mut self,
        entry_type: LedgerEntryType,
        amount: i64,
        balance: u64,
        reason: String,
        reference: Option<String>,
    ) -> Result<(), EconomyError> {
        let sequence = self
            .state
            .ledger_sequence
            .checked_add(1)
            .ok_or(EconomyError::overflow("ledger sequence"))?;
        let mut builder = EntryBuilder::new(self.state.player_id, entry_type)
            .sequence(sequence)
            .amount(amount)
            .resulting_balance(balance)
            .reason(reason)
            .correlation(self.ctx.correlation_id)
            .at(self.ctx.now);
        if let Some(reference) = reference {
            builder = builder.reference(reference);
        }
        let entry = builder.build()?;

        self.state.stars = balance;
        self.state.ledger_sequence = sequence;
        self.entries.push(entry);
        Ok(())
    }

    pub(crate) fn event(&mut self, event: EconomyEvent) {
        self.events.push(event);
    }

    /// Update high-water marks, check invariants and hand the result back.
    pub(crate) fn finish<T>(
        mut self,
        exp_factor: u64,
        outcome: T,
    ) -> Result<Transition<T>, EconomyError> {
        let stats = &mut self.state.statistics;
        stats.max_stars = stats.max_stars.max(self.state.stars);
        stats.max_click_power = stats.max_click_power.max(self.state.click_power);
        self.state.last_save = self.ctx.now;

        invariants::check_transition(self.before, &self.state, &self.entries, exp_factor)?;
        invariants::check_boosters(&self.state, self.ctx.now)?;
        Ok(Transition {
            state: self.state,
            entries: self.entries,
            events: self.events,
            outcome,
        })
    }
}

/// `floor(value * factor)`, or `None` if the product leaves `u64`.
pub(crate) fn scale(value: u64, factor: Decimal) -> Option<u64> {
    Decimal::from(value).checked_mul(factor)?.floor().to_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_floors() {
        assert_eq!(scale(7, Decimal::new(15, 1)), Some(10));
        assert_eq!(scale(3, Decimal::new(11, 1)), Some(3));
        assert_eq!(scale(0, Decimal::from(5)), Some(0));
    }

    #[test]
    fn scale_reports_overflow() {
        assert_eq!(scale(u64::MAX, Decimal::from(2)), None);
    }
}
