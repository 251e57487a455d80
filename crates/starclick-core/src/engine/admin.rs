//! Operator adjustments, referrals, bans and achievement back-fill.

use starclick_types::{
    AchievementFamily, AdjustmentResult, LedgerEntryType, PlayerId, ReevaluationResult,
    ReferralResult, ResourceState,
};

use super::click::ensure_not_banned;
use super::draft::Draft;
use super::progression::unlock_family;
use super::{CommandContext, EconomyEngine, Transition};
use crate::error::EconomyError;

fn note_or(note: &str, fallback: &str) -> String {
    let trimmed = note.trim();
    if trimmed.is_empty() {
        fallback.to_owned()
    } else {
        trimmed.to_owned()
    }
}

impl EconomyEngine<'_> {
    /// Operator credit.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidCommand`] for a zero amount,
    /// [`EconomyError::Banned`], or an internal error.
    pub fn admin_grant(
        &self,
        state: &ResourceState,
        amount: u64,
        note: &str,
        ctx: &CommandContext,
    ) -> Result<Transition<AdjustmentResult>, EconomyError> {
        ensure_not_banned(state)?;
        if amount == 0 {
            return Err(EconomyError::invalid("grant amount must be positive"));
        }
        let signed = i64::try_from(amount)
            .ok()
            .ok_or(EconomyError::overflow("grant amount"))?;

        let mut draft = Draft::new(state, ctx);
        draft.credit(
            LedgerEntryType::AdminGrant,
            amount,
            note_or(note, "admin grant"),
            None,
        )?;
        unlock_family(&mut draft, self.catalog, AchievementFamily::Stars)?;
        tracing::info!(player_id = %state.player_id, amount, "admin grant");

        let balance = draft.state.stars;
        draft.finish(
            self.config.leveling.exp_factor,
            AdjustmentResult {
                amount: signed,
                balance,
            },
        )
    }

    /// Operator debit.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidCommand`] for a zero amount,
    /// [`EconomyError::InsufficientFunds`] if the balance would go negative,
    /// [`EconomyError::Banned`], or an internal error.
    pub fn admin_remove(
        &self,
        state: &ResourceState,
        amount: u64,
        note: &str,
        ctx: &CommandContext,
    ) -> Result<Transition<AdjustmentResult>, EconomyError> {
        ensure_not_banned(state)?;
        if amount == 0 {
            return Err(EconomyError::invalid("removal amount must be positive"));
        }
        let signed = i64::try_from(amount)
            .ok()
            .and_then(i64::checked_neg)
            .ok_or(EconomyError::overflow("removal amount"))?;

        let mut draft = Draft::new(state, ctx);
        draft.debit(
            LedgerEntryType::AdminRemove,
            amount,
            note_or(note, "admin removal"),
            None,
        )?;
        tracing::info!(player_id = %state.player_id, amount, "admin removal");

        let balance = draft.state.stars;
        draft.finish(
            self.config.leveling.exp_factor,
            AdjustmentResult {
                amount: signed,
                balance,
            },
        )
    }

    /// Credit the player for referring `referred`, once per referred player.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidCommand`] for a self-referral,
    /// [`EconomyError::AlreadyReferred`], [`EconomyError::Banned`], or an
    /// internal error.
    pub fn referral(
        &self,
        state: &ResourceState,
        referred: PlayerId,
        ctx: &CommandContext,
    ) -> Result<Transition<ReferralResult>, EconomyError> {
        ensure_not_banned(state)?;
        if referred == state.player_id {
            return Err(EconomyError::invalid("a player cannot refer themselves"));
        }
        if state.referrals.contains(&referred) {
            return Err(EconomyError::AlreadyReferred { referred });
        }

        let reward = self.config.referral.reward;
        let mut draft = Draft::new(state, ctx);
        draft.state.referrals.insert(referred);
        draft.credit(
            LedgerEntryType::Referral,
            reward,
            "referral reward".to_owned(),
            Some(referred.to_string()),
        )?;
        unlock_family(&mut draft, self.catalog, AchievementFamily::Referrals)?;
        unlock_family(&mut draft, self.catalog, AchievementFamily::Stars)?;

        let referral_count = u64::try_from(draft.state.referrals.len()).unwrap_or(u64::MAX);
        draft.finish(
            self.config.leveling.exp_factor,
            ReferralResult {
                referred,
                reward,
                referral_count,
            },
        )
    }

    /// Record `referrer` as the player who brought this one in. The referred
    /// side has no ledger effect; the reward goes to the referrer through
    /// [`Self::referral`].
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidCommand`] for a self-referral,
    /// [`EconomyError::AlreadyReferred`] if a referrer is already recorded,
    /// or an internal error.
    pub fn mark_referred(
        &self,
        state: &ResourceState,
        referrer: PlayerId,
        ctx: &CommandContext,
    ) -> Result<Transition<PlayerId>, EconomyError> {
        if referrer == state.player_id {
            return Err(EconomyError::invalid("a player cannot refer themselves"));
        }
        if state.referred_by.is_some() {
            return Err(EconomyError::AlreadyReferred {
                referred: state.player_id,
            });
        }
        let mut draft = Draft::new(state, ctx);
        draft.state.referred_by = Some(referrer);
        draft.finish(self.config.leveling.exp_factor, referrer)
    }

    /// Undo [`Self::mark_referred`] when the referrer's reward could not be
    /// committed. Leaves a different referrer in place.
    ///
    /// # Errors
    ///
    /// Only internal errors.
    pub fn unmark_referred(
        &self,
        state: &ResourceState,
        referrer: PlayerId,
        ctx: &CommandContext,
    ) -> Result<Transition<bool>, EconomyError> {
        let mut draft = Draft::new(state, ctx);
        let cleared = draft.state.referred_by == Some(referrer);
        if cleared {
            draft.state.referred_by = None;
        }
        draft.finish(self.config.leveling.exp_factor, cleared)
    }

    /// Set or clear the ban flag. Has no ledger effect and is permitted on
    /// banned players.
    ///
    /// # Errors
    ///
    /// Only internal errors.
    pub fn set_banned(
        &self,
        state: &ResourceState,
        banned: bool,
        ctx: &CommandContext,
    ) -> Result<Transition<bool>, EconomyError> {
        let mut draft = Draft::new(state, ctx);
        draft.state.banned = banned;
        tracing::info!(player_id = %state.player_id, banned, "ban flag updated");
        draft.finish(self.config.leveling.exp_factor, banned)
    }

    /// Evaluate every achievement family, for back-fill after catalog
    /// changes.
    ///
    /// # Errors
    ///
    /// [`EconomyError::Banned`] or an internal error.
    pub fn reevaluate_achievements(
        &self,
        state: &ResourceState,
        ctx: &CommandContext,
    ) -> Result<Transition<ReevaluationResult>, EconomyError> {
        ensure_not_banned(state)?;
        let mut draft = Draft::new(state, ctx);
        let mut unlocked = Vec::new();
        for family in AchievementFamily::ALL {
            unlocked.extend(unlock_family(&mut draft, self.catalog, family)?);
        }
        // Rewards from later families can cross further star thresholds.
        unlocked.extend(unlock_family(&mut draft, self.catalog, AchievementFamily::Stars)?);
        draft.finish(
            self.config.leveling.exp_factor,
            ReevaluationResult { unlocked },
        )
    }
}
