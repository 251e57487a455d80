//! Tap resolution.

use rand::Rng;
use rust_decimal::Decimal;

use starclick_types::{AchievementFamily, BoosterKind, ClickResult, LedgerEntryType, ResourceState};

use super::draft::{Draft, scale};
use super::progression::{resolve_levels, unlock_family};
use super::{CommandContext, EconomyEngine, Transition};
use crate::error::EconomyError;

/// Resolution of a critical roll: one millionth.
const ROLL_SCALE: u32 = 6;
const ROLL_RANGE: u32 = 1_000_000;

impl EconomyEngine<'_> {
    /// Resolve one tap.
    ///
    /// Click boosters multiply the value oldest-first with floor rounding
    /// after each step, then a critical roll may multiply it again. The tap
    /// costs energy, counts towards `total_clicks` and grants
    /// `floor(value / exp_divisor)` experience.
    ///
    /// # Errors
    ///
    /// [`EconomyError::Banned`], [`EconomyError::InsufficientEnergy`] when
    /// the player cannot pay the energy cost, or an internal error.
    pub fn click(
        &self,
        state: &ResourceState,
        ctx: &CommandContext,
        rng: &mut impl Rng,
    ) -> Result<Transition<ClickResult>, EconomyError> {
        ensure_not_banned(state)?;
        let cost = self.config.click.energy_cost;
        if state.energy < cost || state.energy == 0 {
            return Err(EconomyError::InsufficientEnergy {
                required: cost.max(1),
                available: state.energy,
            });
        }

        let mut draft = Draft::new(state, ctx);

        let mut boosters: Vec<_> = draft.state.boosters_of(BoosterKind::Click, ctx.now).collect();
        boosters.sort_by_key(|b| b.activated_at);
        let mut value = draft.state.click_power;
        for booster in boosters {
            value = scale(value, booster.multiplier).ok_or(EconomyError::overflow("click value"))?;
        }

        let mut is_critical = false;
        if draft.state.critical_chance > Decimal::ZERO {
            let roll = Decimal::new(i64::from(rng.random_range(0..ROLL_RANGE)), ROLL_SCALE);
            if roll < draft.state.critical_chance {
                value = value
                    .checked_mul(u64::from(draft.state.critical_multiplier))
                    .ok_or(EconomyError::overflow("critical click value"))?;
                is_critical = true;
            }
        }

        let exp_gain = value
            .checked_div(self.config.click.exp_divisor)
            .unwrap_or(0);
        let s = &mut draft.state;
        s.energy = s.energy.saturating_sub(cost);
        s.total_clicks = s
            .total_clicks
            .checked_add(1)
            .ok_or(EconomyError::overflow("total clicks"))?;
        s.experience = s
            .experience
            .checked_add(exp_gain)
            .ok_or(EconomyError::overflow("experience"))?;
        s.last_active_at = ctx.now;

        let reason = if is_critical { "critical click" } else { "click" };
        draft.credit(LedgerEntryType::Click, value, reason.to_owned(), None)?;

        resolve_levels(&mut draft, &self.config.leveling, self.catalog)?;
        unlock_family(&mut draft, self.catalog, AchievementFamily::Clicks)?;

        draft.finish(
            self.config.leveling.exp_factor,
            ClickResult { value, is_critical },
        )
    }
}

pub(crate) const fn ensure_not_banned(state: &ResourceState) -> Result<(), EconomyError> {
    if state.banned {
        Err(EconomyError::Banned)
    } else {
        Ok(())
    }
}
