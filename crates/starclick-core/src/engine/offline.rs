//! Offline income reconciliation.

use chrono::TimeDelta;

use starclick_types::{AchievementFamily, BoosterKind, LedgerEntryType, OfflineResult, ResourceState};

use super::click::ensure_not_banned;
use super::draft::{Draft, scale};
use super::progression::unlock_family;
use super::{CommandContext, EconomyEngine, Transition};
use crate::error::EconomyError;

impl EconomyEngine<'_> {
    /// Credit idle income and energy regeneration since `last_active_at`.
    ///
    /// Elapsed time is counted in whole seconds and capped at
    /// `offline.max_offline_secs`. Below the cap `last_active_at` advances by
    /// exactly the seconds credited, so a sub-second remainder carries over
    /// to the next reconciliation. Passive boosters still running at `now`
    /// multiply the income. When no whole second has passed (or the clock
    /// went backwards) nothing is credited, so calling this twice with the
    /// same `now` credits only once.
    ///
    /// # Errors
    ///
    /// [`EconomyError::Banned`] or an internal error.
    pub fn reconcile_offline(
        &self,
        state: &ResourceState,
        ctx: &CommandContext,
    ) -> Result<Transition<OfflineResult>, EconomyError> {
        ensure_not_banned(state)?;
        let mut draft = Draft::new(state, ctx);

        let raw = ctx
            .now
            .signed_duration_since(state.last_active_at)
            .num_seconds();
        let Ok(raw) = u64::try_from(raw) else {
            return draft.finish(self.config.leveling.exp_factor, OfflineResult::default());
        };
        if raw == 0 {
            return draft.finish(self.config.leveling.exp_factor, OfflineResult::default());
        }
        let elapsed = raw.min(self.config.offline.max_offline_secs);

        let mut boosters: Vec<_> = draft
            .state
            .boosters_of(BoosterKind::Passive, ctx.now)
            .collect();
        boosters.sort_by_key(|b| b.activated_at);
        let mut passive = elapsed
            .checked_mul(draft.state.passive_income)
            .ok_or(EconomyError::overflow("passive income"))?;
        for booster in boosters {
            passive =
                scale(passive, booster.multiplier).ok_or(EconomyError::overflow("passive income"))?;
        }

        let regen = elapsed
            .checked_div(self.config.offline.energy_regen_interval_secs)
            .unwrap_or(0);
        let s = &mut draft.state;
        let headroom = s.max_energy.saturating_sub(s.energy);
        let energy_recovered = u32::try_from(regen).unwrap_or(u32::MAX).min(headroom);
        s.energy = s.energy.saturating_add(energy_recovered);
        s.last_active_at = if raw > elapsed {
            ctx.now
        } else {
            i64::try_from(raw)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|d| state.last_active_at.checked_add_signed(d))
                .ok_or(EconomyError::overflow("last active"))?
        };

        draft.credit(
            LedgerEntryType::Passive,
            passive,
            format!("offline income for {elapsed}s"),
            None,
        )?;
        unlock_family(&mut draft, self.catalog, AchievementFamily::Stars)?;

        tracing::debug!(
            player_id = %state.player_id,
            elapsed,
            passive,
            energy_recovered,
            "offline progress reconciled"
        );
        draft.finish(
            self.config.leveling.exp_factor,
            OfflineResult {
                elapsed_seconds: elapsed,
                passive_income: passive,
                energy_recovered,
            },
        )
    }
}
