//! Ad rewards and the daily login reward.

use chrono::TimeDelta;

use starclick_types::{
    AchievementFamily, AdResult, AdType, DailyClaim, DailyResult, LedgerEntryType, ResourceState,
};

use super::click::ensure_not_banned;
use super::draft::Draft;
use super::progression::unlock_family;
use super::{CommandContext, EconomyEngine, Transition};
use crate::error::EconomyError;

impl EconomyEngine<'_> {
    /// Grant a reward for an ad view the ad-validation collaborator has
    /// already certified.
    ///
    /// The daily counter resets once `ads.daily_window_hours` have passed
    /// since `daily_reset`. Each ad type has its own cooldown. A granted
    /// view consumes `ads.energy_cost` energy.
    ///
    /// # Errors
    ///
    /// [`EconomyError::InvalidCommand`] for a zero or oversized reward,
    /// [`EconomyError::DailyLimitReached`], [`EconomyError::AdCooldown`],
    /// [`EconomyError::InsufficientEnergy`], [`EconomyError::Banned`], or an
    /// internal error.
    pub fn ad_reward(
        &self,
        state: &ResourceState,
        ad_type: AdType,
        reward: u64,
        ctx: &CommandContext,
    ) -> Result<Transition<AdResult>, EconomyError> {
        ensure_not_banned(state)?;
        let ads = &self.config.ads;
        if reward == 0 || reward > ads.max_reward_per_view {
            return Err(EconomyError::invalid(format!(
                "ad reward must be between 1 and {}",
                ads.max_reward_per_view
            )));
        }

        let mut draft = Draft::new(state, ctx);
        let window = TimeDelta::try_hours(i64::from(ads.daily_window_hours))
            .ok_or(EconomyError::overflow("ad window"))?;
        let stats = &mut draft.state.ad_stats;
        if ctx.now.signed_duration_since(stats.daily_reset) >= window {
            stats.ads_watched_today = 0;
            stats.daily_reset = ctx.now;
        }
        if stats.ads_watched_today >= ads.max_ads_per_day {
            return Err(EconomyError::DailyLimitReached {
                limit: ads.max_ads_per_day,
            });
        }

        let cooldown = ads.cooldowns.for_type(ad_type);
        if let Some(last) = stats.last_watch_by_type.get(&ad_type) {
            let since = u64::try_from(ctx.now.signed_duration_since(*last).num_seconds()).unwrap_or(0);
            if since < cooldown {
                return Err(EconomyError::AdCooldown {
                    ad_type,
                    remaining_secs: cooldown.saturating_sub(since),
                });
            }
        }

        let energy = draft.state.energy;
        if energy < ads.min_energy {
            return Err(EconomyError::InsufficientEnergy {
                required: ads.min_energy,
                available: energy,
            });
        }
        draft.state.energy = energy
            .checked_sub(ads.energy_cost)
            .ok_or(EconomyError::InsufficientEnergy {
                required: ads.energy_cost,
                available: energy,
            })?;

        let stats = &mut draft.state.ad_stats;
        stats.ads_watched_today = stats.ads_watched_today.saturating_add(1);
        stats.total_ads_watched = stats.total_ads_watched.saturating_add(1);
        stats.total_earned_from_ads = stats
            .total_earned_from_ads
            .checked_add(reward)
            .ok_or(EconomyError::overflow("ad earnings"))?;
        stats.last_ad_watch = Some(ctx.now);
        stats.last_watch_by_type.insert(ad_type, ctx.now);
        let ads_watched_today = stats.ads_watched_today;

        draft.credit(
            LedgerEntryType::AdReward,
            reward,
            format!("{} ad reward", ad_type.as_str()),
            Some(ad_type.as_str().to_owned()),
        )?;
        unlock_family(&mut draft, self.catalog, AchievementFamily::Ads)?;

        draft.finish(
            self.config.leveling.exp_factor,
            AdResult {
                ad_type,
                reward,
                ads_watched_today,
                ads_remaining_today: ads.max_ads_per_day.saturating_sub(ads_watched_today),
            },
        )
    }

    /// Claim the once-per-UTC-day login reward.
    ///
    /// `reward = base + level * per_level + streak * per_streak`, clamped to
    /// `[min_reward, max_reward]`. The streak continues only when the
    /// previous claim was yesterday.
    ///
    /// # Errors
    ///
    /// [`EconomyError::DailyLimitReached`] if already claimed today,
    /// [`EconomyError::Banned`], or an internal error.
    pub fn daily_reward(
        &self,
        state: &ResourceState,
        ctx: &CommandContext,
    ) -> Result<Transition<DailyResult>, EconomyError> {
        ensure_not_banned(state)?;
        let daily = &self.config.daily;
        let today = ctx.now.date_naive();
        let last = state.daily.last_claim_date;
        if last.is_some_and(|d| d >= today) {
            return Err(EconomyError::DailyLimitReached { limit: 1 });
        }

        let streak = if last.is_some() && last == today.pred_opt() {
            state.daily.streak.saturating_add(1)
        } else {
            1
        };
        let reward = u64::from(state.level)
            .checked_mul(daily.per_level)
            .zip(u64::from(streak).checked_mul(daily.per_streak))
            .and_then(|(a, b)| a.checked_add(b))
            .and_then(|v| v.checked_add(daily.base))
            .unwrap_or(u64::MAX)
            .clamp(daily.min_reward, daily.max_reward);

        let mut draft = Draft::new(state, ctx);
        let tracker = &mut draft.state.daily;
        tracker.last_claim_date = Some(today);
        tracker.streak = streak;
        tracker.history.push(DailyClaim {
            date: today,
            reward,
            streak,
        });
        let overflow = tracker.history.len().saturating_sub(daily.history_len);
        tracker.history.drain(..overflow);

        draft.credit(
            LedgerEntryType::DailyReward,
            reward,
            format!("daily reward, day {streak}"),
            Some(today.to_string()),
        )?;
        unlock_family(&mut draft, self.catalog, AchievementFamily::Stars)?;

        draft.finish(
            self.config.leveling.exp_factor,
            DailyResult {
                reward,
                streak,
                date: today,
            },
        )
    }
}
