//! Leveling and achievement unlocks.
//!
//! Both run at the tail of other commands and add their own ledger entries
//! after the command's primary entry.

use starclick_types::{
    AchievementFamily, AchievementId, EconomyEvent, LedgerEntryType, ResourceState,
    UnlockedAchievement,
};

use super::draft::Draft;
use crate::catalog::EffectCatalog;
use crate::config::LevelingConfig;
use crate::error::EconomyError;

/// Experience needed to leave `level`.
pub(crate) fn exp_needed(level: u32, config: &LevelingConfig) -> Result<u64, EconomyError> {
    u64::from(level)
        .checked_mul(config.exp_factor)
        .ok_or(EconomyError::overflow("level threshold"))
}

/// Consume experience into levels, then grant one aggregated reward and the
/// stat growth for every level gained. Returns the number of levels gained.
pub(crate) fn resolve_levels(
    draft: &mut Draft<'_>,
    config: &LevelingConfig,
    catalog: &EffectCatalog,
) -> Result<u32, EconomyError> {
    let from = draft.state.level;
    loop {
        let needed = exp_needed(draft.state.level, config)?;
        if draft.state.experience < needed {
            break;
        }
        draft.state.experience = draft.state.experience.saturating_sub(needed);
        draft.state.level = draft
            .state
            .level
            .checked_add(1)
            .ok_or(EconomyError::overflow("level"))?;
    }

    let to = draft.state.level;
    let gained = to.saturating_sub(from);
    if gained == 0 {
        return Ok(0);
    }

    let levels = u64::from(gained);
    let reward = levels
        .checked_mul(config.reward_per_level)
        .ok_or(EconomyError::overflow("level reward"))?;
    let state = &mut draft.state;
    state.click_power = levels
        .checked_mul(config.click_power_per_level)
        .and_then(|v| state.click_power.checked_add(v))
        .ok_or(EconomyError::overflow("click power"))?;
    state.max_energy = gained
        .checked_mul(config.max_energy_per_level)
        .and_then(|v| state.max_energy.checked_add(v))
        .ok_or(EconomyError::overflow("max energy"))?;
    state.passive_income = levels
        .checked_mul(config.passive_income_per_level)
        .and_then(|v| state.passive_income.checked_add(v))
        .ok_or(EconomyError::overflow("passive income"))?;

    draft.credit(
        LedgerEntryType::LevelUp,
        reward,
        format!("level {from} -> {to}"),
        None,
    )?;
    draft.event(EconomyEvent::LevelUp { from, to, reward });
    tracing::debug!(player_id = %draft.state.player_id, from, to, reward, "level up");

    unlock_family(draft, catalog, AchievementFamily::Levels)?;
    Ok(gained)
}

/// Current value of the stat a family's predicates read.
pub(crate) fn family_value(state: &ResourceState, family: AchievementFamily) -> u64 {
    let len = |n: usize| u64::try_from(n).unwrap_or(u64::MAX);
    match family {
        AchievementFamily::Clicks => state.total_clicks,
        AchievementFamily::Stars => state.stars,
        AchievementFamily::Levels => u64::from(state.level),
        AchievementFamily::Upgrades => len(state.owned_upgrades.len()),
        AchievementFamily::Ads => state.ad_stats.total_ads_watched,
        AchievementFamily::Referrals => len(state.referrals.len()),
    }
}

/// Unlock every not-yet-unlocked achievement of `family` whose threshold is
/// met. Thresholds are walked in ascending order and the value is re-read
/// after each reward, so a reward that crosses the next star threshold
/// unlocks it in the same pass.
pub(crate) fn unlock_family(
    draft: &mut Draft<'_>,
    catalog: &EffectCatalog,
    family: AchievementFamily,
) -> Result<Vec<AchievementId>, EconomyError> {
    let mut unlocked = Vec::new();
    for def in catalog.achievements_in(family) {
        if draft.state.unlocked_achievements.contains_key(&def.id) {
            continue;
        }
        if family_value(&draft.state, family) < def.threshold {
            break;
        }
        draft.credit(
            LedgerEntryType::Achievement,
            def.reward,
            format!("achievement {}", def.name),
            Some(def.id.to_string()),
        )?;
        let unlocked_at = draft.ctx().now;
        draft.state.unlocked_achievements.insert(
            def.id.clone(),
            UnlockedAchievement {
                reward: def.reward,
                unlocked_at,
            },
        );
        draft.event(EconomyEvent::AchievementUnlocked {
            achievement_id: def.id.clone(),
            reward: def.reward,
        });
        tracing::debug!(
            player_id = %draft.state.player_id,
            achievement = %def.id,
            reward = def.reward,
            "achievement unlocked"
        );
        unlocked.push(def.id.clone());
    }
    Ok(unlocked)
}
