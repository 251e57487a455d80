//! Post-transition invariant checks.
//!
//! Every engine transition is checked against the state it started from
//! before it is handed back to the caller. A failed check means an engine
//! defect, never a player mistake: the candidate state is discarded and the
//! command fails with [`EconomyError::InvariantViolated`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use starclick_types::{LedgerEntry, ResourceState};

use crate::config::MIN_MAX_ENERGY;
use crate::error::EconomyError;

fn violated(invariant: &'static str, detail: String) -> EconomyError {
    tracing::error!(invariant, %detail, "economy invariant violated");
    EconomyError::InvariantViolated { invariant, detail }
}

/// Check the single-state invariants.
///
/// # Errors
///
/// Returns [`EconomyError::InvariantViolated`] naming the first broken rule.
pub fn check_state(state: &ResourceState, exp_factor: u64) -> Result<(), EconomyError> {
    if state.energy > state.max_energy {
        return Err(violated(
            "energy_bound",
            format!("energy {} > max {}", state.energy, state.max_energy),
        ));
    }
    if state.max_energy < MIN_MAX_ENERGY {
        return Err(violated(
            "max_energy_floor",
            format!("max energy {} < {MIN_MAX_ENERGY}", state.max_energy),
        ));
    }
    if state.click_power == 0 {
        return Err(violated("click_power_floor", "click power is 0".to_owned()));
    }
    if state.level == 0 {
        return Err(violated("level_floor", "level is 0".to_owned()));
    }
    if state.critical_chance.is_sign_negative() || state.critical_chance > Decimal::ONE {
        return Err(violated(
            "critical_chance_range",
            format!("critical chance {}", state.critical_chance),
        ));
    }
    if state.critical_multiplier == 0 {
        return Err(violated(
            "critical_multiplier_floor",
            "critical multiplier is 0".to_owned(),
        ));
    }
    let threshold = u64::from(state.level)
        .checked_mul(exp_factor)
        .ok_or(EconomyError::overflow("level threshold"))?;
    if state.experience >= threshold {
        return Err(violated(
            "experience_below_threshold",
            format!(
                "experience {} >= {threshold} at level {}",
                state.experience, state.level
            ),
        ));
    }
    Ok(())
}

/// Check that `after` is a legal successor of `before` given the ledger
/// entries the transition produced.
///
/// # Errors
///
/// Returns [`EconomyError::InvariantViolated`] naming the first broken rule.
pub fn check_transition(
    before: &ResourceState,
    after: &ResourceState,
    entries: &[LedgerEntry],
    exp_factor: u64,
) -> Result<(), EconomyError> {
    check_state(after, exp_factor)?;

    let delta = entries
        .iter()
        .try_fold(i128::from(before.stars), |acc, e| acc.checked_add(i128::from(e.amount)))
        .ok_or(EconomyError::overflow("ledger delta"))?;
    if delta != i128::from(after.stars) {
        return Err(violated(
            "ledger_identity",
            format!(
                "stars {} -> {} but entries sum to {delta}",
                before.stars, after.stars
            ),
        ));
    }

    let mut expected_sequence = before.ledger_sequence;
    let mut balance = before.stars;
    for entry in entries {
        expected_sequence = expected_sequence
            .checked_add(1)
            .ok_or(EconomyError::overflow("ledger sequence"))?;
        if entry.sequence != expected_sequence || entry.player_id != after.player_id {
            return Err(violated(
                "ledger_chain",
                format!(
                    "entry {} for {} where {expected_sequence} for {} was expected",
                    entry.sequence, entry.player_id, after.player_id
                ),
            ));
        }
        let computed = i128::from(balance)
            .checked_add(i128::from(entry.amount))
            .ok_or(EconomyError::overflow("ledger balance"))?;
        if computed != i128::from(entry.resulting_balance) {
            return Err(violated(
                "ledger_chain",
                format!(
                    "entry {} records {} but chain gives {computed}",
                    entry.sequence, entry.resulting_balance
                ),
            ));
        }
        balance = entry.resulting_balance;
    }
    if after.ledger_sequence != expected_sequence {
        return Err(violated(
            "ledger_sequence",
            format!(
                "state sequence {} but entries end at {expected_sequence}",
                after.ledger_sequence
            ),
        ));
    }

    if after.total_clicks < before.total_clicks {
        return Err(violated(
            "total_clicks_monotonic",
            format!("{} -> {}", before.total_clicks, after.total_clicks),
        ));
    }
    if !after.owned_upgrades.is_superset(&before.owned_upgrades) {
        return Err(violated(
            "owned_upgrades_monotonic",
            "an owned upgrade disappeared".to_owned(),
        ));
    }
    let before_unlocked: BTreeSet<_> = before.unlocked_achievements.keys().collect();
    let after_unlocked: BTreeSet<_> = after.unlocked_achievements.keys().collect();
    if !after_unlocked.is_superset(&before_unlocked) {
        return Err(violated(
            "achievements_monotonic",
            "an unlocked achievement disappeared".to_owned(),
        ));
    }
    Ok(())
}

/// Check that every booster in `state` is still running at `now` and that no
/// two share a kind.
///
/// # Errors
///
/// Returns [`EconomyError::InvariantViolated`] naming the first broken rule.
pub fn check_boosters(state: &ResourceState, now: DateTime<Utc>) -> Result<(), EconomyError> {
    let mut kinds = BTreeSet::new();
    for booster in &state.active_boosters {
        if !booster.is_active(now) {
            return Err(violated(
                "boosters_unexpired",
                format!("{} expired at {}", booster.booster_id, booster.expires_at),
            ));
        }
        if !kinds.insert(booster.kind) {
            return Err(violated(
                "booster_kind_unique",
                format!("second {:?} booster {}", booster.kind, booster.booster_id),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use starclick_ledger::EntryBuilder;
    use starclick_types::{
        ActiveBooster, AdStats, BoosterKind, CorrelationId, DailyRewardState, ItemId,
        LedgerEntryType, PlayerId, Statistics,
    };

    use super::*;

    fn state() -> ResourceState {
        let now = Utc::now();
        ResourceState {
            player_id: PlayerId::new(),
            stars: 1000,
            energy: 100,
            max_energy: 100,
            click_power: 1,
            passive_income: 5,
            total_clicks: 0,
            level: 1,
            experience: 0,
            critical_chance: Decimal::ZERO,
            critical_multiplier: 1,
            owned_upgrades: BTreeSet::new(),
            unlocked_achievements: std::collections::BTreeMap::new(),
            inventory: std::collections::BTreeMap::new(),
            active_boosters: Vec::new(),
            ad_stats: AdStats::new(now),
            daily: DailyRewardState::default(),
            referrals: BTreeSet::new(),
            referred_by: None,
            statistics: Statistics::default(),
            banned: false,
            ledger_sequence: 1,
            created_at: now,
            last_active_at: now,
            last_save: now,
            version: 1,
        }
    }

    fn click_entry(player: PlayerId, sequence: u64, amount: i64, balance: u64) -> LedgerEntry {
        EntryBuilder::new(player, LedgerEntryType::Click)
            .sequence(sequence)
            .amount(amount)
            .resulting_balance(balance)
            .reason("click".to_owned())
            .correlation(CorrelationId::new())
            .at(Utc::now())
            .build()
            .unwrap()
    }

    #[test]
    fn valid_state_passes() {
        assert!(check_state(&state(), 1000).is_ok());
    }

    #[test]
    fn energy_above_capacity_fails() {
        let mut s = state();
        s.energy = 101;
        let err = check_state(&s, 1000).err();
        assert!(matches!(
            err,
            Some(EconomyError::InvariantViolated {
                invariant: "energy_bound",
                ..
            })
        ));
    }

    #[test]
    fn unconsumed_experience_fails() {
        let mut s = state();
        s.experience = 1000;
        assert!(check_state(&s, 1000).is_err());
    }

    #[test]
    fn matching_entries_pass() {
        let before = state();
        let mut after = before.clone();
        after.stars = 1003;
        after.ledger_sequence = 2;
        let entries = vec![click_entry(before.player_id, 2, 3, 1003)];
        assert!(check_transition(&before, &after, &entries, 1000).is_ok());
    }

    #[test]
    fn silent_balance_change_fails() {
        let before = state();
        let mut after = before.clone();
        after.stars = 1003;
        let err = check_transition(&before, &after, &[], 1000).err();
        assert!(matches!(
            err,
            Some(EconomyError::InvariantViolated {
                invariant: "ledger_identity",
                ..
            })
        ));
    }

    #[test]
    fn lost_upgrade_fails() {
        let mut before = state();
        before.owned_upgrades.insert(ItemId::from("basic_click"));
        let after = state();
        let mut after = ResourceState {
            player_id: before.player_id,
            ..after
        };
        after.owned_upgrades.clear();
        assert!(check_transition(&before, &after, &[], 1000).is_err());
    }

    fn booster(kind: BoosterKind, expires_at: DateTime<Utc>) -> ActiveBooster {
        ActiveBooster {
            booster_id: ItemId::from("booster_2x_1h"),
            kind,
            multiplier: Decimal::TWO,
            activated_at: expires_at - TimeDelta::hours(1),
            expires_at,
        }
    }

    #[test]
    fn expired_booster_fails() {
        let now = Utc::now();
        let mut s = state();
        s.active_boosters.push(booster(BoosterKind::Click, now));
        let err = check_boosters(&s, now).err();
        assert!(matches!(
            err,
            Some(EconomyError::InvariantViolated {
                invariant: "boosters_unexpired",
                ..
            })
        ));
        assert!(check_boosters(&s, now - TimeDelta::seconds(1)).is_ok());
    }

    #[test]
    fn two_boosters_of_one_kind_fail() {
        let now = Utc::now();
        let later = now + TimeDelta::minutes(30);
        let mut s = state();
        s.active_boosters.push(booster(BoosterKind::Click, later));
        s.active_boosters.push(booster(BoosterKind::Passive, later));
        assert!(check_boosters(&s, now).is_ok());
        s.active_boosters.push(booster(BoosterKind::Click, later));
        let err = check_boosters(&s, now).err();
        assert!(matches!(
            err,
            Some(EconomyError::InvariantViolated {
                invariant: "booster_kind_unique",
                ..
            })
        ));
    }
}
