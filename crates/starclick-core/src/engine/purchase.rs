//! Purchase resolution for every item category.

use chrono::TimeDelta;
use rust_decimal::Decimal;

use starclick_types::{
    AchievementFamily, ActiveBooster, BoosterKind, EconomyEvent, ItemId, LedgerEntryType,
    PurchaseResult, ResourceState, Stat,
};

use super::click::ensure_not_banned;
use super::draft::{Draft, scale};
use super::progression::{resolve_levels, unlock_family};
use super::{CommandContext, EconomyEngine, Transition};
use crate::catalog::{ItemDef, ItemEffect, UpgradeBoost};
use crate::error::EconomyError;

impl EconomyEngine<'_> {
    /// Buy `quantity` units of a catalog item.
    ///
    /// Upgrades and bundles are bought one at a time. Buying boosters
    /// activates one unit and stocks the rest for [`Self::use_item`].
    /// Artifact bonuses apply at once unless the player has unequipped that
    /// artifact, in which case the new units wait for the next equip.
    /// The total cost is debited first, then the effect is applied, then
    /// `floor(total / exp_divisor)` experience is granted and levels and
    /// achievements are resolved.
    ///
    /// # Errors
    ///
    /// [`EconomyError::NotFound`], [`EconomyError::AlreadyOwned`],
    /// [`EconomyError::PrerequisiteNotMet`],
    /// [`EconomyError::BoosterAlreadyActive`],
    /// [`EconomyError::InsufficientFunds`], [`EconomyError::InvalidCommand`]
    /// for a bad quantity, [`EconomyError::Banned`], or an internal error.
    pub fn purchase(
        &self,
        state: &ResourceState,
        item_id: &ItemId,
        quantity: u32,
        ctx: &CommandContext,
    ) -> Result<Transition<PurchaseResult>, EconomyError> {
        ensure_not_banned(state)?;
        let item = self.catalog.item(item_id).ok_or_else(|| EconomyError::NotFound {
            id: item_id.to_string(),
        })?;
        let max_quantity = self.config.purchase.max_quantity;
        if quantity == 0 || quantity > max_quantity {
            return Err(EconomyError::invalid(format!(
                "quantity must be between 1 and {max_quantity}"
            )));
        }
        if quantity > 1 && !item.is_stackable() {
            return Err(EconomyError::invalid(format!(
                "{item_id} can only be bought one at a time"
            )));
        }

        let mut draft = Draft::new(state, ctx);
        self.check_purchasable(&draft.state, item, ctx)?;

        let total_cost = item
            .cost
            .checked_mul(u64::from(quantity))
            .ok_or(EconomyError::overflow("purchase cost"))?;
        draft.debit(
            LedgerEntryType::Purchase,
            total_cost,
            format!("purchase {} x{quantity}", item.name),
            Some(item_id.to_string()),
        )?;

        self.apply_effect(&mut draft, item, quantity)?;

        let experience_gained = total_cost
            .checked_div(self.config.purchase.exp_divisor)
            .unwrap_or(0);
        draft.state.experience = draft
            .state
            .experience
            .checked_add(experience_gained)
            .ok_or(EconomyError::overflow("experience"))?;

        resolve_levels(&mut draft, &self.config.leveling, self.catalog)?;
        unlock_family(&mut draft, self.catalog, AchievementFamily::Upgrades)?;
        if matches!(item.effect, ItemEffect::Bundle { .. }) {
            unlock_family(&mut draft, self.catalog, AchievementFamily::Stars)?;
        }

        tracing::debug!(
            player_id = %state.player_id,
            item = %item_id,
            quantity,
            total_cost,
            "purchase resolved"
        );
        draft.finish(
            self.config.leveling.exp_factor,
            PurchaseResult {
                item_id: item_id.clone(),
                category: item.category(),
                quantity,
                total_cost,
                experience_gained,
            },
        )
    }

    /// Ownership, prerequisite and booster-slot checks.
    fn check_purchasable(
        &self,
        state: &ResourceState,
        item: &ItemDef,
        ctx: &CommandContext,
    ) -> Result<(), EconomyError> {
        match &item.effect {
            ItemEffect::Upgrade { requires, .. } => {
                if state.owned_upgrades.contains(&item.id) {
                    return Err(EconomyError::AlreadyOwned {
                        item_id: item.id.clone(),
                    });
                }
                let missing: Vec<ItemId> = requires
                    .iter()
                    .filter(|req| !state.owned_upgrades.contains(*req))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    return Err(EconomyError::PrerequisiteNotMet {
                        item_id: item.id.clone(),
                        missing,
                    });
                }
            }
            ItemEffect::Booster { kind, .. } => {
                if state.has_active_booster(*kind, ctx.now) {
                    return Err(EconomyError::BoosterAlreadyActive { kind: *kind });
                }
            }
            ItemEffect::Bundle {
                boosters, limited, ..
            } => {
                if *limited && state.inventory_count(&item.id) > 0 {
                    return Err(EconomyError::AlreadyOwned {
                        item_id: item.id.clone(),
                    });
                }
                for booster in boosters {
                    if let Some(ItemEffect::Booster { kind, .. }) =
                        self.catalog.item(booster).map(|b| &b.effect)
                    {
                        if state.has_active_booster(*kind, ctx.now) {
                            return Err(EconomyError::BoosterAlreadyActive { kind: *kind });
                        }
                    }
                }
            }
            ItemEffect::EnergyPack { .. } | ItemEffect::Artifact { .. } => {}
        }
        Ok(())
    }

    fn apply_effect(
        &self,
        draft: &mut Draft<'_>,
        item: &ItemDef,
        quantity: u32,
    ) -> Result<(), EconomyError> {
        match &item.effect {
            ItemEffect::Upgrade { boost, .. } => {
                apply_upgrade(&mut draft.state, *boost)?;
                draft.state.owned_upgrades.insert(item.id.clone());
            }
            ItemEffect::EnergyPack { amount } => {
                let s = &mut draft.state;
                s.energy = match amount {
                    Some(per_unit) => per_unit
                        .checked_mul(quantity)
                        .map_or(s.max_energy, |gain| s.energy.saturating_add(gain))
                        .min(s.max_energy),
                    None => s.max_energy,
                };
            }
            ItemEffect::Booster {
                kind,
                multiplier,
                duration_secs,
            } => {
                activate_booster(draft, &item.id, *kind, *multiplier, *duration_secs)?;
                let stocked = quantity.saturating_sub(1);
                if stocked > 0 {
                    add_to_inventory(&mut draft.state, &item.id, stocked)?;
                }
            }
            ItemEffect::Artifact { stat, bonus } => {
                gain_artifact(&mut draft.state, &item.id, *stat, *bonus, quantity)?;
            }
            ItemEffect::Bundle {
                stars,
                boosters,
                artifacts,
                ..
            } => {
                draft.credit(
                    LedgerEntryType::BundleGrant,
                    *stars,
                    format!("{} contents", item.name),
                    Some(item.id.to_string()),
                )?;
                for booster_id in boosters {
                    if let Some(ItemEffect::Booster {
                        kind,
                        multiplier,
                        duration_secs,
                    }) = self.catalog.item(booster_id).map(|b| &b.effect)
                    {
                        activate_booster(draft, booster_id, *kind, *multiplier, *duration_secs)?;
                    }
                }
                for artifact_id in artifacts {
                    if let Some(ItemEffect::Artifact { stat, bonus }) =
                        self.catalog.item(artifact_id).map(|a| &a.effect)
                    {
                        gain_artifact(&mut draft.state, artifact_id, *stat, *bonus, 1)?;
                    }
                }
                add_to_inventory(&mut draft.state, &item.id, 1)?;
            }
        }
        Ok(())
    }
}

/// Additive part first, multiplicative part second.
fn apply_upgrade(state: &mut ResourceState, boost: UpgradeBoost) -> Result<(), EconomyError> {
    match boost {
        UpgradeBoost::Click { add, multiplier } => {
            let mut power = state
                .click_power
                .checked_add(add)
                .ok_or(EconomyError::overflow("click power"))?;
            if let Some(multiplier) = multiplier {
                power = power
                    .checked_mul(multiplier)
                    .ok_or(EconomyError::overflow("click power"))?;
            }
            state.click_power = power;
        }
        UpgradeBoost::Energy { add } => {
            state.max_energy = state
                .max_energy
                .checked_add(add)
                .ok_or(EconomyError::overflow("max energy"))?;
        }
        UpgradeBoost::Passive { add } => {
            state.passive_income = state
                .passive_income
                .checked_add(add)
                .ok_or(EconomyError::overflow("passive income"))?;
        }
        UpgradeBoost::Critical { chance, multiplier } => {
            state.critical_chance = state
                .critical_chance
                .checked_add(chance)
                .ok_or(EconomyError::overflow("critical chance"))?;
            state.critical_multiplier = multiplier;
        }
    }
    Ok(())
}

/// Add `count` units of an artifact. A new or equipped slot takes the
/// bonus at once and ends up equipped; an unequipped slot only grows.
fn gain_artifact(
    state: &mut ResourceState,
    artifact_id: &ItemId,
    stat: Stat,
    bonus: Decimal,
    count: u32,
) -> Result<(), EconomyError> {
    let equipped = state
        .inventory
        .get(artifact_id)
        .is_none_or(|slot| slot.count == 0 || slot.equipped);
    if equipped {
        for _ in 0..count {
            apply_artifact(state, stat, bonus)?;
        }
    }
    add_to_inventory(state, artifact_id, count)?;
    if let Some(slot) = state.inventory.get_mut(artifact_id) {
        slot.equipped = equipped;
    }
    Ok(())
}

/// `stat = floor(stat * (1 + bonus))`.
pub(super) fn apply_artifact(state: &mut ResourceState, stat: Stat, bonus: Decimal) -> Result<(), EconomyError> {
    let factor = Decimal::ONE
        .checked_add(bonus)
        .ok_or(EconomyError::overflow("artifact bonus"))?;
    match stat {
        Stat::ClickPower => {
            state.click_power =
                scale(state.click_power, factor).ok_or(EconomyError::overflow("click power"))?;
        }
        Stat::PassiveIncome => {
            state.passive_income = scale(state.passive_income, factor)
                .ok_or(EconomyError::overflow("passive income"))?;
        }
        Stat::MaxEnergy => {
            state.max_energy = scale(u64::from(state.max_energy), factor)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or(EconomyError::overflow("max energy"))?;
        }
    }
    Ok(())
}

pub(super) fn activate_booster(
    draft: &mut Draft<'_>,
    booster_id: &ItemId,
    kind: BoosterKind,
    multiplier: Decimal,
    duration_secs: u64,
) -> Result<(), EconomyError> {
    let now = draft.ctx().now;
    let expires_at = i64::try_from(duration_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or(EconomyError::overflow("booster expiry"))?;
    draft.state.active_boosters.push(ActiveBooster {
        booster_id: booster_id.clone(),
        kind,
        multiplier,
        activated_at: now,
        expires_at,
    });
    draft.event(EconomyEvent::BoosterActivated {
        booster_id: booster_id.clone(),
        kind,
        expires_at,
    });
    Ok(())
}

fn add_to_inventory(
    state: &mut ResourceState,
    item_id: &ItemId,
    count: u32,
) -> Result<(), EconomyError> {
    let slot = state.inventory.entry(item_id.clone()).or_default();
    slot.count = slot
        .count
        .checked_add(count)
        .ok_or(EconomyError::overflow("inventory count"))?;
    Ok(())
}
