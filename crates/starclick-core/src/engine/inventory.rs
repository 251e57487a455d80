//! Stocked items and artifact equipment.
//!
//! The inventory holds boosters bought beyond the one activated at purchase
//! time and every artifact unit owned. Using a booster or energy pack
//! consumes one unit. Toggling an artifact applies or removes
//! the bonus of every unit in its slot.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use starclick_types::{ArtifactToggleResult, ItemId, ItemUseResult, ResourceState, Stat};

use super::click::ensure_not_banned;
use super::draft::Draft;
use super::purchase::{activate_booster, apply_artifact};
use super::{CommandContext, EconomyEngine, Transition};
use crate::catalog::{ItemDef, ItemEffect};
use crate::config::MIN_MAX_ENERGY;
use crate::error::EconomyError;

impl EconomyEngine<'_> {
    /// Consume one stocked unit of a booster or energy pack.
    ///
    /// A booster is activated as if just bought; an energy pack restores
    /// energy up to capacity. The slot disappears with its last unit.
    ///
    /// # Errors
    ///
    /// [`EconomyError::NotFound`] for an unknown item,
    /// [`EconomyError::InvalidCommand`] if none is stocked or the item is
    /// not consumable, [`EconomyError::BoosterAlreadyActive`],
    /// [`EconomyError::Banned`], or an internal error.
    pub fn use_item(
        &self,
        state: &ResourceState,
        item_id: &ItemId,
        ctx: &CommandContext,
    ) -> Result<Transition<ItemUseResult>, EconomyError> {
        ensure_not_banned(state)?;
        let item = self.owned_item(state, item_id)?;

        let mut draft = Draft::new(state, ctx);
        let mut energy_restored = 0;
        match &item.effect {
            ItemEffect::Booster {
                kind,
                multiplier,
                duration_secs,
            } => {
                if draft.state.has_active_booster(*kind, ctx.now) {
                    return Err(EconomyError::BoosterAlreadyActive { kind: *kind });
                }
                activate_booster(&mut draft, item_id, *kind, *multiplier, *duration_secs)?;
            }
            ItemEffect::EnergyPack { amount } => {
                let s = &mut draft.state;
                let headroom = s.max_energy.saturating_sub(s.energy);
                energy_restored = amount.map_or(headroom, |a| a.min(headroom));
                s.energy = s.energy.saturating_add(energy_restored);
            }
            ItemEffect::Upgrade { .. } | ItemEffect::Artifact { .. } | ItemEffect::Bundle { .. } => {
                return Err(EconomyError::invalid(format!("{item_id} cannot be used")));
            }
        }

        let remaining = match draft.state.inventory.get_mut(item_id) {
            Some(slot) => {
                slot.count = slot.count.saturating_sub(1);
                slot.count
            }
            None => 0,
        };
        if remaining == 0 {
            draft.state.inventory.remove(item_id);
        }

        tracing::debug!(
            player_id = %state.player_id,
            item = %item_id,
            remaining,
            energy_restored,
            "item used"
        );
        draft.finish(
            self.config.leveling.exp_factor,
            ItemUseResult {
                item_id: item_id.clone(),
                category: item.category(),
                remaining,
                energy_restored,
            },
        )
    }

    /// Equip or unequip an owned artifact.
    ///
    /// Unequipping divides the stat by `1 + bonus` once per unit, flooring
    /// each step, then clamps click power to at least 1, capacity to the
    /// minimum and energy to the new capacity. Equipping multiplies it back.
    /// Floors on both sides mean a round trip can lose a little.
    ///
    /// # Errors
    ///
    /// [`EconomyError::NotFound`] for an unknown item,
    /// [`EconomyError::InvalidCommand`] if it is not an owned artifact,
    /// [`EconomyError::Banned`], or an internal error.
    pub fn toggle_artifact(
        &self,
        state: &ResourceState,
        item_id: &ItemId,
        ctx: &CommandContext,
    ) -> Result<Transition<ArtifactToggleResult>, EconomyError> {
        ensure_not_banned(state)?;
        let item = self.owned_item(state, item_id)?;
        let &ItemEffect::Artifact { stat, bonus } = &item.effect else {
            return Err(EconomyError::invalid(format!("{item_id} is not an artifact")));
        };

        let mut draft = Draft::new(state, ctx);
        let slot = draft.state.inventory.get(item_id).copied().unwrap_or_default();
        let equipped = !slot.equipped;
        for _ in 0..slot.count {
            if equipped {
                apply_artifact(&mut draft.state, stat, bonus)?;
            } else {
                remove_artifact(&mut draft.state, stat, bonus)?;
            }
        }
        let s = &mut draft.state;
        s.click_power = s.click_power.max(1);
        s.max_energy = s.max_energy.max(MIN_MAX_ENERGY);
        s.energy = s.energy.min(s.max_energy);
        if let Some(slot) = s.inventory.get_mut(item_id) {
            slot.equipped = equipped;
        }

        tracing::debug!(
            player_id = %state.player_id,
            item = %item_id,
            equipped,
            count = slot.count,
            "artifact toggled"
        );
        draft.finish(
            self.config.leveling.exp_factor,
            ArtifactToggleResult {
                item_id: item_id.clone(),
                equipped,
                count: slot.count,
            },
        )
    }

    /// The catalog entry for an item the player holds at least one unit of.
    fn owned_item(&self, state: &ResourceState, item_id: &ItemId) -> Result<&ItemDef, EconomyError> {
        let item = self.catalog.item(item_id).ok_or_else(|| EconomyError::NotFound {
            id: item_id.to_string(),
        })?;
        if state.inventory_count(item_id) == 0 {
            return Err(EconomyError::invalid(format!("no {item_id} in inventory")));
        }
        Ok(item)
    }
}

/// `stat = floor(stat / (1 + bonus))`.
fn remove_artifact(state: &mut ResourceState, stat: Stat, bonus: Decimal) -> Result<(), EconomyError> {
    let factor = Decimal::ONE
        .checked_add(bonus)
        .ok_or(EconomyError::overflow("artifact bonus"))?;
    let unscale = |value: u64| {
        Decimal::from(value)
            .checked_div(factor)
            .and_then(|v| v.floor().to_u64())
            .ok_or(EconomyError::overflow("artifact removal"))
    };
    match stat {
        Stat::ClickPower => state.click_power = unscale(state.click_power)?,
        Stat::PassiveIncome => state.passive_income = unscale(state.passive_income)?,
        Stat::MaxEnergy => {
            state.max_energy = u32::try_from(unscale(u64::from(state.max_energy))?)
                .ok()
                .ok_or(EconomyError::overflow("max energy"))?;
        }
    }
    Ok(())
}
