//! Explicit command objects accepted by the economy service.
//!
//! Every mutating entry point of the service has a matching [`Command`]
//! variant so that commands can be queued, logged and replayed.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::AdType;
use crate::ids::{ItemId, PlayerId};

/// A single economy command for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Command {
    /// Create the player's initial state.
    Register,
    /// Resolve one tap.
    Click,
    /// Credit idle income since the last activity.
    ReconcileOffline,
    /// Buy a catalog item.
    Purchase {
        /// Catalog key.
        item_id: ItemId,
        /// Units to buy.
        #[serde(default = "one")]
        quantity: u32,
    },
    /// Grant a pre-validated ad reward.
    AdReward {
        /// Placement type.
        ad_type: AdType,
        /// Reward certified by the ad-validation collaborator.
        reward: u64,
    },
    /// Consume one stocked booster or energy pack.
    UseItem {
        /// Catalog key of the stocked item.
        item_id: ItemId,
    },
    /// Equip or unequip an owned artifact.
    ToggleArtifact {
        /// Catalog key of the artifact.
        item_id: ItemId,
    },
    /// Claim the daily login reward.
    DailyReward,
    /// Operator credit.
    AdminGrant {
        /// Stars to add.
        amount: u64,
        /// Operator note recorded in the ledger.
        note: String,
    },
    /// Operator debit.
    AdminRemove {
        /// Stars to remove.
        amount: u64,
        /// Operator note recorded in the ledger.
        note: String,
    },
    /// Credit this player for referring `referred`.
    Referral {
        /// The newly joined player.
        referred: PlayerId,
    },
    /// Ban or unban the player.
    SetBanned {
        /// New ban flag.
        banned: bool,
    },
    /// Scan every achievement family.
    ReevaluateAchievements,
}

const fn one() -> u32 {
    1
}

impl Command {
    /// Short name used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Click => "click",
            Self::ReconcileOffline => "reconcile_offline",
            Self::Purchase { .. } => "purchase",
            Self::UseItem { .. } => "use_item",
            Self::ToggleArtifact { .. } => "toggle_artifact",
            Self::AdReward { .. } => "ad_reward",
            Self::DailyReward => "daily_reward",
            Self::AdminGrant { .. } => "admin_grant",
            Self::AdminRemove { .. } => "admin_remove",
            Self::Referral { .. } => "referral",
            Self::SetBanned { .. } => "set_banned",
            Self::ReevaluateAchievements => "reevaluate_achievements",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_quantity_defaults_to_one() {
        let command: Option<Command> =
            serde_json::from_str(r#"{"type": "purchase", "item_id": "energy_small"}"#).ok();
        assert_eq!(
            command,
            Some(Command::Purchase {
                item_id: ItemId::from("energy_small"),
                quantity: 1,
            })
        );
    }

    #[test]
    fn unit_commands_parse_from_tag() {
        let command: Option<Command> = serde_json::from_str(r#"{"type": "click"}"#).ok();
        assert_eq!(command.as_ref().map(Command::name), Some("click"));
    }

    #[test]
    fn inventory_commands_parse_from_tag() {
        let command: Option<Command> =
            serde_json::from_str(r#"{"type": "toggle_artifact", "item_id": "artifact_click"}"#)
                .ok();
        assert_eq!(
            command,
            Some(Command::ToggleArtifact {
                item_id: ItemId::from("artifact_click"),
            })
        );
        assert_eq!(command.as_ref().map(Command::name), Some("toggle_artifact"));
    }
}
