//! Economy engine error taxonomy.
//!
//! Every engine failure is a plain value: the engine computes into a
//! candidate state and returns `Err` without touching the caller's state,
//! so a failed command never leaves a partial mutation behind.
//!
//! Each variant maps to a stable machine-readable code via
//! [`EconomyError::code`]. Internal failures (overflow, invariant breaches,
//! ledger rejections) are reported to players with a generic message.

use serde::Serialize;

use starclick_ledger::LedgerError;
use starclick_types::{AdType, BoosterKind, ItemId, PlayerId};

/// Errors produced by the economy engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EconomyError {
    /// The player is banned.
    #[error("player is banned")]
    Banned,

    /// Not enough energy for the action.
    #[error("insufficient energy: need {required}, have {available}")]
    InsufficientEnergy {
        /// Energy the action needs.
        required: u32,
        /// Energy the player has.
        available: u32,
    },

    /// Not enough stars for the action.
    #[error("insufficient stars: need {required}, have {available}")]
    InsufficientFunds {
        /// Stars the action needs.
        required: u64,
        /// Stars the player has.
        available: u64,
    },

    /// The item is a one-time purchase the player already made.
    #[error("{item_id} is already owned")]
    AlreadyOwned {
        /// The item.
        item_id: ItemId,
    },

    /// The item requires upgrades the player does not own.
    #[error("{item_id} requires {missing:?}")]
    PrerequisiteNotMet {
        /// The item.
        item_id: ItemId,
        /// Required upgrades not yet owned.
        missing: Vec<ItemId>,
    },

    /// A booster of the same kind is still running.
    #[error("a {kind:?} booster is already active")]
    BoosterAlreadyActive {
        /// The booster kind.
        kind: BoosterKind,
    },

    /// Unknown catalog id.
    #[error("unknown catalog id: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A per-day limit has been reached.
    #[error("daily limit of {limit} reached")]
    DailyLimitReached {
        /// The limit.
        limit: u32,
    },

    /// The ad type was watched too recently.
    #[error("{} is cooling down for {remaining_secs}s", .ad_type.as_str())]
    AdCooldown {
        /// The ad type.
        ad_type: AdType,
        /// Seconds until the next view is accepted.
        remaining_secs: u64,
    },

    /// The command's arguments are malformed.
    #[error("invalid command: {reason}")]
    InvalidCommand {
        /// What is wrong.
        reason: String,
    },

    /// The referred player was already credited.
    #[error("player {referred} was already referred")]
    AlreadyReferred {
        /// The referred player.
        referred: PlayerId,
    },

    /// A counter would exceed its range.
    #[error("arithmetic overflow in {context}")]
    ArithmeticOverflow {
        /// Where the overflow happened.
        context: &'static str,
    },

    /// A post-transition invariant check failed.
    #[error("invariant violated ({invariant}): {detail}")]
    InvariantViolated {
        /// Short invariant name.
        invariant: &'static str,
        /// Offending values.
        detail: String,
    },

    /// A ledger entry failed validation.
    #[error("ledger rejected entry: {0}")]
    Ledger(#[from] LedgerError),
}

impl EconomyError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Banned => "BANNED",
            Self::InsufficientEnergy { .. } => "INSUFFICIENT_ENERGY",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::AlreadyOwned { .. } => "ALREADY_OWNED",
            Self::PrerequisiteNotMet { .. } => "PREREQUISITE_NOT_MET",
            Self::BoosterAlreadyActive { .. } => "BOOSTER_ALREADY_ACTIVE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DailyLimitReached { .. } => "DAILY_LIMIT_REACHED",
            Self::AdCooldown { .. } => "AD_COOLDOWN",
            Self::InvalidCommand { .. } => "INVALID_COMMAND",
            Self::AlreadyReferred { .. } => "ALREADY_REFERRED",
            Self::ArithmeticOverflow { .. } => "ARITHMETIC_OVERFLOW",
            Self::InvariantViolated { .. } => "INVARIANT_VIOLATED",
            Self::Ledger(_) => "LEDGER_REJECTED",
        }
    }

    /// Whether the failure indicates a defect rather than a player mistake.
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::ArithmeticOverflow { .. } | Self::InvariantViolated { .. } | Self::Ledger(_)
        )
    }

    /// Shorthand for [`EconomyError::InvalidCommand`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`EconomyError::ArithmeticOverflow`].
    pub const fn overflow(context: &'static str) -> Self {
        Self::ArithmeticOverflow { context }
    }

    /// User-facing representation.
    pub fn body(&self) -> ErrorBody {
        let message = if self.is_internal() {
            "internal error".to_owned()
        } else {
            self.to_string()
        };
        ErrorBody {
            code: self.code(),
            message,
        }
    }
}

/// JSON error body returned to players: a stable code plus a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let err = EconomyError::InsufficientEnergy {
            required: 1,
            available: 0,
        };
        assert_eq!(err.code(), "INSUFFICIENT_ENERGY");
        assert_eq!(
            EconomyError::BoosterAlreadyActive {
                kind: BoosterKind::Click
            }
            .code(),
            "BOOSTER_ALREADY_ACTIVE"
        );
    }

    #[test]
    fn player_errors_keep_their_message() {
        let body = EconomyError::InsufficientFunds {
            required: 500,
            available: 20,
        }
        .body();
        assert_eq!(body.code, "INSUFFICIENT_FUNDS");
        assert_eq!(body.message, "insufficient stars: need 500, have 20");
    }

    #[test]
    fn internal_errors_hide_details() {
        let body = EconomyError::InvariantViolated {
            invariant: "energy_bound",
            detail: "energy 120 > max 100".to_owned(),
        }
        .body();
        assert_eq!(body.code, "INVARIANT_VIOLATED");
        assert_eq!(body.message, "internal error");
    }

    #[test]
    fn ad_cooldown_message_names_ad_type() {
        let err = EconomyError::AdCooldown {
            ad_type: AdType::Banner,
            remaining_secs: 12,
        };
        assert_eq!(err.to_string(), "banner is cooling down for 12s");
    }
}
