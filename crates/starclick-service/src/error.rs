//! Service-level errors.
//!
//! [`ServiceError`] wraps engine rejections and adds the failures that only
//! exist once state is shared and persisted: lock contention, deadlines,
//! version conflicts and storage outages. Every variant has a stable code
//! and a player-safe [`ErrorBody`].

use starclick_core::{EconomyError, ErrorBody};
use starclick_db::GatewayError;
use starclick_types::PlayerId;

/// Errors returned by [`EconomyService`](crate::EconomyService).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The engine rejected the command.
    #[error(transparent)]
    Economy(#[from] EconomyError),

    /// No state is stored for the player.
    #[error("player {player_id} not found")]
    PlayerNotFound {
        /// The unknown player.
        player_id: PlayerId,
    },

    /// The player already has stored state.
    #[error("player {player_id} is already registered")]
    AlreadyRegistered {
        /// The existing player.
        player_id: PlayerId,
    },

    /// Every attempt lost the optimistic-concurrency race.
    #[error("version conflict for player {player_id} after {attempts} attempts")]
    Conflict {
        /// The contended player.
        player_id: PlayerId,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// The command deadline passed before the command could be applied.
    #[error("command for player {player_id} timed out")]
    Timeout {
        /// The player the command was for.
        player_id: PlayerId,
    },

    /// Another command holds the player's lock and the guard rejects
    /// waiters.
    #[error("player {player_id} is busy")]
    Busy {
        /// The contended player.
        player_id: PlayerId,
    },

    /// State was saved but its ledger entries could not be appended.
    ///
    /// The entries stay in the snapshot's outbox and are appended before
    /// the player's next command.
    #[error("ledger unavailable for player {player_id}: {source}")]
    LedgerUnavailable {
        /// The player whose entries are pending.
        player_id: PlayerId,
        /// The recorder failure.
        #[source]
        source: GatewayError,
    },

    /// Loading or saving state failed.
    #[error("persistence error: {0}")]
    Persistence(#[source] GatewayError),
}

impl ServiceError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Economy(e) => e.code(),
            Self::PlayerNotFound { .. } => "PLAYER_NOT_FOUND",
            Self::AlreadyRegistered { .. } => "ALREADY_REGISTERED",
            Self::Conflict { .. } => "VERSION_CONFLICT",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Busy { .. } => "BUSY",
            Self::LedgerUnavailable { .. } => "LEDGER_UNAVAILABLE",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// User-facing representation. Storage details are never exposed.
    pub fn body(&self) -> ErrorBody {
        let message = match self {
            Self::Economy(e) => return e.body(),
            Self::LedgerUnavailable { .. } => "ledger temporarily unavailable".to_owned(),
            Self::Persistence(_) => "storage temporarily unavailable".to_owned(),
            other => other.to_string(),
        };
        ErrorBody {
            code: self.code(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use starclick_db::DbError;

    use super::*;

    #[test]
    fn engine_errors_keep_their_code() {
        let err = ServiceError::from(EconomyError::Banned);
        assert_eq!(err.code(), "BANNED");
        assert_eq!(err.body(), EconomyError::Banned.body());
    }

    #[test]
    fn storage_details_are_hidden() {
        let err = ServiceError::Persistence(GatewayError::Backend(DbError::Config(
            "postgres://secret@host".to_owned(),
        )));
        let body = err.body();
        assert_eq!(body.code, "PERSISTENCE_ERROR");
        assert!(!body.message.contains("secret"));
    }

    #[test]
    fn contention_codes_are_stable() {
        let player_id = PlayerId::new();
        assert_eq!(ServiceError::Busy { player_id }.code(), "BUSY");
        assert_eq!(ServiceError::Timeout { player_id }.code(), "TIMEOUT");
        assert_eq!(
            ServiceError::Conflict {
                player_id,
                attempts: 4
            }
            .code(),
            "VERSION_CONFLICT"
        );
    }
}
