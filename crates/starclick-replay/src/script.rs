//! Replay scripts.
//!
//! A script names its players once and then lists timestamped commands:
//!
//! ```json
//! {
//!   "players": { "alice": "0195b3c0-0000-7000-8000-000000000001" },
//!   "steps": [
//!     { "player": "alice", "at": "2025-03-01T12:00:00Z", "command": { "type": "register" } },
//!     { "player": "alice", "at": "2025-03-01T12:00:05Z", "command": { "type": "click" } }
//!   ]
//! }
//! ```
//!
//! Labels keep scripts readable; the UUIDs keep replays reproducible and
//! let a `referral` command name another scripted player.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use starclick_types::{Command, PlayerId};

/// Errors that can occur when loading a script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Failed to read the script file.
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),

    /// The script is not valid JSON for this format.
    #[error("failed to parse script: {0}")]
    Json(#[from] serde_json::Error),

    /// A step names a player that is not declared.
    #[error("step {step} uses undeclared player {label:?}")]
    UnknownPlayer {
        /// One-based step number.
        step: usize,
        /// The undeclared label.
        label: String,
    },

    /// Two labels map to the same player id.
    #[error("players {first:?} and {second:?} share id {player_id}")]
    DuplicatePlayer {
        /// First label.
        first: String,
        /// Second label.
        second: String,
        /// The shared id.
        player_id: PlayerId,
    },
}

/// One scripted command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Step {
    /// Label of the acting player.
    pub player: String,
    /// Clock reading when the command runs.
    pub at: DateTime<Utc>,
    /// The command.
    pub command: Command,
}

/// A validated replay script.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Script {
    /// Player labels and their ids.
    pub players: BTreeMap<String, PlayerId>,
    /// Commands in execution order.
    pub steps: Vec<Step>,
}

impl Script {
    /// Read and validate a script file.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] if the file cannot be read, parsed or
    /// validated.
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate a script from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] if the JSON is malformed, a step uses an
    /// undeclared label, or two labels share an id.
    pub fn parse(json: &str) -> Result<Self, ScriptError> {
        let script: Self = serde_json::from_str(json)?;

        let mut seen: BTreeMap<PlayerId, &str> = BTreeMap::new();
        for (label, player_id) in &script.players {
            if let Some(first) = seen.insert(*player_id, label) {
                return Err(ScriptError::DuplicatePlayer {
                    first: first.to_owned(),
                    second: label.clone(),
                    player_id: *player_id,
                });
            }
        }
        for (index, step) in script.steps.iter().enumerate() {
            if !script.players.contains_key(&step.player) {
                return Err(ScriptError::UnknownPlayer {
                    step: index.saturating_add(1),
                    label: step.player.clone(),
                });
            }
        }
        Ok(script)
    }

    /// The id behind a declared label.
    pub fn player_id(&self, label: &str) -> Option<PlayerId> {
        self.players.get(label).copied()
    }

    /// When the first step runs, if there is one.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.steps.first().map(|step| step.at)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const ALICE: &str = "0195b3c0-0000-7000-8000-000000000001";
    const BOB: &str = "0195b3c0-0000-7000-8000-000000000002";

    #[test]
    fn parses_labels_and_commands() {
        let json = format!(
            r#"{{
                "players": {{ "alice": "{ALICE}", "bob": "{BOB}" }},
                "steps": [
                    {{ "player": "alice", "at": "2025-03-01T12:00:00Z", "command": {{ "type": "register" }} }},
                    {{ "player": "alice", "at": "2025-03-01T12:00:01Z",
                       "command": {{ "type": "purchase", "item_id": "basic_click" }} }},
                    {{ "player": "alice", "at": "2025-03-01T12:00:02Z",
                       "command": {{ "type": "referral", "referred": "{BOB}" }} }}
                ]
            }}"#
        );
        let script = Script::parse(&json).unwrap();
        assert_eq!(script.steps.len(), 3);
        assert_eq!(script.steps[0].command, Command::Register);
        assert!(matches!(
            &script.steps[1].command,
            Command::Purchase { quantity: 1, .. }
        ));
        assert_eq!(
            script.steps[2].command,
            Command::Referral {
                referred: script.player_id("bob").unwrap()
            }
        );
        assert_eq!(script.start(), Some(script.steps[0].at));
    }

    #[test]
    fn rejects_undeclared_player() {
        let json = format!(
            r#"{{
                "players": {{ "alice": "{ALICE}" }},
                "steps": [ {{ "player": "carol", "at": "2025-03-01T12:00:00Z", "command": {{ "type": "click" }} }} ]
            }}"#
        );
        assert!(matches!(
            Script::parse(&json),
            Err(ScriptError::UnknownPlayer { step: 1, .. })
        ));
    }

    #[test]
    fn rejects_shared_ids() {
        let json = format!(
            r#"{{ "players": {{ "alice": "{ALICE}", "alias": "{ALICE}" }}, "steps": [] }}"#
        );
        assert!(matches!(
            Script::parse(&json),
            Err(ScriptError::DuplicatePlayer { .. })
        ));
    }
}
