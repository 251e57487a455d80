//! JSON lines written to stdout while replaying.

use chrono::{DateTime, Utc};
use serde::Serialize;

use starclick_core::{ErrorBody, Transition};
use starclick_ledger::ReconciliationResult;
use starclick_service::ServiceError;
use starclick_types::{
    BalanceSummary, CommandOutcome, EconomyEvent, LedgerEntry, PlayerId, ResourceState,
};

/// The result of one scripted command.
#[derive(Debug, Serialize)]
pub struct StepReport<'a> {
    /// One-based step number.
    pub step: usize,
    /// Label of the acting player.
    pub player: &'a str,
    /// Clock reading the command ran at.
    pub at: DateTime<Utc>,
    /// Command name.
    pub command: &'static str,
    /// Outcome, when the command succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<&'a CommandOutcome>,
    /// Balance after the command, when it succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stars: Option<u64>,
    /// Events raised by the command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<&'a [EconomyEvent]>,
    /// Error body, when the command was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<'a> StepReport<'a> {
    /// Describe a command result.
    pub fn new(
        step: usize,
        player: &'a str,
        at: DateTime<Utc>,
        command: &'static str,
        result: &'a Result<Transition<CommandOutcome>, ServiceError>,
    ) -> Self {
        match result {
            Ok(transition) => Self {
                step,
                player,
                at,
                command,
                outcome: Some(&transition.outcome),
                stars: Some(transition.state.stars),
                events: (!transition.events.is_empty()).then_some(transition.events.as_slice()),
                error: None,
            },
            Err(error) => Self {
                step,
                player,
                at,
                command,
                outcome: None,
                stars: None,
                events: None,
                error: Some(error.body()),
            },
        }
    }
}

/// Final state, ledger and audit verdict for one player.
#[derive(Debug, Serialize)]
pub struct PlayerReport<'a> {
    /// Script label.
    pub player: &'a str,
    /// Player id.
    pub player_id: PlayerId,
    /// Final state.
    pub state: &'a ResourceState,
    /// Income and spending totals.
    pub summary: BalanceSummary,
    /// Every ledger entry in sequence order.
    pub ledger: &'a [LedgerEntry],
    /// `"balanced"` or a description of the anomaly.
    pub verdict: String,
}

/// Render a reconciliation result for the report.
pub fn verdict(result: &ReconciliationResult) -> String {
    match result {
        ReconciliationResult::Balanced => "balanced".to_owned(),
        ReconciliationResult::Anomaly(anomaly) => anomaly.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    use starclick_core::EconomyError;

    #[test]
    fn rejected_step_carries_error_body_only() {
        let result: Result<Transition<CommandOutcome>, ServiceError> =
            Err(ServiceError::Economy(EconomyError::Banned));
        let at = DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let report = StepReport::new(3, "alice", at, "click", &result);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["step"], 3);
        assert_eq!(json["command"], "click");
        assert_eq!(json["error"]["code"], "BANNED");
        assert!(json.get("outcome").is_none());
        assert!(json.get("events").is_none());
    }

    #[test]
    fn balanced_verdict() {
        assert_eq!(verdict(&ReconciliationResult::Balanced), "balanced");
    }
}
