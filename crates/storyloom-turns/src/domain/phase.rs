//! Game phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The phase a game is in.
///
/// `Proposal` and `RoundSummary` have no open action; every other phase
/// belongs to exactly one open action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Waiting for the next persona to propose an action.
    Proposal,
    /// Players argue for and against the open action.
    Argumentation,
    /// The arbiter marks strong arguments (arbiter strategy only).
    ArbiterReview,
    /// Players vote on the likelihood of success.
    Voting,
    /// Tokens are drawn from the pool.
    Resolution,
    /// The initiator narrates the outcome.
    Narration,
    /// The round is over; waiting for the host's summary.
    RoundSummary,
}

impl GamePhase {
    /// Snake-case name used in errors, views and notifications.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposal => "proposal",
            Self::Argumentation => "argumentation",
            Self::ArbiterReview => "arbiter_review",
            Self::Voting => "voting",
            Self::Resolution => "resolution",
            Self::Narration => "narration",
            Self::RoundSummary => "round_summary",
        }
    }

    /// Whether an action is open while the game is in this phase.
    #[must_use]
    pub fn has_open_action(self) -> bool {
        !matches!(self, Self::Proposal | Self::RoundSummary)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders an optional phase the way errors and notifications show it.
#[must_use]
pub fn phase_name(phase: Option<GamePhase>) -> &'static str {
    phase.map_or("not_started", GamePhase::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_action_phases_have_open_action() {
        assert!(!GamePhase::Proposal.has_open_action());
        assert!(!GamePhase::RoundSummary.has_open_action());
        assert!(GamePhase::Argumentation.has_open_action());
        assert!(GamePhase::ArbiterReview.has_open_action());
        assert!(GamePhase::Voting.has_open_action());
        assert!(GamePhase::Resolution.has_open_action());
        assert!(GamePhase::Narration.has_open_action());
    }

    #[test]
    fn test_serialized_name_matches_as_str() {
        let json = serde_json::to_value(GamePhase::ArbiterReview).unwrap();
        assert_eq!(json, "arbiter_review");
        assert_eq!(GamePhase::ArbiterReview.to_string(), "arbiter_review");
        assert_eq!(phase_name(None), "not_started");
    }
}
