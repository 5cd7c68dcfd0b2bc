//! Per-game settings.
//!
//! Every field has a default so a partial JSON body deserializes into a
//! complete configuration.

use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;

use super::phase::GamePhase;

/// Timeout value meaning "this phase never expires".
pub const NO_TIME_LIMIT: i32 = -1;

/// How tokens get drawn once an action reaches resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// The initiator draws from the vote-built pool.
    #[default]
    TokenDraw,
    /// An arbiter reviews arguments, then draws.
    Arbiter,
}

/// Where the game goes after the arbiter completes a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbiterReviewOutcome {
    /// Players vote before the draw.
    #[default]
    ProceedToVoting,
    /// The arbiter draws straight away.
    DrawImmediately,
}

/// Who votes for a persona with several members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingMode {
    /// Every member votes and counts toward quorum.
    #[default]
    EachMember,
    /// Only the lead votes.
    OnePerPersona,
}

/// How argument limits apply to a persona with several members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentMode {
    /// Each member has their own limit.
    #[default]
    Independent,
    /// Members share one limit attributed to the persona.
    SharedPool,
}

/// Per-phase timeouts in hours; `-1` disables a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTimeouts {
    pub proposal_hours: i32,
    pub argumentation_hours: i32,
    pub arbiter_review_hours: i32,
    pub voting_hours: i32,
    pub resolution_hours: i32,
    pub narration_hours: i32,
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self {
            proposal_hours: NO_TIME_LIMIT,
            argumentation_hours: 24,
            arbiter_review_hours: NO_TIME_LIMIT,
            voting_hours: 24,
            resolution_hours: NO_TIME_LIMIT,
            narration_hours: NO_TIME_LIMIT,
        }
    }
}

impl PhaseTimeouts {
    /// The configured timeout for a phase. The round-summary gate never
    /// expires.
    #[must_use]
    pub fn hours_for(&self, phase: GamePhase) -> i32 {
        match phase {
            GamePhase::Proposal => self.proposal_hours,
            GamePhase::Argumentation => self.argumentation_hours,
            GamePhase::ArbiterReview => self.arbiter_review_hours,
            GamePhase::Voting => self.voting_hours,
            GamePhase::Resolution => self.resolution_hours,
            GamePhase::Narration => self.narration_hours,
            GamePhase::RoundSummary => NO_TIME_LIMIT,
        }
    }

    fn all(&self) -> [(&'static str, i32); 6] {
        [
            ("proposal_hours", self.proposal_hours),
            ("argumentation_hours", self.argumentation_hours),
            ("arbiter_review_hours", self.arbiter_review_hours),
            ("voting_hours", self.voting_hours),
            ("resolution_hours", self.resolution_hours),
            ("narration_hours", self.narration_hours),
        ]
    }
}

/// Shared-persona behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedPersonaSettings {
    /// Whether a persona may have more than one member.
    pub allow_shared_personas: bool,
    pub voting_mode: VotingMode,
    pub argument_mode: ArgumentMode,
}

/// Settings fixed when a game starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Arguments (other than the initiator's opening one) allowed per
    /// player, or per persona under a shared pool, per action.
    pub argument_limit: u32,
    pub resolution_method: ResolutionMethod,
    pub arbiter_review_outcome: ArbiterReviewOutcome,
    pub timeouts: PhaseTimeouts,
    pub shared_personas: SharedPersonaSettings,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            argument_limit: 3,
            resolution_method: ResolutionMethod::default(),
            arbiter_review_outcome: ArbiterReviewOutcome::default(),
            timeouts: PhaseTimeouts::default(),
            shared_personas: SharedPersonaSettings::default(),
        }
    }
}

impl GameSettings {
    /// Checks values serde cannot rule out on its own.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a timeout is neither `-1` nor a
    /// positive number of hours.
    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, hours) in self.timeouts.all() {
            if hours != NO_TIME_LIMIT && hours <= 0 {
                return Err(DomainError::Validation(format!(
                    "timeouts.{name} must be -1 or a positive number of hours, got {hours}"
                )));
            }
        }
        Ok(())
    }
}
