//! Domain events for the Turn Resolution context.
//!
//! Every event belongs to the stream of one `Game`.

use serde::{Deserialize, Serialize};
use storyloom_core::event::{DomainEvent, EventMetadata};
use uuid::Uuid;

use super::arguments::Argument;
use super::personas::Persona;
use super::phase::GamePhase;
use super::settings::GameSettings;
use super::token_pool::TokenDraw;
use super::votes::Vote;

/// The initiator's account of how an action turned out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narration {
    pub narration_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    /// The host who last edited the text, if any.
    pub edited_by: Option<Uuid>,
}

/// Emitted when a host starts a game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStarted {
    pub game_id: Uuid,
    pub host_id: Uuid,
    pub settings: GameSettings,
    pub personas: Vec<Persona>,
}

/// Emitted when a round begins. Takes a snapshot of the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundStarted {
    pub round_id: Uuid,
    pub round_number: u32,
    pub total_actions_required: u32,
}

/// Emitted when a player joins; effective from the next round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoined {
    pub player_id: Uuid,
    pub persona_id: Uuid,
    /// Set when the player created a new persona rather than joining one.
    pub new_persona_name: Option<String>,
}

/// Emitted when the host designates or clears the arbiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterDesignated {
    pub arbiter_id: Option<Uuid>,
}

/// Emitted when a persona's lead changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaLeadChanged {
    pub persona_id: Uuid,
    pub lead_player_id: Uuid,
}

/// Emitted when a persona lead proposes an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionProposed {
    pub action_id: Uuid,
    pub round_id: Uuid,
    pub sequence_number: u32,
    pub initiator_id: Uuid,
    pub persona_id: Uuid,
    pub description: String,
    pub desired_outcome: String,
    /// The initiator's opening `INITIATOR_FOR` argument.
    pub opening_argument: Argument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentAdded {
    pub action_id: Uuid,
    pub argument: Argument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentationMarkedComplete {
    pub action_id: Uuid,
    pub player_id: Uuid,
}

/// Emitted when argumentation ends, on quorum or by host skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentationClosed {
    pub action_id: Uuid,
    pub skipped: bool,
    pub next_phase: GamePhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentStrengthToggled {
    pub action_id: Uuid,
    pub argument_id: Uuid,
    pub is_strong: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterReviewCompleted {
    pub action_id: Uuid,
    pub next_phase: GamePhase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteCast {
    pub action_id: Uuid,
    pub vote: Vote,
}

/// Emitted when voting ends, on quorum or by host skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingClosed {
    pub action_id: Uuid,
    pub skipped: bool,
    pub next_phase: GamePhase,
}

/// Emitted once per action when its tokens are drawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensDrawn {
    pub action_id: Uuid,
    pub draw: TokenDraw,
    pub momentum_delta: i64,
}

/// Emitted when the initiator narrates; completes the action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationSubmitted {
    pub action_id: Uuid,
    pub narration: Narration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationEdited {
    pub action_id: Uuid,
    pub editor_id: Uuid,
    pub content: String,
}

/// Emitted when the host ends the proposal phase of a round early.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalsSkipped {
    pub round_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundCompleted {
    pub round_id: Uuid,
    pub round_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSummaryWritten {
    pub round_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
}

/// Event payload variants for the Turn Resolution context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GameEventKind {
    GameStarted(GameStarted),
    RoundStarted(RoundStarted),
    PlayerJoined(PlayerJoined),
    ArbiterDesignated(ArbiterDesignated),
    PersonaLeadChanged(PersonaLeadChanged),
    ActionProposed(ActionProposed),
    ArgumentAdded(ArgumentAdded),
    ArgumentationMarkedComplete(ArgumentationMarkedComplete),
    ArgumentationClosed(ArgumentationClosed),
    ArgumentStrengthToggled(ArgumentStrengthToggled),
    ArbiterReviewCompleted(ArbiterReviewCompleted),
    VoteCast(VoteCast),
    VotingClosed(VotingClosed),
    TokensDrawn(TokensDrawn),
    NarrationSubmitted(NarrationSubmitted),
    NarrationEdited(NarrationEdited),
    ProposalsSkipped(ProposalsSkipped),
    RoundCompleted(RoundCompleted),
    RoundSummaryWritten(RoundSummaryWritten),
}

impl GameEventKind {
    /// Type name stored alongside the payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::GameStarted(_) => "game.started",
            Self::RoundStarted(_) => "game.round_started",
            Self::PlayerJoined(_) => "game.player_joined",
            Self::ArbiterDesignated(_) => "game.arbiter_designated",
            Self::PersonaLeadChanged(_) => "game.persona_lead_changed",
            Self::ActionProposed(_) => "game.action_proposed",
            Self::ArgumentAdded(_) => "game.argument_added",
            Self::ArgumentationMarkedComplete(_) => "game.argumentation_marked_complete",
            Self::ArgumentationClosed(_) => "game.argumentation_closed",
            Self::ArgumentStrengthToggled(_) => "game.argument_strength_toggled",
            Self::ArbiterReviewCompleted(_) => "game.arbiter_review_completed",
            Self::VoteCast(_) => "game.vote_cast",
            Self::VotingClosed(_) => "game.voting_closed",
            Self::TokensDrawn(_) => "game.tokens_drawn",
            Self::NarrationSubmitted(_) => "game.narration_submitted",
            Self::NarrationEdited(_) => "game.narration_edited",
            Self::ProposalsSkipped(_) => "game.proposals_skipped",
            Self::RoundCompleted(_) => "game.round_completed",
            Self::RoundSummaryWritten(_) => "game.round_summary_written",
        }
    }
}

/// Domain event envelope for the Turn Resolution context.
#[derive(Debug, Clone)]
pub struct GameEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: GameEventKind,
}

impl DomainEvent for GameEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("GameEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
