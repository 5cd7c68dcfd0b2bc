//! Commands for the Turn Resolution context.
//!
//! Each command carries the resolved identity of the player issuing it.

use serde::Deserialize;
use storyloom_core::command::Command;
use uuid::Uuid;

use super::arguments::ArgumentType;
use super::settings::GameSettings;
use super::votes::VoteType;

macro_rules! impl_command {
    ($command:ty, $name:literal, $actor:ident) => {
        impl Command for $command {
            fn command_type(&self) -> &'static str {
                $name
            }

            fn correlation_id(&self) -> Uuid {
                self.correlation_id
            }

            fn actor_id(&self) -> Uuid {
                self.$actor
            }
        }
    };
}

/// A persona in the starting line-up of a game.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonaSpec {
    pub name: String,
    #[serde(default)]
    pub is_npc: bool,
    /// Defaults to the first member.
    #[serde(default)]
    pub lead_player_id: Option<Uuid>,
    pub member_ids: Vec<Uuid>,
}

/// Which persona a joining player takes part as.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JoinTarget {
    /// Share an existing persona.
    ExistingPersona { persona_id: Uuid },
    /// Create a new persona led by the player.
    NewPersona { name: String },
}

/// Command to start a game and its first round.
#[derive(Debug, Clone)]
pub struct StartGame {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub host_id: Uuid,
    pub settings: GameSettings,
    pub personas: Vec<PersonaSpec>,
}

impl_command!(StartGame, "game.start", host_id);

/// Command for a player to join a running game.
#[derive(Debug, Clone)]
pub struct JoinGame {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub player_id: Uuid,
    pub target: JoinTarget,
}

impl_command!(JoinGame, "game.join", player_id);

/// Command for the host to designate, or with `None` clear, the arbiter.
#[derive(Debug, Clone)]
pub struct DesignateArbiter {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub arbiter_id: Option<Uuid>,
}

impl_command!(DesignateArbiter, "game.designate_arbiter", actor_id);

/// Command for the host to change a persona's lead.
#[derive(Debug, Clone)]
pub struct SetPersonaLead {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub persona_id: Uuid,
    pub lead_player_id: Uuid,
}

impl_command!(SetPersonaLead, "game.set_persona_lead", actor_id);

/// Command for a persona lead to propose the persona's action.
#[derive(Debug, Clone)]
pub struct ProposeAction {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub persona_id: Uuid,
    pub description: String,
    pub desired_outcome: String,
    /// Becomes the free `INITIATOR_FOR` argument.
    pub opening_argument: String,
}

impl_command!(ProposeAction, "game.propose_action", actor_id);

#[derive(Debug, Clone)]
pub struct AddArgument {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub action_id: Uuid,
    pub argument_type: ArgumentType,
    pub content: String,
}

impl_command!(AddArgument, "game.add_argument", actor_id);

#[derive(Debug, Clone)]
pub struct CompleteArgumentation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub action_id: Uuid,
}

impl_command!(CompleteArgumentation, "game.complete_argumentation", actor_id);

/// Command for the arbiter to toggle an argument's strength.
#[derive(Debug, Clone)]
pub struct ReviewArgument {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub action_id: Uuid,
    pub argument_id: Uuid,
}

impl_command!(ReviewArgument, "game.review_argument", actor_id);

#[derive(Debug, Clone)]
pub struct CompleteArbiterReview {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub action_id: Uuid,
}

impl_command!(CompleteArbiterReview, "game.complete_arbiter_review", actor_id);

#[derive(Debug, Clone)]
pub struct CastVote {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub action_id: Uuid,
    pub vote_type: VoteType,
}

impl_command!(CastVote, "game.cast_vote", actor_id);

/// Command for the host to end a round's proposals early.
#[derive(Debug, Clone)]
pub struct SkipProposals {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub round_id: Uuid,
}

impl_command!(SkipProposals, "game.skip_proposals", actor_id);

#[derive(Debug, Clone)]
pub struct SkipArgumentation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub action_id: Uuid,
}

impl_command!(SkipArgumentation, "game.skip_argumentation", actor_id);

#[derive(Debug, Clone)]
pub struct SkipVoting {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub action_id: Uuid,
}

impl_command!(SkipVoting, "game.skip_voting", actor_id);

#[derive(Debug, Clone)]
pub struct DrawTokens {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub action_id: Uuid,
}

impl_command!(DrawTokens, "game.draw_tokens", actor_id);

#[derive(Debug, Clone)]
pub struct SubmitNarration {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub action_id: Uuid,
    pub content: String,
}

impl_command!(SubmitNarration, "game.submit_narration", actor_id);

/// Command for the host to rewrite a completed action's narration.
#[derive(Debug, Clone)]
pub struct EditNarration {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub action_id: Uuid,
    pub content: String,
}

impl_command!(EditNarration, "game.edit_narration", actor_id);

/// Command for the host to close the round-summary gate.
#[derive(Debug, Clone)]
pub struct WriteRoundSummary {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    pub game_id: Uuid,
    pub actor_id: Uuid,
    pub content: String,
}

impl_command!(WriteRoundSummary, "game.write_round_summary", actor_id);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_reports_type_and_actor() {
        let actor_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let command = CastVote {
            correlation_id,
            game_id: Uuid::new_v4(),
            actor_id,
            action_id: Uuid::new_v4(),
            vote_type: VoteType::Uncertain,
        };

        assert_eq!(command.command_type(), "game.cast_vote");
        assert_eq!(command.actor_id(), actor_id);
        assert_eq!(command.correlation_id(), correlation_id);
    }

    #[test]
    fn test_join_target_deserializes_tagged() {
        let json = serde_json::json!({ "kind": "new_persona", "name": "Wren" });

        let target: JoinTarget = serde_json::from_value(json).unwrap();

        match target {
            JoinTarget::NewPersona { name } => assert_eq!(name, "Wren"),
            other @ JoinTarget::ExistingPersona { .. } => {
                panic!("expected NewPersona, got {other:?}")
            }
        }
    }
}
