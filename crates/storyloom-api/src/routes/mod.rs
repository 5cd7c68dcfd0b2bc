//! Route modules.
//!
//! `games` carries game-level commands and queries; `turns` carries the
//! commands addressed to one action of a game.

use serde::Serialize;
use storyloom_turns::application::command_handlers::TurnCommandResult;
use storyloom_turns::domain::aggregates::TurnOutcome;
use uuid::Uuid;

pub mod games;
pub mod health;
pub mod turns;

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// The game the command applied to.
    pub game_id: Uuid,
    /// Phase, open action and progress after the command.
    #[serde(flatten)]
    pub outcome: TurnOutcome,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

impl From<TurnCommandResult> for CommandResponse {
    fn from(result: TurnCommandResult) -> Self {
        Self {
            game_id: result.game_id,
            outcome: result.outcome,
            event_ids: result.stored_events.iter().map(|e| e.event_id).collect(),
        }
    }
}
