//! Query handlers for the Turn Resolution context.
//!
//! This module contains query handlers that reconstitute the game from
//! stored events and return read-only view DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use storyloom_core::clock::Clock;
use storyloom_core::error::DomainError;
use storyloom_core::repository::EventRepository;
use uuid::Uuid;

use crate::application::command_handlers::load_game;
use crate::domain::aggregates::{Action, Game, Progress, Round, RoundStatus};
use crate::domain::arguments::Argument;
use crate::domain::events::Narration;
use crate::domain::personas::Persona;
use crate::domain::phase::{GamePhase, phase_name};
use crate::domain::settings::GameSettings;
use crate::domain::timeout::TimeoutStatus;
use crate::domain::token_pool::{TokenDraw, TokenPool};
use crate::domain::votes::Vote;

/// Read-only view of a game.
#[derive(Debug, Serialize)]
pub struct GameView {
    pub game_id: Uuid,
    pub host_id: Uuid,
    pub arbiter_id: Option<Uuid>,
    /// `None` only for a game whose stream holds no start event.
    pub phase: Option<GamePhase>,
    pub phase_started_at: Option<DateTime<Utc>>,
    pub settings: GameSettings,
    /// The roster as it stands now, joins included.
    pub personas: Vec<Persona>,
    pub npc_momentum: i64,
    pub current_round: Option<RoundView>,
    pub completed_rounds: Vec<RoundView>,
    pub current_action: Option<ActionView>,
    /// Current version (event count).
    pub version: i64,
}

#[derive(Debug, Serialize)]
pub struct RoundView {
    pub round_id: Uuid,
    pub round_number: u32,
    pub status: RoundStatus,
    pub actions_completed: u32,
    pub total_actions_required: u32,
    pub proposals_skipped: bool,
    pub summary: Option<String>,
}

impl From<&Round> for RoundView {
    fn from(round: &Round) -> Self {
        Self {
            round_id: round.round_id,
            round_number: round.round_number,
            status: round.status,
            actions_completed: round.actions_completed,
            total_actions_required: round.total_actions_required,
            proposals_skipped: round.proposals_skipped,
            summary: round.summary.clone(),
        }
    }
}

/// Read-only view of an action.
///
/// `argumentation`, `voting` and `pool` describe live progress and are only
/// filled in for the open action.
#[derive(Debug, Serialize)]
pub struct ActionView {
    pub action_id: Uuid,
    pub round_id: Uuid,
    pub sequence_number: u32,
    pub initiator_id: Uuid,
    pub persona_id: Uuid,
    pub initiated_by_npc: bool,
    pub description: String,
    pub desired_outcome: String,
    pub arguments: Vec<Argument>,
    pub votes: Vec<Vote>,
    pub argumentation_was_skipped: bool,
    pub voting_was_skipped: bool,
    pub token_draw: Option<TokenDraw>,
    pub narration: Option<Narration>,
    pub argumentation: Option<Progress>,
    pub voting: Option<Progress>,
    pub pool: Option<TokenPool>,
}

impl ActionView {
    fn completed(action: &Action) -> Self {
        Self {
            action_id: action.action_id,
            round_id: action.round_id,
            sequence_number: action.sequence_number,
            initiator_id: action.initiator_id,
            persona_id: action.persona_id,
            initiated_by_npc: action.initiated_by_npc,
            description: action.description.clone(),
            desired_outcome: action.desired_outcome.clone(),
            arguments: action.ledger.arguments().to_vec(),
            votes: action.tally.votes().to_vec(),
            argumentation_was_skipped: action.argumentation_was_skipped,
            voting_was_skipped: action.voting_was_skipped,
            token_draw: action.token_draw.clone(),
            narration: action.narration.clone(),
            argumentation: None,
            voting: None,
            pool: None,
        }
    }

    fn open(game: &Game, action: &Action) -> Self {
        Self {
            argumentation: game.argument_progress(action),
            voting: game.vote_progress(action),
            pool: game.current_pool(),
            ..Self::completed(action)
        }
    }
}

fn game_view(game: &Game) -> GameView {
    GameView {
        game_id: game.id,
        host_id: game.host_id,
        arbiter_id: game.arbiter_id,
        phase: game.phase,
        phase_started_at: game.phase_started_at,
        settings: game.settings,
        personas: game.roster.personas().to_vec(),
        npc_momentum: game.npc_momentum(),
        current_round: game.current_round.as_ref().map(RoundView::from),
        completed_rounds: game.completed_rounds.iter().map(RoundView::from).collect(),
        current_action: game
            .current_action
            .as_ref()
            .map(|action| ActionView::open(game, action)),
        version: game.version,
    }
}

/// Retrieves a game by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_game_by_id(
    game_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<GameView, DomainError> {
    let game = load_game(game_id, repo).await?;
    Ok(game_view(&game))
}

/// Lists the game's completed actions, oldest first.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn list_actions(
    game_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<Vec<ActionView>, DomainError> {
    let game = load_game(game_id, repo).await?;
    Ok(game
        .completed_actions
        .iter()
        .map(ActionView::completed)
        .collect())
}

/// Reports whether the game's current phase has run past its time limit.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID,
/// `DomainError::PhaseViolation` if the game has not started, and
/// `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_phase_timeout(
    game_id: Uuid,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<TimeoutStatus, DomainError> {
    let game = load_game(game_id, repo).await?;
    match (game.phase, game.phase_started_at) {
        (Some(phase), Some(started_at)) => Ok(TimeoutStatus::evaluate(
            phase,
            started_at,
            &game.settings.timeouts,
            clock.now(),
        )),
        _ => Err(DomainError::PhaseViolation {
            command: "game.get_phase_timeout".to_owned(),
            phase: phase_name(game.phase).to_owned(),
        }),
    }
}
