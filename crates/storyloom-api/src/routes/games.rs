//! Routes for games: lifecycle, roster, round-level commands and queries.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use storyloom_turns::application::query_handlers::{self, ActionView, GameView};
use storyloom_turns::application::command_handlers;
use storyloom_turns::domain::commands::{self, JoinTarget, PersonaSpec};
use storyloom_turns::domain::settings::GameSettings;
use storyloom_turns::domain::timeout::TimeoutStatus;

use super::CommandResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct StartGameRequest {
    pub host_id: Uuid,
    /// Omitted fields take their defaults.
    #[serde(default)]
    pub settings: GameSettings,
    pub personas: Vec<PersonaSpec>,
}

/// Request body for POST /{game_id}/join.
#[derive(Debug, Deserialize)]
pub struct JoinGameRequest {
    pub player_id: Uuid,
    pub target: JoinTarget,
}

/// Request body for POST /{game_id}/arbiter.
#[derive(Debug, Deserialize)]
pub struct DesignateArbiterRequest {
    pub actor_id: Uuid,
    /// `null` clears the arbiter.
    pub arbiter_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SetPersonaLeadRequest {
    pub actor_id: Uuid,
    pub lead_player_id: Uuid,
}

/// Request body for POST /{game_id}/actions.
#[derive(Debug, Deserialize)]
pub struct ProposeActionRequest {
    pub actor_id: Uuid,
    pub persona_id: Uuid,
    pub description: String,
    pub desired_outcome: String,
    pub opening_argument: String,
}

#[derive(Debug, Deserialize)]
pub struct SkipProposalsRequest {
    pub actor_id: Uuid,
    pub round_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RoundSummaryRequest {
    pub actor_id: Uuid,
    pub content: String,
}

/// POST /
#[instrument(skip(state, request), fields(host_id = %request.host_id))]
async fn start_game(
    State(state): State<AppState>,
    Json(request): Json<StartGameRequest>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let command = commands::StartGame {
        correlation_id: Uuid::new_v4(),
        host_id: request.host_id,
        settings: request.settings,
        personas: request.personas,
    };

    info!(correlation_id = %command.correlation_id, "handling start_game command");

    let result = command_handlers::handle_start_game(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

/// GET /{game_id}
#[instrument(skip(state))]
async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
) -> Result<Json<GameView>, ApiError> {
    let view = query_handlers::get_game_by_id(game_id, &*state.event_repository).await?;
    Ok(Json(view))
}

/// GET /{game_id}/actions
#[instrument(skip(state))]
async fn list_actions(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
) -> Result<Json<Vec<ActionView>>, ApiError> {
    let actions = query_handlers::list_actions(game_id, &*state.event_repository).await?;
    Ok(Json(actions))
}

/// GET /{game_id}/timeout
#[instrument(skip(state))]
async fn get_phase_timeout(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
) -> Result<Json<TimeoutStatus>, ApiError> {
    let status = query_handlers::get_phase_timeout(
        game_id,
        state.clock.as_ref(),
        &*state.event_repository,
    )
    .await?;
    Ok(Json(status))
}

/// POST /{game_id}/join
#[instrument(skip(state, request), fields(player_id = %request.player_id))]
async fn join_game(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<JoinGameRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::JoinGame {
        correlation_id: Uuid::new_v4(),
        game_id,
        player_id: request.player_id,
        target: request.target,
    };

    info!(correlation_id = %command.correlation_id, "handling join_game command");

    let result = command_handlers::handle_join_game(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST /{game_id}/arbiter
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn designate_arbiter(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<DesignateArbiterRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::DesignateArbiter {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        arbiter_id: request.arbiter_id,
    };

    info!(correlation_id = %command.correlation_id, "handling designate_arbiter command");

    let result = command_handlers::handle_designate_arbiter(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST /{game_id}/personas/{persona_id}/lead
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn set_persona_lead(
    State(state): State<AppState>,
    Path((game_id, persona_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<SetPersonaLeadRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::SetPersonaLead {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        persona_id,
        lead_player_id: request.lead_player_id,
    };

    info!(correlation_id = %command.correlation_id, "handling set_persona_lead command");

    let result = command_handlers::handle_set_persona_lead(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST /{game_id}/actions
#[instrument(skip(state, request), fields(actor_id = %request.actor_id, persona_id = %request.persona_id))]
async fn propose_action(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<ProposeActionRequest>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let command = commands::ProposeAction {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        persona_id: request.persona_id,
        description: request.description,
        desired_outcome: request.desired_outcome,
        opening_argument: request.opening_argument,
    };

    info!(correlation_id = %command.correlation_id, "handling propose_action command");

    let result = command_handlers::handle_propose_action(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

/// POST /{game_id}/skip-proposals
#[instrument(skip(state, request), fields(actor_id = %request.actor_id, round_id = %request.round_id))]
async fn skip_proposals(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<SkipProposalsRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::SkipProposals {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        round_id: request.round_id,
    };

    info!(correlation_id = %command.correlation_id, "handling skip_proposals command");

    let result = command_handlers::handle_skip_proposals(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST /{game_id}/round-summary
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn write_round_summary(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<RoundSummaryRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::WriteRoundSummary {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        content: request.content,
    };

    info!(correlation_id = %command.correlation_id, "handling write_round_summary command");

    let result = command_handlers::handle_write_round_summary(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// Returns the router for game-level routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_game))
        .route("/{game_id}", get(get_game))
        .route("/{game_id}/actions", get(list_actions).post(propose_action))
        .route("/{game_id}/timeout", get(get_phase_timeout))
        .route("/{game_id}/join", post(join_game))
        .route("/{game_id}/arbiter", post(designate_arbiter))
        .route(
            "/{game_id}/personas/{persona_id}/lead",
            post(set_persona_lead),
        )
        .route("/{game_id}/skip-proposals", post(skip_proposals))
        .route("/{game_id}/round-summary", post(write_round_summary))
}
