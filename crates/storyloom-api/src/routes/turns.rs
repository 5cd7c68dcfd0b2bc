//! Routes addressed to one action: arguments, review, votes, draw, narration.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use storyloom_turns::application::command_handlers;
use storyloom_turns::domain::arguments::ArgumentType;
use storyloom_turns::domain::commands;
use storyloom_turns::domain::votes::VoteType;

use super::CommandResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for commands that need nothing but the actor.
#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor_id: Uuid,
}

/// Request body for POST arguments.
#[derive(Debug, Deserialize)]
pub struct AddArgumentRequest {
    pub actor_id: Uuid,
    pub argument_type: ArgumentType,
    pub content: String,
}

/// Request body for POST votes.
#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub actor_id: Uuid,
    pub vote_type: VoteType,
}

/// Request body for POST and PUT narration.
#[derive(Debug, Deserialize)]
pub struct NarrationRequest {
    pub actor_id: Uuid,
    pub content: String,
}

/// POST arguments
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn add_argument(
    State(state): State<AppState>,
    Path((game_id, action_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<AddArgumentRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::AddArgument {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        action_id,
        argument_type: request.argument_type,
        content: request.content,
    };

    info!(correlation_id = %command.correlation_id, "handling add_argument command");

    let result = command_handlers::handle_add_argument(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST arguments/complete
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn complete_argumentation(
    State(state): State<AppState>,
    Path((game_id, action_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::CompleteArgumentation {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        action_id,
    };

    info!(correlation_id = %command.correlation_id, "handling complete_argumentation command");

    let result = command_handlers::handle_complete_argumentation(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST arguments/{argument_id}/strength
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn review_argument(
    State(state): State<AppState>,
    Path((game_id, action_id, argument_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ReviewArgument {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        action_id,
        argument_id,
    };

    info!(correlation_id = %command.correlation_id, "handling review_argument command");

    let result = command_handlers::handle_review_argument(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST review/complete
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn complete_arbiter_review(
    State(state): State<AppState>,
    Path((game_id, action_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::CompleteArbiterReview {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        action_id,
    };

    info!(correlation_id = %command.correlation_id, "handling complete_arbiter_review command");

    let result = command_handlers::handle_complete_arbiter_review(
        &command,
        state.clock.as_ref(),
        &state.rng,
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST votes
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn cast_vote(
    State(state): State<AppState>,
    Path((game_id, action_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<CastVoteRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::CastVote {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        action_id,
        vote_type: request.vote_type,
    };

    info!(correlation_id = %command.correlation_id, "handling cast_vote command");

    let result = command_handlers::handle_cast_vote(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST skip-argumentation
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn skip_argumentation(
    State(state): State<AppState>,
    Path((game_id, action_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::SkipArgumentation {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        action_id,
    };

    info!(correlation_id = %command.correlation_id, "handling skip_argumentation command");

    let result = command_handlers::handle_skip_argumentation(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST skip-voting
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn skip_voting(
    State(state): State<AppState>,
    Path((game_id, action_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::SkipVoting {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        action_id,
    };

    info!(correlation_id = %command.correlation_id, "handling skip_voting command");

    let result = command_handlers::handle_skip_voting(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST draw
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn draw_tokens(
    State(state): State<AppState>,
    Path((game_id, action_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ActorRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::DrawTokens {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        action_id,
    };

    info!(correlation_id = %command.correlation_id, "handling draw_tokens command");

    let result = command_handlers::handle_draw_tokens(
        &command,
        state.clock.as_ref(),
        &state.rng,
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST narration
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn submit_narration(
    State(state): State<AppState>,
    Path((game_id, action_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<NarrationRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::SubmitNarration {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        action_id,
        content: request.content,
    };

    info!(correlation_id = %command.correlation_id, "handling submit_narration command");

    let result = command_handlers::handle_submit_narration(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// PUT narration
#[instrument(skip(state, request), fields(actor_id = %request.actor_id))]
async fn edit_narration(
    State(state): State<AppState>,
    Path((game_id, action_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<NarrationRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::EditNarration {
        correlation_id: Uuid::new_v4(),
        game_id,
        actor_id: request.actor_id,
        action_id,
        content: request.content,
    };

    info!(correlation_id = %command.correlation_id, "handling edit_narration command");

    let result = command_handlers::handle_edit_narration(
        &command,
        state.clock.as_ref(),
        &*state.event_repository,
        &*state.notifier,
    )
    .await?;

    Ok(Json(result.into()))
}

/// Returns the router for action-level routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{game_id}/actions/{action_id}/arguments", post(add_argument))
        .route(
            "/{game_id}/actions/{action_id}/arguments/complete",
            post(complete_argumentation),
        )
        .route(
            "/{game_id}/actions/{action_id}/arguments/{argument_id}/strength",
            post(review_argument),
        )
        .route(
            "/{game_id}/actions/{action_id}/review/complete",
            post(complete_arbiter_review),
        )
        .route("/{game_id}/actions/{action_id}/votes", post(cast_vote))
        .route(
            "/{game_id}/actions/{action_id}/skip-argumentation",
            post(skip_argumentation),
        )
        .route(
            "/{game_id}/actions/{action_id}/skip-voting",
            post(skip_voting),
        )
        .route("/{game_id}/actions/{action_id}/draw", post(draw_tokens))
        .route(
            "/{game_id}/actions/{action_id}/narration",
            post(submit_narration).put(edit_narration),
        )
}
