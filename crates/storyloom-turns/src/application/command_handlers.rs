//! Command handlers for the Turn Resolution context.
//!
//! Every handler follows the same shape: load the game's stream, rebuild the
//! aggregate, run the domain method, append the new events at the version the
//! stream was loaded at, then publish facts to the notifier. A concurrent
//! writer makes the append fail with `DomainError::ConcurrencyConflict`; the
//! handler then reloads and decides again against the fresh stream.

use std::sync::Mutex;

use storyloom_core::aggregate::AggregateRoot;
use storyloom_core::clock::Clock;
use storyloom_core::error::DomainError;
use storyloom_core::event::EventMetadata;
use storyloom_core::notifier::{TurnFact, TurnNotifier};
use storyloom_core::repository::{EventRepository, StoredEvent};
use storyloom_core::rng::DeterministicRng;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Game, TurnOutcome};
use crate::domain::commands::{
    AddArgument, CastVote, CompleteArbiterReview, CompleteArgumentation, DesignateArbiter,
    DrawTokens, EditNarration, JoinGame, ProposeAction, ReviewArgument, SetPersonaLead,
    SkipArgumentation, SkipProposals, SkipVoting, StartGame, SubmitNarration, WriteRoundSummary,
};
use crate::domain::events::{GameEvent, GameEventKind};
use crate::domain::phase::{GamePhase, phase_name};

/// How many times a command is decided before a conflict is returned.
pub const MAX_COMMAND_ATTEMPTS: u32 = 5;

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct TurnCommandResult {
    /// The game affected or created by the command.
    pub game_id: Uuid,
    /// What the command did.
    pub outcome: TurnOutcome,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

/// Reconstitutes a `Game` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub(crate) fn reconstitute(
    game_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<Game, DomainError> {
    let mut game = Game::new(game_id);
    for stored in existing_events {
        let kind: GameEventKind = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            DomainError::Infrastructure(format!("event deserialization failed: {e}"))
        })?;
        let event = GameEvent {
            metadata: EventMetadata {
                event_id: stored.event_id,
                event_type: stored.event_type.clone(),
                aggregate_id: stored.aggregate_id,
                sequence_number: stored.sequence_number,
                correlation_id: stored.correlation_id,
                causation_id: stored.causation_id,
                occurred_at: stored.occurred_at,
            },
            kind,
        };
        game.apply(&event);
    }
    Ok(game)
}

/// Loads and rebuilds a game that must already exist.
pub(crate) async fn load_game(
    game_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<Game, DomainError> {
    let existing_events = repo.load_events(game_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(game_id));
    }
    reconstitute(game_id, &existing_events)
}

/// Facts describing what the persisted events changed.
fn facts_for(game: &Game, before: (Option<GamePhase>, Option<Uuid>)) -> Vec<TurnFact> {
    let mut facts = Vec::new();
    for event in game.uncommitted_events() {
        match &event.kind {
            GameEventKind::TokensDrawn(drawn) => facts.push(TurnFact::ActionResolved {
                game_id: game.id,
                action_id: drawn.action_id,
                result_value: drawn.draw.result_value,
                result_type: drawn.draw.result_type.as_str().to_owned(),
            }),
            GameEventKind::RoundCompleted(completed) => facts.push(TurnFact::RoundCompleted {
                game_id: game.id,
                round_id: completed.round_id,
                round_number: completed.round_number,
            }),
            _ => {}
        }
    }
    let after = (game.phase(), game.current_action_id());
    if after != before {
        facts.push(TurnFact::PhaseChanged {
            game_id: game.id,
            action_id: after.1,
            from: before.0.map(|p| p.as_str().to_owned()),
            to: after.0.map(|p| p.as_str().to_owned()),
        });
    }
    facts
}

/// Persists the game's uncommitted events and publishes the resulting facts.
async fn commit(
    game: &Game,
    before: (Option<GamePhase>, Option<Uuid>),
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<Vec<StoredEvent>, DomainError> {
    let stored_events: Vec<StoredEvent> = game
        .uncommitted_events()
        .iter()
        .map(StoredEvent::from_domain_event)
        .collect();

    repo.append_events(game.id, game.committed_version(), &stored_events)
        .await?;
    debug!(
        game_id = %game.id,
        events = stored_events.len(),
        version = game.version(),
        "game events appended"
    );

    let after = (game.phase(), game.current_action_id());
    if after != before {
        info!(
            game_id = %game.id,
            from = phase_name(before.0),
            to = phase_name(after.0),
            "game phase changed"
        );
    }

    for fact in facts_for(game, before) {
        notifier.publish(fact).await;
    }
    Ok(stored_events)
}

/// Runs `decide` against the current state of an existing game and persists
/// what it recorded, retrying on concurrency conflicts.
async fn execute<F>(
    game_id: Uuid,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
    mut decide: F,
) -> Result<TurnCommandResult, DomainError>
where
    F: FnMut(&mut Game) -> Result<TurnOutcome, DomainError>,
{
    let mut attempt = 1;
    loop {
        let mut game = load_game(game_id, repo).await?;
        game.check_invariants()?;
        let before = (game.phase(), game.current_action_id());

        let outcome = decide(&mut game)?;
        if let Err(e) = game.check_invariants() {
            error!(game_id = %game_id, error = %e, "command left the game inconsistent");
            return Err(e);
        }
        if game.uncommitted_events().is_empty() {
            return Ok(TurnCommandResult {
                game_id,
                outcome,
                stored_events: Vec::new(),
            });
        }

        match commit(&game, before, repo, notifier).await {
            Ok(stored_events) => {
                return Ok(TurnCommandResult {
                    game_id,
                    outcome,
                    stored_events,
                });
            }
            Err(DomainError::ConcurrencyConflict { expected, actual, .. })
                if attempt < MAX_COMMAND_ATTEMPTS =>
            {
                warn!(
                    game_id = %game_id,
                    attempt,
                    expected,
                    actual,
                    "concurrent write to game stream, retrying"
                );
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Locks the shared RNG for the duration of one synchronous domain call.
fn with_rng<T>(
    rng: &Mutex<dyn DeterministicRng + Send>,
    f: impl FnOnce(&mut dyn DeterministicRng) -> Result<T, DomainError>,
) -> Result<T, DomainError> {
    let mut rng_guard = rng
        .lock()
        .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
    f(&mut *rng_guard)
}

/// Handles the `StartGame` command: creates a new game, starts its first
/// round, and persists the resulting events.
///
/// # Errors
///
/// Returns `DomainError::Validation` for invalid settings or personas, or
/// `DomainError` if event appending fails.
#[instrument(skip_all, fields(host_id = %command.host_id))]
pub async fn handle_start_game(
    command: &StartGame,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    let game_id = Uuid::now_v7();
    let mut game = Game::new(game_id);

    let outcome = game.start(
        command.host_id,
        command.settings,
        command.personas.clone(),
        command.correlation_id,
        clock,
    )?;
    game.check_invariants()?;

    let stored_events = commit(&game, (None, None), repo, notifier).await?;
    Ok(TurnCommandResult {
        game_id,
        outcome,
        stored_events,
    })
}

/// Handles the `JoinGame` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the join is rejected, or
/// persistence fails.
#[instrument(skip_all, fields(game_id = %command.game_id, player_id = %command.player_id))]
pub async fn handle_join_game(
    command: &JoinGame,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.join(
            command.player_id,
            command.target.clone(),
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `DesignateArbiter` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the actor is not the host,
/// or persistence fails.
#[instrument(skip_all, fields(game_id = %command.game_id, actor_id = %command.actor_id))]
pub async fn handle_designate_arbiter(
    command: &DesignateArbiter,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.designate_arbiter(
            command.actor_id,
            command.arbiter_id,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `SetPersonaLead` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the change is rejected, or
/// persistence fails.
#[instrument(skip_all, fields(game_id = %command.game_id, actor_id = %command.actor_id))]
pub async fn handle_set_persona_lead(
    command: &SetPersonaLead,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.set_persona_lead(
            command.actor_id,
            command.persona_id,
            command.lead_player_id,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `ProposeAction` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the proposal is rejected,
/// or persistence fails.
#[instrument(skip_all, fields(game_id = %command.game_id, actor_id = %command.actor_id))]
pub async fn handle_propose_action(
    command: &ProposeAction,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.propose_action(
            command.actor_id,
            command.persona_id,
            &command.description,
            &command.desired_outcome,
            &command.opening_argument,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `AddArgument` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the argument is rejected,
/// or persistence fails.
#[instrument(
    skip_all,
    fields(game_id = %command.game_id, action_id = %command.action_id, actor_id = %command.actor_id)
)]
pub async fn handle_add_argument(
    command: &AddArgument,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.add_argument(
            command.actor_id,
            command.action_id,
            command.argument_type,
            &command.content,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `CompleteArgumentation` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the signal is rejected, or
/// persistence fails.
#[instrument(
    skip_all,
    fields(game_id = %command.game_id, action_id = %command.action_id, actor_id = %command.actor_id)
)]
pub async fn handle_complete_argumentation(
    command: &CompleteArgumentation,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.complete_argumentation(
            command.actor_id,
            command.action_id,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `ReviewArgument` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the review is rejected, or
/// persistence fails.
#[instrument(
    skip_all,
    fields(game_id = %command.game_id, action_id = %command.action_id, actor_id = %command.actor_id)
)]
pub async fn handle_review_argument(
    command: &ReviewArgument,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.review_argument(
            command.actor_id,
            command.action_id,
            command.argument_id,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `CompleteArbiterReview` command. Under the draw-immediately
/// outcome the arbiter's draw happens here, so the RNG is needed.
///
/// The `Mutex` is locked only around the synchronous domain method call to
/// avoid holding a `MutexGuard` across await points.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the review cannot be
/// completed, or persistence fails.
#[instrument(
    skip_all,
    fields(game_id = %command.game_id, action_id = %command.action_id, actor_id = %command.actor_id)
)]
pub async fn handle_complete_arbiter_review(
    command: &CompleteArbiterReview,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        with_rng(rng, |rng| {
            game.complete_arbiter_review(
                command.actor_id,
                command.action_id,
                command.correlation_id,
                clock,
                rng,
            )
        })
    })
    .await
}

/// Handles the `CastVote` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the vote is rejected, or
/// persistence fails.
#[instrument(
    skip_all,
    fields(game_id = %command.game_id, action_id = %command.action_id, actor_id = %command.actor_id)
)]
pub async fn handle_cast_vote(
    command: &CastVote,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.cast_vote(
            command.actor_id,
            command.action_id,
            command.vote_type,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `SkipProposals` command.
///
/// # Errors
///
/// Returns `DomainError::AlreadyAdvanced` when the round is already over,
/// or another `DomainError` if the skip is rejected or persistence fails.
#[instrument(skip_all, fields(game_id = %command.game_id, actor_id = %command.actor_id))]
pub async fn handle_skip_proposals(
    command: &SkipProposals,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.skip_proposals(
            command.actor_id,
            command.round_id,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `SkipArgumentation` command.
///
/// # Errors
///
/// Returns `DomainError::AlreadyAdvanced` when argumentation already closed,
/// or another `DomainError` if the skip is rejected or persistence fails.
#[instrument(
    skip_all,
    fields(game_id = %command.game_id, action_id = %command.action_id, actor_id = %command.actor_id)
)]
pub async fn handle_skip_argumentation(
    command: &SkipArgumentation,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.skip_argumentation(
            command.actor_id,
            command.action_id,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `SkipVoting` command.
///
/// # Errors
///
/// Returns `DomainError::AlreadyAdvanced` when voting already closed, or
/// another `DomainError` if the skip is rejected or persistence fails.
#[instrument(
    skip_all,
    fields(game_id = %command.game_id, action_id = %command.action_id, actor_id = %command.actor_id)
)]
pub async fn handle_skip_voting(
    command: &SkipVoting,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.skip_voting(
            command.actor_id,
            command.action_id,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `DrawTokens` command. A repeated draw returns the recorded
/// result and persists nothing.
///
/// The `Mutex` is locked only around the synchronous domain method call to
/// avoid holding a `MutexGuard` across await points.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the draw is rejected, or
/// persistence fails.
#[instrument(
    skip_all,
    fields(game_id = %command.game_id, action_id = %command.action_id, actor_id = %command.actor_id)
)]
pub async fn handle_draw_tokens(
    command: &DrawTokens,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        with_rng(rng, |rng| {
            game.draw_tokens(
                command.actor_id,
                command.action_id,
                command.correlation_id,
                clock,
                rng,
            )
        })
    })
    .await
}

/// Handles the `SubmitNarration` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the narration is rejected,
/// or persistence fails.
#[instrument(
    skip_all,
    fields(game_id = %command.game_id, action_id = %command.action_id, actor_id = %command.actor_id)
)]
pub async fn handle_submit_narration(
    command: &SubmitNarration,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.submit_narration(
            command.actor_id,
            command.action_id,
            &command.content,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `EditNarration` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the edit is rejected, or
/// persistence fails.
#[instrument(
    skip_all,
    fields(game_id = %command.game_id, action_id = %command.action_id, actor_id = %command.actor_id)
)]
pub async fn handle_edit_narration(
    command: &EditNarration,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.edit_narration(
            command.actor_id,
            command.action_id,
            &command.content,
            command.correlation_id,
            clock,
        )
    })
    .await
}

/// Handles the `WriteRoundSummary` command.
///
/// # Errors
///
/// Returns `DomainError` if the game is missing, the summary is rejected, or
/// persistence fails.
#[instrument(skip_all, fields(game_id = %command.game_id, actor_id = %command.actor_id))]
pub async fn handle_write_round_summary(
    command: &WriteRoundSummary,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    notifier: &dyn TurnNotifier,
) -> Result<TurnCommandResult, DomainError> {
    execute(command.game_id, repo, notifier, |game| {
        game.write_round_summary(
            command.actor_id,
            &command.content,
            command.correlation_id,
            clock,
        )
    })
    .await
}
