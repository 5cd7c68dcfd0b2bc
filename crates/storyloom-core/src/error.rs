//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// Every variant carries enough detail (phase, quota, actor) for a caller to
/// render a specific message. Only `InvariantViolation` and `Infrastructure`
/// indicate a fault; the rest are rejections of a single command that left
/// state untouched.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// The command does not match the current phase.
    #[error("{command} is not allowed during the {phase} phase")]
    PhaseViolation {
        /// The rejected command.
        command: String,
        /// The phase the game is in.
        phase: String,
    },

    /// The actor lacks standing for this command.
    #[error("player {actor_id} is not eligible: {reason}")]
    NotEligible {
        /// The rejected actor.
        actor_id: Uuid,
        /// Why the actor was rejected.
        reason: String,
    },

    /// The actor already acted in this phase.
    #[error("player {actor_id} has already acted in the {phase} phase")]
    AlreadyActed {
        /// The actor.
        actor_id: Uuid,
        /// The phase in which the actor already acted.
        phase: String,
    },

    /// The voter already cast a vote on this action.
    #[error("player {voter_id} has already voted on action {action_id}")]
    DuplicateVote {
        /// The voter.
        voter_id: Uuid,
        /// The action voted on.
        action_id: Uuid,
    },

    /// The argument budget is exhausted.
    #[error("argument limit of {limit} reached for {actor_id}")]
    LimitExceeded {
        /// The player (or shared persona) whose budget is exhausted.
        actor_id: Uuid,
        /// The configured limit.
        limit: u32,
    },

    /// A skip was replayed after its target phase was already reached.
    #[error("{command} already applied; game is now in the {phase} phase")]
    AlreadyAdvanced {
        /// The replayed command.
        command: String,
        /// The phase the game is in now.
        phase: String,
    },

    /// Internal state broke an invariant; the mutation was aborted.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
