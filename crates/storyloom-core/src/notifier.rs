//! Realtime notifier port.
//!
//! Command handlers publish facts here after events are persisted. Delivery
//! (sockets, polling, push) belongs to the adapter; the engine neither waits
//! for nor depends on it.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// A state-change fact pushed to connected clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum TurnFact {
    /// The game moved from one phase to another.
    PhaseChanged {
        /// The game.
        game_id: Uuid,
        /// The open action, if the new phase belongs to one.
        action_id: Option<Uuid>,
        /// The previous phase.
        from: Option<String>,
        /// The new phase.
        to: Option<String>,
    },
    /// Tokens were drawn for an action.
    ActionResolved {
        /// The game.
        game_id: Uuid,
        /// The resolved action.
        action_id: Uuid,
        /// The numeric outcome (+3, +1, -1, -3).
        result_value: i32,
        /// The outcome category.
        result_type: String,
    },
    /// Every required action of a round completed, or proposals were skipped.
    RoundCompleted {
        /// The game.
        game_id: Uuid,
        /// The completed round.
        round_id: Uuid,
        /// The round's number.
        round_number: u32,
    },
}

/// Receives facts after a command's events have been persisted.
#[async_trait]
pub trait TurnNotifier: Send + Sync {
    /// Publishes one fact. Implementations must not fail the command.
    async fn publish(&self, fact: TurnFact);
}

/// Notifier that writes facts to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl TurnNotifier for LoggingNotifier {
    async fn publish(&self, fact: TurnFact) {
        match serde_json::to_string(&fact) {
            Ok(json) => tracing::info!(fact = %json, "turn fact published"),
            Err(e) => tracing::warn!(error = %e, "turn fact could not be serialized"),
        }
    }
}
