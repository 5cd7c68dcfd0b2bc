//! Arguments on an action and the ledger that enforces limits and tracks
//! completion.

use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use uuid::Uuid;

use super::personas::Voice;

/// The kind of an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentType {
    /// The initiator's opening case, attached at proposal time.
    InitiatorFor,
    For,
    Against,
    Clarification,
}

impl ArgumentType {
    /// Whether the argument uses up part of the arguer's limit.
    #[must_use]
    pub fn counts_against_limit(self) -> bool {
        self != Self::InitiatorFor
    }

    /// Whether an arbiter may mark the argument strong.
    #[must_use]
    pub fn can_be_strong(self) -> bool {
        matches!(self, Self::For | Self::Against)
    }
}

/// One argument made on an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub argument_id: Uuid,
    pub player_id: Uuid,
    pub persona_id: Uuid,
    pub argument_type: ArgumentType,
    pub content: String,
    /// 1-based position within the action.
    pub sequence: u32,
    pub is_strong: bool,
}

/// Whose limit an argument is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentQuota {
    /// The arguing player's own limit.
    Player(Uuid),
    /// A limit shared by every member of the persona.
    Persona(Uuid),
}

/// Arguments and completion signals for one action.
#[derive(Debug, Clone, Default)]
pub struct ArgumentLedger {
    arguments: Vec<Argument>,
    completed_by: Vec<Uuid>,
}

impl ArgumentLedger {
    #[must_use]
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    #[must_use]
    pub fn argument(&self, argument_id: Uuid) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.argument_id == argument_id)
    }

    /// Sequence number for the next argument.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn next_sequence(&self) -> u32 {
        self.arguments.len() as u32 + 1
    }

    /// Arguments already charged to a quota.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn used(&self, quota: ArgumentQuota) -> u32 {
        self.arguments
            .iter()
            .filter(|a| a.argument_type.counts_against_limit())
            .filter(|a| match quota {
                ArgumentQuota::Player(id) => a.player_id == id,
                ArgumentQuota::Persona(id) => a.persona_id == id,
            })
            .count() as u32
    }

    /// Rejects an argument once its quota is used up.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::LimitExceeded` if `limit` arguments have already
    /// been charged to the quota.
    pub fn check_limit(
        &self,
        actor_id: Uuid,
        quota: ArgumentQuota,
        limit: u32,
    ) -> Result<(), DomainError> {
        if self.used(quota) >= limit {
            return Err(DomainError::LimitExceeded { actor_id, limit });
        }
        Ok(())
    }

    pub fn record(&mut self, argument: Argument) {
        self.arguments.push(argument);
    }

    /// Sets the strength flag. Unknown ids are ignored.
    pub fn set_strength(&mut self, argument_id: Uuid, is_strong: bool) {
        if let Some(argument) = self.arguments.iter_mut().find(|a| a.argument_id == argument_id) {
            argument.is_strong = is_strong;
        }
    }

    /// Players who signalled completion, in order.
    #[must_use]
    pub fn completed_by(&self) -> &[Uuid] {
        &self.completed_by
    }

    pub fn mark_complete(&mut self, player_id: Uuid) {
        if !self.completed_by.contains(&player_id) {
            self.completed_by.push(player_id);
        }
    }

    /// A voice is complete once any of its members has signalled completion.
    #[must_use]
    pub fn is_voice_complete(&self, voice: &Voice) -> bool {
        voice.members.iter().any(|m| self.completed_by.contains(m))
    }

    /// Number of complete voices.
    #[must_use]
    pub fn completed_voices(&self, voices: &[Voice]) -> usize {
        voices.iter().filter(|v| self.is_voice_complete(v)).count()
    }
}
