//! Votes on an action and the tally that turns them into tokens.

use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use uuid::Uuid;

use super::token_pool::TokenPool;

/// A voter's estimate of the action's chance of success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteType {
    LikelySuccess,
    LikelyFailure,
    Uncertain,
}

impl VoteType {
    /// Success and failure tokens this vote adds to the pool.
    #[must_use]
    pub fn contribution(self) -> (u32, u32) {
        match self {
            Self::LikelySuccess => (2, 0),
            Self::LikelyFailure => (0, 2),
            Self::Uncertain => (1, 1),
        }
    }
}

/// One recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: Uuid,
    pub vote_type: VoteType,
    /// Set when the vote was filled in by a host skip.
    pub was_auto_filled: bool,
}

/// Votes recorded on one action.
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    votes: Vec<Vote>,
}

impl VoteTally {
    /// All recorded votes in the order they were cast.
    #[must_use]
    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    /// Whether the voter has any recorded vote.
    #[must_use]
    pub fn has_voted(&self, voter_id: Uuid) -> bool {
        self.votes.iter().any(|v| v.voter_id == voter_id)
    }

    /// Rejects a second genuine vote from the same voter.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::DuplicateVote` if the voter already cast a vote
    /// that was not auto-filled.
    pub fn check_can_vote(&self, action_id: Uuid, voter_id: Uuid) -> Result<(), DomainError> {
        if self
            .votes
            .iter()
            .any(|v| v.voter_id == voter_id && !v.was_auto_filled)
        {
            return Err(DomainError::DuplicateVote { voter_id, action_id });
        }
        Ok(())
    }

    /// Records a vote. Replaces an auto-filled vote from the same voter.
    pub fn record(&mut self, vote: Vote) {
        self.votes.retain(|v| v.voter_id != vote.voter_id);
        self.votes.push(vote);
    }

    /// Number of eligible voters who have voted.
    #[must_use]
    pub fn submitted_by(&self, eligible: &[Uuid]) -> usize {
        eligible.iter().filter(|id| self.has_voted(**id)).count()
    }

    /// Eligible voters with no vote, in eligibility order.
    #[must_use]
    pub fn missing_voters(&self, eligible: &[Uuid]) -> Vec<Uuid> {
        eligible
            .iter()
            .copied()
            .filter(|id| !self.has_voted(*id))
            .collect()
    }

    /// Adds the tokens of every vote cast by an eligible voter.
    pub fn contribute_to(&self, pool: &mut TokenPool, eligible: &[Uuid]) {
        for vote in self.votes.iter().filter(|v| eligible.contains(&v.voter_id)) {
            let (success, failure) = vote.vote_type.contribution();
            pool.add(success, failure);
        }
    }
}
