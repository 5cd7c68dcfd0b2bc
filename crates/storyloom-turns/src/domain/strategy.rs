//! Resolution strategies.
//!
//! A strategy fixes the phase sequence of an action, who may draw, and how
//! the pool is built from votes and arguments. The state machine only talks
//! to the [`ResolutionStrategy`] trait.

use std::fmt;

use uuid::Uuid;

use super::arguments::{ArgumentLedger, ArgumentType};
use super::phase::GamePhase;
use super::settings::{ArbiterReviewOutcome, GameSettings, ResolutionMethod};
use super::token_pool::TokenPool;
use super::votes::VoteTally;

const TOKEN_DRAW_PHASES: &[GamePhase] = &[
    GamePhase::Proposal,
    GamePhase::Argumentation,
    GamePhase::Voting,
    GamePhase::Resolution,
    GamePhase::Narration,
];

const ARBITER_THEN_VOTE_PHASES: &[GamePhase] = &[
    GamePhase::Proposal,
    GamePhase::Argumentation,
    GamePhase::ArbiterReview,
    GamePhase::Voting,
    GamePhase::Resolution,
    GamePhase::Narration,
];

const ARBITER_THEN_DRAW_PHASES: &[GamePhase] = &[
    GamePhase::Proposal,
    GamePhase::Argumentation,
    GamePhase::ArbiterReview,
    GamePhase::Resolution,
    GamePhase::Narration,
];

/// What a strategy turns into a pool.
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
    pub tally: &'a VoteTally,
    pub ledger: &'a ArgumentLedger,
    /// Voters whose votes count.
    pub voters: &'a [Uuid],
}

/// Converts the evidence gathered on an action into an outcome.
pub trait ResolutionStrategy: Send + Sync + fmt::Debug {
    fn method(&self) -> ResolutionMethod;

    /// The phases of an action, starting at `Proposal`.
    fn phase_sequence(&self) -> &'static [GamePhase];

    /// The phase following `phase`, or `None` once narration is done.
    fn phase_after(&self, phase: GamePhase) -> Option<GamePhase> {
        let sequence = self.phase_sequence();
        sequence
            .iter()
            .position(|p| *p == phase)
            .and_then(|i| sequence.get(i + 1))
            .copied()
    }

    /// Whether `actor_id` may draw tokens.
    fn may_draw(&self, actor_id: Uuid, initiator_id: Uuid, arbiter_id: Option<Uuid>) -> bool;

    fn build_pool(&self, evidence: &Evidence<'_>) -> TokenPool;
}

/// The initiator draws from a pool built from votes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenDrawStrategy;

impl ResolutionStrategy for TokenDrawStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::TokenDraw
    }

    fn phase_sequence(&self) -> &'static [GamePhase] {
        TOKEN_DRAW_PHASES
    }

    fn may_draw(&self, actor_id: Uuid, initiator_id: Uuid, _arbiter_id: Option<Uuid>) -> bool {
        actor_id == initiator_id
    }

    fn build_pool(&self, evidence: &Evidence<'_>) -> TokenPool {
        let mut pool = TokenPool::base();
        evidence.tally.contribute_to(&mut pool, evidence.voters);
        pool
    }
}

/// An arbiter marks strong arguments, which weigh into the pool, and draws.
#[derive(Debug, Clone, Copy)]
pub struct ArbiterStrategy {
    pub review_outcome: ArbiterReviewOutcome,
}

impl ResolutionStrategy for ArbiterStrategy {
    fn method(&self) -> ResolutionMethod {
        ResolutionMethod::Arbiter
    }

    fn phase_sequence(&self) -> &'static [GamePhase] {
        match self.review_outcome {
            ArbiterReviewOutcome::ProceedToVoting => ARBITER_THEN_VOTE_PHASES,
            ArbiterReviewOutcome::DrawImmediately => ARBITER_THEN_DRAW_PHASES,
        }
    }

    fn may_draw(&self, actor_id: Uuid, _initiator_id: Uuid, arbiter_id: Option<Uuid>) -> bool {
        arbiter_id == Some(actor_id)
    }

    fn build_pool(&self, evidence: &Evidence<'_>) -> TokenPool {
        let mut pool = TokenPool::base();
        for argument in evidence.ledger.arguments().iter().filter(|a| a.is_strong) {
            match argument.argument_type {
                ArgumentType::For => pool.add(1, 0),
                ArgumentType::Against => pool.add(0, 1),
                ArgumentType::InitiatorFor | ArgumentType::Clarification => {}
            }
        }
        match self.review_outcome {
            ArbiterReviewOutcome::ProceedToVoting => {
                evidence.tally.contribute_to(&mut pool, evidence.voters);
            }
            // No vote is held; a single UNCERTAIN vote stands in for it.
            ArbiterReviewOutcome::DrawImmediately => pool.add(1, 1),
        }
        pool
    }
}

static TOKEN_DRAW: TokenDrawStrategy = TokenDrawStrategy;
static ARBITER_THEN_VOTE: ArbiterStrategy = ArbiterStrategy {
    review_outcome: ArbiterReviewOutcome::ProceedToVoting,
};
static ARBITER_THEN_DRAW: ArbiterStrategy = ArbiterStrategy {
    review_outcome: ArbiterReviewOutcome::DrawImmediately,
};

/// The strategy a game's settings select.
#[must_use]
pub fn strategy_for(settings: &GameSettings) -> &'static dyn ResolutionStrategy {
    match (settings.resolution_method, settings.arbiter_review_outcome) {
        (ResolutionMethod::TokenDraw, _) => &TOKEN_DRAW,
        (ResolutionMethod::Arbiter, ArbiterReviewOutcome::ProceedToVoting) => &ARBITER_THEN_VOTE,
        (ResolutionMethod::Arbiter, ArbiterReviewOutcome::DrawImmediately) => &ARBITER_THEN_DRAW,
    }
}
