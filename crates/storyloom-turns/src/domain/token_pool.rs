//! The token pool and the three-token draw.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use storyloom_core::rng::DeterministicRng;
use uuid::Uuid;

/// Number of tokens taken in every draw.
pub const DRAW_SIZE: usize = 3;

/// A single drawn token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    Success,
    Failure,
}

/// Outcome category of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    /// Three successes.
    Triumph,
    /// Two successes, one failure.
    SuccessBut,
    /// One success, two failures.
    FailureBut,
    /// Three failures.
    Disaster,
}

impl ResultType {
    /// Classifies three drawn tokens by their success count.
    #[must_use]
    pub fn classify(tokens: &[Token; DRAW_SIZE]) -> Self {
        match tokens.iter().filter(|t| **t == Token::Success).count() {
            3 => Self::Triumph,
            2 => Self::SuccessBut,
            1 => Self::FailureBut,
            _ => Self::Disaster,
        }
    }

    /// The numeric value of this outcome.
    #[must_use]
    pub fn value(self) -> i32 {
        match self {
            Self::Triumph => 3,
            Self::SuccessBut => 1,
            Self::FailureBut => -1,
            Self::Disaster => -3,
        }
    }

    /// Upper snake-case name, as serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Triumph => "TRIUMPH",
            Self::SuccessBut => "SUCCESS_BUT",
            Self::FailureBut => "FAILURE_BUT",
            Self::Disaster => "DISASTER",
        }
    }
}

/// Success and failure token counts.
///
/// Derived from recorded votes (and, under the arbiter strategy, strong
/// arguments); never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPool {
    pub success_count: u32,
    pub failure_count: u32,
}

impl Default for TokenPool {
    fn default() -> Self {
        Self::base()
    }
}

impl TokenPool {
    /// The starting pool: one success and one failure token.
    #[must_use]
    pub fn base() -> Self {
        Self {
            success_count: 1,
            failure_count: 1,
        }
    }

    /// Adds tokens to the pool.
    pub fn add(&mut self, success: u32, failure: u32) {
        self.success_count += success;
        self.failure_count += failure;
    }

    /// Total number of tokens in the pool.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.success_count + self.failure_count
    }

    /// Draws three tokens without replacement.
    ///
    /// Each pick asks the RNG for an index in `[0, remaining - 1]`; an index
    /// below the remaining success count picks a success token.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the pool holds fewer than three
    /// tokens.
    pub fn draw(&self, rng: &mut dyn DeterministicRng) -> Result<[Token; DRAW_SIZE], DomainError> {
        if (self.total() as usize) < DRAW_SIZE {
            return Err(DomainError::Validation(format!(
                "cannot draw {DRAW_SIZE} tokens from a pool of {}",
                self.total()
            )));
        }

        let mut success = self.success_count;
        let mut failure = self.failure_count;
        let mut tokens = [Token::Failure; DRAW_SIZE];
        for slot in &mut tokens {
            let index = rng.next_u32_range(0, success + failure - 1);
            if index < success {
                *slot = Token::Success;
                success -= 1;
            } else {
                *slot = Token::Failure;
                failure -= 1;
            }
        }
        Ok(tokens)
    }
}

/// The recorded result of an action's single draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDraw {
    pub draw_id: Uuid,
    pub action_id: Uuid,
    pub tokens: [Token; DRAW_SIZE],
    pub result_type: ResultType,
    pub result_value: i32,
    /// The pool the tokens were drawn from.
    pub pool: TokenPool,
    pub drawn_by: Uuid,
    pub drawn_at: DateTime<Utc>,
}

impl TokenDraw {
    /// Builds a draw record from drawn tokens.
    #[must_use]
    pub fn new(
        action_id: Uuid,
        tokens: [Token; DRAW_SIZE],
        pool: TokenPool,
        drawn_by: Uuid,
        drawn_at: DateTime<Utc>,
    ) -> Self {
        let result_type = ResultType::classify(&tokens);
        Self {
            draw_id: Uuid::new_v4(),
            action_id,
            tokens,
            result_type,
            result_value: result_type.value(),
            pool,
            drawn_by,
            drawn_at,
        }
    }
}
