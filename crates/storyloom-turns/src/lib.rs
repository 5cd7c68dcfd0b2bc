//! Storyloom — Turn Resolution bounded context.
//!
//! Drives each round of a play-by-post story: personas propose actions,
//! players argue and vote on their likelihood, tokens are drawn from a pool
//! built from those votes, and the initiator narrates the outcome.

pub mod application;
pub mod domain;
