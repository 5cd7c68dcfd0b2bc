//! Storyloom Core — shared domain abstractions.
//!
//! This crate defines the traits and types that the turn engine and its
//! adapters depend on: aggregates, events, commands, the event repository
//! port, and the clock/RNG seams that keep resolution deterministic under
//! test. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod notifier;
pub mod repository;
pub mod rng;
