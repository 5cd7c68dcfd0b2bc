//! Domain layer for turn resolution.

pub mod aggregates;
pub mod arguments;
pub mod commands;
pub mod events;
pub mod momentum;
pub mod personas;
pub mod phase;
pub mod settings;
pub mod strategy;
pub mod timeout;
pub mod token_pool;
pub mod votes;
