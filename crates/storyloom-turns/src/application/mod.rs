//! Application layer: command and query handlers over the `Game` event stream.

pub mod command_handlers;
pub mod query_handlers;
