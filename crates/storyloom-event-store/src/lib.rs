//! Storyloom event store.
//!
//! Two implementations of the `EventRepository` port: a PostgreSQL store for
//! deployments and an in-memory store for local runs and tests. Both enforce
//! the same optimistic-concurrency contract, which is what serializes phase
//! transitions on a game's stream.

pub mod in_memory_event_repository;
pub mod pg_event_repository;

pub use in_memory_event_repository::InMemoryEventRepository;
pub use pg_event_repository::{PgEventRepository, run_migrations};
