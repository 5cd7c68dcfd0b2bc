//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots that reconstitute from event history.
///
/// Aggregates apply their own events as they record them, so `version`
/// already counts uncommitted events. The version the event store knows
/// about is [`AggregateRoot::committed_version`].
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the current version (number of events applied).
    fn version(&self) -> i64;

    /// Apply an event to mutate internal state.
    fn apply(&mut self, event: &Self::Event);

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events after persistence.
    fn clear_uncommitted_events(&mut self);

    /// The stream version before any uncommitted event; used as the
    /// `expected_version` when appending.
    #[allow(clippy::cast_possible_wrap)]
    fn committed_version(&self) -> i64 {
        self.version() - self.uncommitted_events().len() as i64
    }
}
