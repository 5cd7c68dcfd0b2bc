//! Shared test mocks and utilities for the Storyloom turn engine.

mod clock;
mod notifier;
mod repository;
mod rng;

pub use clock::FixedClock;
pub use notifier::RecordingNotifier;
pub use repository::{
    ConflictOnceEventRepository, EmptyEventRepository, FailingEventRepository,
    RecordingEventRepository,
};
pub use rng::{MockRng, SequenceRng};
