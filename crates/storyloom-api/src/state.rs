//! Shared application state.

use std::sync::{Arc, Mutex};

use storyloom_core::clock::Clock;
use storyloom_core::notifier::TurnNotifier;
use storyloom_core::repository::EventRepository;
use storyloom_core::rng::DeterministicRng;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock for event timestamps and phase deadlines.
    pub clock: Arc<dyn Clock>,
    /// RNG for token draws, locked only while a draw is decided.
    pub rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    /// Event store holding every game's stream.
    pub event_repository: Arc<dyn EventRepository>,
    /// Receives facts once a command's events are persisted.
    pub notifier: Arc<dyn TurnNotifier>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
        event_repository: Arc<dyn EventRepository>,
        notifier: Arc<dyn TurnNotifier>,
    ) -> Self {
        Self {
            clock,
            rng,
            event_repository,
            notifier,
        }
    }
}
