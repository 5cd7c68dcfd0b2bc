//! Test notifier — records published facts for assertions.

use std::sync::Mutex;

use async_trait::async_trait;
use storyloom_core::notifier::{TurnFact, TurnNotifier};

/// A notifier that keeps every fact it receives.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    facts: Mutex<Vec<TurnFact>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the published facts, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn facts(&self) -> Vec<TurnFact> {
        self.facts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TurnNotifier for RecordingNotifier {
    async fn publish(&self, fact: TurnFact) {
        self.facts.lock().unwrap().push(fact);
    }
}
