//! In-memory implementation of the `EventRepository` trait.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use storyloom_core::error::DomainError;
use storyloom_core::repository::{EventRepository, StoredEvent};

/// Event streams held in process memory, keyed by aggregate.
///
/// The write lock is held for the whole version check and append, so two
/// writers that loaded the same version cannot both succeed.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    streams: RwLock<HashMap<Uuid, Vec<StoredEvent>>>,
}

impl InMemoryEventRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events stored for an aggregate.
    pub async fn stream_len(&self, aggregate_id: Uuid) -> usize {
        self.streams
            .read()
            .await
            .get(&aggregate_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .streams
            .read()
            .await
            .get(&aggregate_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        let mut streams = self.streams.write().await;
        let stream = streams.entry(aggregate_id).or_default();
        let actual = stream.last().map_or(0, |e| e.sequence_number);

        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        stream.extend_from_slice(events);
        Ok(())
    }
}
