//! In-memory event store
//!
//! Keeps every entity's log in process memory. Used for ephemeral nodes and
//! tests; nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::types::{ArtifactEvent, EntityKey, EventRecord};

use super::store::{EventLog, EventStoreResult};

/// Event store backed by a map of per-entity vectors
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    streams: Mutex<HashMap<EntityKey, Vec<EventRecord>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events appended for a key
    pub fn len(&self, key: &EntityKey) -> usize {
        self.streams.lock().get(key).map(Vec::len).unwrap_or(0)
    }

    /// Whether no entity has appended anything yet
    pub fn is_empty(&self) -> bool {
        self.streams.lock().values().all(Vec::is_empty)
    }

    /// Event types logged for a key, in sequence order
    pub fn events(&self, key: &EntityKey) -> Vec<ArtifactEvent> {
        self.streams
            .lock()
            .get(key)
            .map(|records| records.iter().map(|r| r.event_type).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventLog for MemoryEventStore {
    async fn append(
        &self,
        key: &EntityKey,
        event: ArtifactEvent,
        marker: Option<String>,
    ) -> EventStoreResult<u64> {
        let mut streams = self.streams.lock();
        let stream = streams.entry(key.clone()).or_default();
        let sequence = stream.len() as u64 + 1;
        stream.push(EventRecord::new(key.clone(), sequence, event, marker));
        Ok(sequence)
    }

    async fn read_all(&self, key: &EntityKey) -> EventStoreResult<Vec<EventRecord>> {
        Ok(self.streams.lock().get(key).cloned().unwrap_or_default())
    }
}
