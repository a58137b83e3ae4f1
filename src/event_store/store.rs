//! Event Store - access contract for per-entity event logs
//!
//! Every entity owns one append-only log. Only the entity's own runtime
//! instance appends to it; replay reads it back in sequence order.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::types::{ArtifactEvent, EntityKey, EventRecord, ENTITY_TYPE};

/// Configuration for the file-backed event store
#[derive(Debug, Clone)]
pub struct EventStoreConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
    /// Whether to fsync after every append
    pub sync_on_append: bool,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sync_on_append: true,
        }
    }
}

impl EventStoreConfig {
    /// Create config with custom data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding one log file per entity
    pub fn entities_dir(&self) -> PathBuf {
        self.data_dir.join(ENTITY_TYPE)
    }

    /// Path of the log file for one entity.
    ///
    /// User ids are hex encoded so any string maps to a valid file name.
    pub fn entity_log_path(&self, key: &EntityKey) -> PathBuf {
        let encoded: String = key
            .user_id
            .as_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        self.entities_dir()
            .join(format!("{}_{}.jsonl", key.artifact_id, encoded))
    }
}

/// Result type for EventStore operations
pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// Errors that can occur in EventStore operations
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The log holds an event this version cannot interpret
    #[error("unknown event type '{event_type}' at sequence {sequence} of {key}")]
    UnknownEventType {
        key: EntityKey,
        sequence: u64,
        event_type: String,
    },

    /// A record in the log belongs to another entity
    #[error("record for {found} found in the log of {expected}")]
    ForeignRecord { expected: EntityKey, found: EntityKey },

    #[error("event store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only, per-entity ordered event log
#[async_trait]
pub trait EventLog: Send + Sync + 'static {
    /// Durably append one event and return its sequence number.
    ///
    /// Sequence numbers start at 1 and are contiguous per entity. Must only
    /// return once the event is persisted.
    async fn append(
        &self,
        key: &EntityKey,
        event: ArtifactEvent,
        marker: Option<String>,
    ) -> EventStoreResult<u64>;

    /// Read the entity's whole log in sequence order.
    ///
    /// An entity that never appended has an empty log.
    async fn read_all(&self, key: &EntityKey) -> EventStoreResult<Vec<EventRecord>>;

    /// The entity's instance stopped; drop anything cached for it.
    fn release(&self, _key: &EntityKey) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_log_path() {
        let config = EventStoreConfig::new("/tmp/state");
        let path = config.entity_log_path(&EntityKey::new(42, "a/b"));

        assert_eq!(
            path,
            PathBuf::from("/tmp/state/ArtifactState/42_612f62.jsonl")
        );
    }

    #[test]
    fn test_negative_artifact_ids_do_not_collide() {
        let config = EventStoreConfig::new("data");
        let a = config.entity_log_path(&EntityKey::new(-1, "x"));
        let b = config.entity_log_path(&EntityKey::new(1, "x"));
        assert_ne!(a, b);
    }
}
