//! JSONL file event store
//!
//! One append-only file per entity, one JSON record per line. Appends are
//! fsynced before they are acknowledged.
//!
//! A crash in the middle of an append can leave an unterminated last line.
//! Reads ignore it when it does not parse, and the next append cuts it off
//! before writing, so one torn write never makes an entity unreadable.
//! Corrupt lines anywhere else stay fatal.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::types::{ArtifactEvent, EntityKey, EventRecord};

use super::store::{EventLog, EventStoreConfig, EventStoreError, EventStoreResult};

/// Log line as written on disk, before the event tag is interpreted
#[derive(Debug, Deserialize)]
struct StoredRecord {
    #[serde(rename = "entityKey")]
    entity_key: EntityKey,
    #[serde(rename = "sequenceNumber")]
    sequence_number: u64,
    #[serde(rename = "eventType")]
    event_type: String,
    timestamp: i64,
    #[serde(default)]
    marker: Option<String>,
}

impl StoredRecord {
    fn into_record(self) -> EventStoreResult<EventRecord> {
        let event_type = ArtifactEvent::from_tag(&self.event_type).ok_or_else(|| {
            EventStoreError::UnknownEventType {
                key: self.entity_key.clone(),
                sequence: self.sequence_number,
                event_type: self.event_type.clone(),
            }
        })?;

        Ok(EventRecord {
            entity_key: self.entity_key,
            sequence_number: self.sequence_number,
            event_type,
            timestamp: self.timestamp,
            marker: self.marker,
        })
    }
}

/// File-backed event store, one JSONL file per entity
#[derive(Debug, Clone)]
pub struct JsonlEventStore {
    config: EventStoreConfig,
    /// Last sequence number written per entity, filled lazily
    last_sequence: Arc<Mutex<HashMap<EntityKey, u64>>>,
}

impl JsonlEventStore {
    /// Create a store rooted at the configured data directory
    pub fn new(config: EventStoreConfig) -> Self {
        Self {
            config,
            last_sequence: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &EventStoreConfig {
        &self.config
    }

    fn read_records(path: &Path, key: &EntityKey) -> EventStoreResult<Vec<EventRecord>> {
        let contents = match std::fs::read(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let (complete, tail) = split_tail(&contents);
        let mut records = Vec::new();

        for line in complete.split(|b| *b == b'\n') {
            if line.trim_ascii().is_empty() {
                continue;
            }
            let stored: StoredRecord = serde_json::from_slice(line)?;
            records.push(Self::decode(stored, key)?);
        }

        if let Some(tail) = tail {
            match serde_json::from_slice::<StoredRecord>(tail) {
                Ok(stored) => records.push(Self::decode(stored, key)?),
                Err(e) => warn!(
                    persistence_id = %key.persistence_id(),
                    bytes = tail.len(),
                    error = %e,
                    "ignoring incomplete trailing record"
                ),
            }
        }

        Ok(records)
    }

    fn decode(stored: StoredRecord, key: &EntityKey) -> EventStoreResult<EventRecord> {
        let record = stored.into_record()?;
        if &record.entity_key != key {
            return Err(EventStoreError::ForeignRecord {
                expected: key.clone(),
                found: record.entity_key,
            });
        }
        Ok(record)
    }

    fn append_record(path: &Path, record: &EventRecord, sync: bool) -> EventStoreResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        Self::seal_tail(&mut file, &record.entity_key)?;
        writeln!(file, "{}", record.to_json_line()?)?;

        if sync {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Make sure the file ends with a newline before appending: a complete
    /// but unterminated record gets its newline, a torn one is cut off.
    fn seal_tail(file: &mut std::fs::File, key: &EntityKey) -> EventStoreResult<()> {
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(());
        }

        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] == b'\n' {
            return Ok(());
        }

        let mut contents = Vec::with_capacity(len as usize);
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut contents)?;
        let (complete, tail) = split_tail(&contents);

        match tail {
            Some(tail) if serde_json::from_slice::<StoredRecord>(tail).is_ok() => {
                file.write_all(b"\n")?;
            }
            _ => {
                warn!(
                    persistence_id = %key.persistence_id(),
                    bytes = contents.len() - complete.len(),
                    "truncating incomplete trailing record"
                );
                file.set_len(complete.len() as u64)?;
            }
        }
        Ok(())
    }

    /// Number of entities with a cached sequence number
    #[cfg(test)]
    pub(crate) fn cached_entities(&self) -> usize {
        self.last_sequence.lock().len()
    }
}

/// Split file contents into the newline-terminated part and a non-blank
/// unterminated tail
fn split_tail(contents: &[u8]) -> (&[u8], Option<&[u8]>) {
    let (complete, tail) = match contents.iter().rposition(|b| *b == b'\n') {
        Some(end) => contents.split_at(end + 1),
        None => contents.split_at(0),
    };
    let tail = (!tail.trim_ascii().is_empty()).then_some(tail);
    (complete, tail)
}

#[async_trait]
impl EventLog for JsonlEventStore {
    async fn append(
        &self,
        key: &EntityKey,
        event: ArtifactEvent,
        marker: Option<String>,
    ) -> EventStoreResult<u64> {
        let path = self.config.entity_log_path(key);
        let known = self.last_sequence.lock().get(key).copied();
        let sync = self.config.sync_on_append;
        let owned_key = key.clone();

        let result = tokio::task::spawn_blocking(move || -> EventStoreResult<u64> {
            let last = match known {
                Some(last) => last,
                None => Self::read_records(&path, &owned_key)?
                    .last()
                    .map(|r| r.sequence_number)
                    .unwrap_or(0),
            };

            let record = EventRecord::new(owned_key, last + 1, event, marker);
            Self::append_record(&path, &record, sync)?;
            Ok(record.sequence_number)
        })
        .await
        .map_err(|e| EventStoreError::Unavailable(e.to_string()))?;

        match result {
            Ok(sequence) => {
                self.last_sequence.lock().insert(key.clone(), sequence);
                debug!(persistence_id = %key.persistence_id(), sequence, event = %event, "appended event");
                Ok(sequence)
            }
            Err(e) => {
                // A partial write may have happened; re-read on the next append
                self.last_sequence.lock().remove(key);
                warn!(persistence_id = %key.persistence_id(), error = %e, "append failed");
                Err(e)
            }
        }
    }

    async fn read_all(&self, key: &EntityKey) -> EventStoreResult<Vec<EventRecord>> {
        let path = self.config.entity_log_path(key);
        let owned_key = key.clone();

        let records = tokio::task::spawn_blocking(move || Self::read_records(&path, &owned_key))
            .await
            .map_err(|e| EventStoreError::Unavailable(e.to_string()))??;

        let last = records.last().map(|r| r.sequence_number).unwrap_or(0);
        self.last_sequence.lock().insert(key.clone(), last);

        Ok(records)
    }

    fn release(&self, key: &EntityKey) {
        self.last_sequence.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (JsonlEventStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlEventStore::new(EventStoreConfig::new(temp_dir.path()));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_append_and_read() {
        let (store, _temp_dir) = create_test_store();
        let key = EntityKey::new(1, "a");

        let s1 = store.append(&key, ArtifactEvent::Read, None).await.unwrap();
        let s2 = store
            .append(&key, ArtifactEvent::AddedToFeed, Some("node-1".to_string()))
            .await
            .unwrap();

        assert_eq!(s1, 1);
        assert_eq!(s2, 2);

        let records = store.read_all(&key).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_type, ArtifactEvent::Read);
        assert_eq!(records[1].event_type, ArtifactEvent::AddedToFeed);
        assert_eq!(records[1].marker.as_deref(), Some("node-1"));
    }

    #[tokio::test]
    async fn test_unknown_key_has_empty_log() {
        let (store, _temp_dir) = create_test_store();
        let records = store.read_all(&EntityKey::new(42, "new")).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_sequence_survives_restart() {
        let (store, temp_dir) = create_test_store();
        let key = EntityKey::new(5, "carol");

        store.append(&key, ArtifactEvent::Read, None).await.unwrap();
        store.append(&key, ArtifactEvent::AddedToFeed, None).await.unwrap();

        // A fresh store instance has no cached sequence numbers
        let reopened = JsonlEventStore::new(EventStoreConfig::new(temp_dir.path()));
        let sequence = reopened
            .append(&key, ArtifactEvent::RemovedFromFeed, None)
            .await
            .unwrap();
        assert_eq!(sequence, 3);

        let records = reopened.read_all(&key).await.unwrap();
        let sequences: Vec<u64> = records.iter().map(|r| r.sequence_number).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_entities_are_isolated() {
        let (store, _temp_dir) = create_test_store();
        let a = EntityKey::new(1, "23");
        let b = EntityKey::new(12, "3");

        store.append(&a, ArtifactEvent::Read, None).await.unwrap();
        store.append(&b, ArtifactEvent::AddedToFeed, None).await.unwrap();

        assert_eq!(store.read_all(&a).await.unwrap().len(), 1);
        assert_eq!(
            store.read_all(&b).await.unwrap()[0].event_type,
            ArtifactEvent::AddedToFeed
        );
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_rejected() {
        let (store, _temp_dir) = create_test_store();
        let key = EntityKey::new(9, "dave");

        store.append(&key, ArtifactEvent::Read, None).await.unwrap();

        let path = store.config().entity_log_path(&key);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(
            file,
            r#"{{"entityKey":{{"artifactId":9,"userId":"dave"}},"sequenceNumber":2,"eventType":"artifact_archived","timestamp":0}}"#
        )
        .unwrap();

        let err = store.read_all(&key).await.unwrap_err();
        match err {
            EventStoreError::UnknownEventType {
                sequence,
                event_type,
                ..
            } => {
                assert_eq!(sequence, 2);
                assert_eq!(event_type, "artifact_archived");
            }
            other => panic!("expected UnknownEventType, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let (store, _temp_dir) = create_test_store();
        let key = EntityKey::new(3, "erin");

        store.append(&key, ArtifactEvent::Read, None).await.unwrap();
        let path = store.config().entity_log_path(&key);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file).unwrap();

        assert_eq!(store.read_all(&key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_torn_last_line_is_ignored_and_cut_off() {
        let (store, temp_dir) = create_test_store();
        let key = EntityKey::new(4, "frank");

        store.append(&key, ArtifactEvent::AddedToFeed, None).await.unwrap();
        let path = store.config().entity_log_path(&key);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, r#"{{"entityKey":{{"artifactId":4,"userId":"fr"#).unwrap();
        drop(file);

        // A fresh store, as after the crash that tore the write
        let reopened = JsonlEventStore::new(EventStoreConfig::new(temp_dir.path()));
        let records = reopened.read_all(&key).await.unwrap();
        assert_eq!(records.len(), 1);

        reopened.release(&key);
        let sequence = reopened
            .append(&key, ArtifactEvent::Read, None)
            .await
            .unwrap();
        assert_eq!(sequence, 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with('\n'));
        for line in contents.lines() {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
        assert_eq!(contents.lines().count(), 2);

        let events: Vec<ArtifactEvent> = reopened
            .read_all(&key)
            .await
            .unwrap()
            .iter()
            .map(|r| r.event_type)
            .collect();
        assert_eq!(events, vec![ArtifactEvent::AddedToFeed, ArtifactEvent::Read]);
    }

    #[tokio::test]
    async fn test_unterminated_complete_record_is_kept() {
        let (store, _temp_dir) = create_test_store();
        let key = EntityKey::new(6, "gina");

        std::fs::create_dir_all(store.config().entities_dir()).unwrap();
        std::fs::write(
            store.config().entity_log_path(&key),
            r#"{"entityKey":{"artifactId":6,"userId":"gina"},"sequenceNumber":1,"eventType":"read","timestamp":0}"#,
        )
        .unwrap();

        assert_eq!(store.read_all(&key).await.unwrap().len(), 1);
        assert_eq!(
            store.append(&key, ArtifactEvent::AddedToFeed, None).await.unwrap(),
            2
        );
        assert_eq!(store.read_all(&key).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_line_in_the_middle_is_fatal() {
        let (store, _temp_dir) = create_test_store();
        let key = EntityKey::new(8, "hank");

        store.append(&key, ArtifactEvent::Read, None).await.unwrap();
        let path = store.config().entity_log_path(&key);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        drop(file);
        store.append(&key, ArtifactEvent::AddedToFeed, None).await.unwrap();

        let err = store.read_all(&key).await.unwrap_err();
        assert!(matches!(err, EventStoreError::Json(_)));
    }

    #[tokio::test]
    async fn test_release_drops_cached_sequence() {
        let (store, _temp_dir) = create_test_store();
        let key = EntityKey::new(2, "ivy");

        store.append(&key, ArtifactEvent::Read, None).await.unwrap();
        assert_eq!(store.cached_entities(), 1);

        store.release(&key);
        assert_eq!(store.cached_entities(), 0);

        // The next append picks the sequence up from the file again
        assert_eq!(
            store.append(&key, ArtifactEvent::AddedToFeed, None).await.unwrap(),
            2
        );
    }
}
