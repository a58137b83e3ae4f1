//! Event types for Event Sourcing
//!
//! Events are the immutable facts appended to an entity's log. The current
//! state of an entity is derived solely by folding its events in sequence
//! order.

use serde::{Deserialize, Serialize};

use super::EntityKey;

/// Facts that can be recorded for an artifact/user pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactEvent {
    /// The user read the artifact
    Read,
    /// The artifact was added to the user's feed
    AddedToFeed,
    /// The artifact was removed from the user's feed
    RemovedFromFeed,
}

impl ArtifactEvent {
    /// All event types known to this version of the state machine
    pub const ALL: [ArtifactEvent; 3] = [
        ArtifactEvent::Read,
        ArtifactEvent::AddedToFeed,
        ArtifactEvent::RemovedFromFeed,
    ];

    /// Tag written to the log
    pub fn tag(&self) -> &'static str {
        match self {
            ArtifactEvent::Read => "read",
            ArtifactEvent::AddedToFeed => "added_to_feed",
            ArtifactEvent::RemovedFromFeed => "removed_from_feed",
        }
    }

    /// Resolve a logged tag, `None` if this version does not know it
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.tag() == tag)
    }
}

impl std::fmt::Display for ArtifactEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One persisted entry of an entity's event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "entityKey")]
    pub entity_key: EntityKey,

    /// Position in the entity's log, contiguous from 1
    #[serde(rename = "sequenceNumber")]
    pub sequence_number: u64,

    #[serde(rename = "eventType")]
    pub event_type: ArtifactEvent,

    /// Unix timestamp in milliseconds
    pub timestamp: i64,

    /// Diagnostic marker, the node that appended the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
}

impl EventRecord {
    /// Create a record stamped with the current time
    pub fn new(
        entity_key: EntityKey,
        sequence_number: u64,
        event_type: ArtifactEvent,
        marker: Option<String>,
    ) -> Self {
        Self {
            entity_key,
            sequence_number,
            event_type,
            timestamp: crate::utils::current_timestamp_millis(),
            marker,
        }
    }

    /// Serialize to a single JSON line
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tags_round_trip() {
        for event in ArtifactEvent::ALL {
            assert_eq!(ArtifactEvent::from_tag(event.tag()), Some(event));

            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.tag()));
        }
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(ArtifactEvent::from_tag("artifact_archived"), None);
        assert_eq!(ArtifactEvent::from_tag(""), None);
    }

    #[test]
    fn test_record_serialization() {
        let record = EventRecord {
            entity_key: EntityKey::new(1, "a"),
            sequence_number: 3,
            event_type: ArtifactEvent::AddedToFeed,
            timestamp: 1_704_067_200_000,
            marker: None,
        };

        let json = record.to_json_line().unwrap();
        assert!(json.contains("\"entityKey\":{\"artifactId\":1,\"userId\":\"a\"}"));
        assert!(json.contains("\"sequenceNumber\":3"));
        assert!(json.contains("\"eventType\":\"added_to_feed\""));
        assert!(!json.contains("marker"));
    }

    #[test]
    fn test_record_with_marker() {
        let record = EventRecord::new(
            EntityKey::new(7, "bob"),
            1,
            ArtifactEvent::Read,
            Some("node-1".to_string()),
        );

        let json = record.to_json_line().unwrap();
        assert!(json.contains("\"marker\":\"node-1\""));
        assert!(record.timestamp > 0);
    }
}
