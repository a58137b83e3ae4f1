//! Entity identity

use serde::{Deserialize, Serialize};

/// Entity type name, used as the prefix of every persistence id
pub const ENTITY_TYPE: &str = "ArtifactState";

/// Identity of one artifact/user state entity.
///
/// Caller supplied and never regenerated. The same key is the input of
/// shard assignment and the identity of the entity's event log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    #[serde(rename = "artifactId")]
    pub artifact_id: i64,
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl EntityKey {
    /// Create a new key
    pub fn new(artifact_id: i64, user_id: impl Into<String>) -> Self {
        Self {
            artifact_id,
            user_id: user_id.into(),
        }
    }

    /// Persistence id of this entity's log, as it appears in spans and
    /// store diagnostics
    pub fn persistence_id(&self) -> String {
        format!("{}|{}|{}", ENTITY_TYPE, self.artifact_id, self.user_id)
    }

    /// Canonical byte encoding used for hashing.
    ///
    /// The artifact id is written as fixed-width big-endian so no separator
    /// is needed between the two parts.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.user_id.len());
        bytes.extend_from_slice(&self.artifact_id.to_be_bytes());
        bytes.extend_from_slice(self.user_id.as_bytes());
        bytes
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.artifact_id, self.user_id)
    }
}
