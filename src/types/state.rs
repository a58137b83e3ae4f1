//! Folded entity state

use serde::{Deserialize, Serialize};

/// Current state of one artifact/user pair.
///
/// Never mutated directly; always the fold of the entity's events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactState {
    pub read: bool,
    #[serde(rename = "inFeed")]
    pub in_feed: bool,
}
