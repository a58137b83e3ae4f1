//! Entity Module
//!
//! The artifact state machine and the runtime hosting its live instances.
//!
//! - `behavior`: pure command handling and event folding
//! - `host`: one worker task per active key, fed by a bounded mailbox

mod behavior;
mod host;

pub use behavior::{apply_event, handle_command, replay, ReplayError, Replayed};
pub use host::{EntityHost, HostConfig};

use crate::sharding::NodeId;
use crate::types::{ArtifactEvent, EntityKey};

/// Failure an entity reports instead of a reply
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityFailure {
    /// Log could not be read or replayed
    #[error("activation of {key} failed: {reason}")]
    ActivationFailed { key: EntityKey, reason: String },

    /// Event was not made durable; state is unchanged
    #[error("persisting {event} for {key} failed: {reason}")]
    PersistFailed {
        key: EntityKey,
        event: ArtifactEvent,
        reason: String,
    },

    /// Instance stopped before handling the message
    #[error("entity {key} stopped: {reason}")]
    Stopped { key: EntityKey, reason: String },

    /// The key's shard is owned by another node now; the caller may retry
    #[error("{node} no longer owns entity {key}, retry later")]
    NotOwner { key: EntityKey, node: NodeId },

    #[error("entity host on {node} is shut down")]
    HostStopped { node: NodeId },

    #[error("entity dropped the request without replying")]
    NoReply,
}
