//! Message envelope delivered to an entity's owning node

use crate::types::{ArtifactCommand, EntityKey};

use super::ReplyTo;

/// A command or query addressed to one entity, with its reply handle
#[derive(Debug)]
pub struct Envelope {
    pub key: EntityKey,
    pub command: ArtifactCommand,
    pub reply_to: ReplyTo,
}

impl Envelope {
    pub fn new(key: EntityKey, command: ArtifactCommand, reply_to: ReplyTo) -> Self {
        Self {
            key,
            command,
            reply_to,
        }
    }
}
