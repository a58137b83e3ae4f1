//! Commands, queries and replies exchanged with an entity

use super::ArtifactState;

/// Messages an artifact state entity understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactCommand {
    /// Mark the artifact as read by the user
    SetRead,
    /// Add the artifact to the user's feed
    SetAddedToFeed,
    /// Remove the artifact from the user's feed
    SetRemovedFromFeed,
    /// Ask whether the artifact was read
    IsRead,
    /// Ask whether the artifact is in the user's feed
    IsInFeed,
    /// Ask for both flags
    GetAll,
}

impl ArtifactCommand {
    /// Read-only messages never produce an event
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            ArtifactCommand::IsRead | ArtifactCommand::IsInFeed | ArtifactCommand::GetAll
        )
    }
}

impl std::fmt::Display for ArtifactCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArtifactCommand::SetRead => "SetRead",
            ArtifactCommand::SetAddedToFeed => "SetAddedToFeed",
            ArtifactCommand::SetRemovedFromFeed => "SetRemovedFromFeed",
            ArtifactCommand::IsRead => "IsRead",
            ArtifactCommand::IsInFeed => "IsInFeed",
            ArtifactCommand::GetAll => "GetAll",
        };
        f.write_str(name)
    }
}

/// Replies sent back by an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactReply {
    /// A command's event was durably appended
    Okay,
    ArtifactRead(bool),
    ArtifactInUserFeed(bool),
    AllStates(ArtifactState),
}
