//! Data types for the artifact state service
//!
//! This module contains the core data structures shared by the entity
//! runtime, the event log and the gateway.

mod command;
mod event;
mod key;
mod state;

pub use command::{ArtifactCommand, ArtifactReply};
pub use event::{ArtifactEvent, EventRecord};
pub use key::{EntityKey, ENTITY_TYPE};
pub use state::ArtifactState;

/// Result type for the binary entry point and bootstrap
pub type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
