//! Artifact State Service
//!
//! Per-user artifact state (read, in feed) kept by event-sourced entities
//! that are sharded across cluster nodes and reached through an HTTP
//! gateway.
//!
//! # Features
//!
//! - **Event Sourcing**: every change is an appended event; state is the fold
//! - **Single Writer**: one live instance per entity, one message at a time
//! - **Sharding**: stable FNV-1a placement, rendezvous shard allocation
//! - **Ask Pattern**: correlated replies with a bounded wait
//!
//! # Modules
//!
//! - `types`: Core data structures (EntityKey, events, commands, state)
//! - `event_store`: Append-only per-entity logs (JSONL files or memory)
//! - `entity`: State machine and the per-node entity host
//! - `messaging`: Envelopes and reply correlation
//! - `sharding`: Shard hashing, ownership table and router
//! - `cluster`: Membership, listener, transport and bootstrap
//! - `gateway`: Ask gateway and the typed artifact operations
//! - `protocol`: HTTP request and response bodies
//! - `api`: Axum router and handlers
//! - `config`: Environment configuration
//! - `observability`: Tracing subscriber setup
//! - `utils`: Utility functions (timestamps, etc.)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use artifact_state::{AppConfig, ArtifactAndUser, Cluster, MemoryEventStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let cluster = Cluster::start(&config, Arc::new(MemoryEventStore::new())).unwrap();
//!     let req = ArtifactAndUser::new(1, "a");
//!     cluster.gateway().set_artifact_read_by_user(&req).await;
//!     cluster.shutdown().await;
//! }
//! ```

pub mod api;
pub mod cluster;
pub mod config;
pub mod entity;
pub mod event_store;
pub mod gateway;
pub mod messaging;
pub mod observability;
pub mod protocol;
pub mod sharding;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use cluster::Cluster;
pub use config::AppConfig;
pub use event_store::{EventLog, JsonlEventStore, MemoryEventStore};
pub use gateway::{AskError, AskGateway};
pub use protocol::{AllStatesResponse, ArtifactAndUser, CommandResponse, ExtResponse};
pub use types::{
    AppResult, ArtifactCommand, ArtifactEvent, ArtifactReply, ArtifactState, EntityKey,
    EventRecord,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
