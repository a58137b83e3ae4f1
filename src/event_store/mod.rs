//! Event Store Module for Event Sourcing
//!
//! This module provides the append-only log each entity persists to:
//! - `EventLog`: the access contract (`append`, `read_all`)
//! - `JsonlEventStore`: durable, one JSONL file per entity
//! - `MemoryEventStore`: process-local, for ephemeral nodes and tests
//!
//! # Architecture
//!
//! ```text
//! Write Path (inside the entity's single worker):
//! ┌─────────┐    ┌────────────────┐    ┌───────────────┐    ┌──────────┐
//! │ command │───►│ handle_command │───►│ append + sync │───►│  reply   │
//! └─────────┘    └────────────────┘    └───────────────┘    └──────────┘
//!
//! Read Path (activation):
//! ┌───────────────┐    ┌─────────────────┐
//! │ read_all(key) │───►│ fold from empty │───► Ready!
//! └───────────────┘    └─────────────────┘
//! ```

mod jsonl;
mod memory;
mod store;

pub use jsonl::JsonlEventStore;
pub use memory::MemoryEventStore;
pub use store::{EventLog, EventStoreConfig, EventStoreError, EventStoreResult};
