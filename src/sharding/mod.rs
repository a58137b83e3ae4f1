//! Sharding Module
//!
//! Deterministic placement of entities on nodes.
//!
//! ## Architecture
//!
//! ```text
//! EntityKey ──fnv1a──► ShardId ──OwnershipTable snapshot──► NodeId
//!                                        ▲
//!                        membership publishes new versions
//!                        (RendezvousHasher over live nodes)
//! ```

mod hash;
mod ownership;
mod rendezvous;
mod router;

pub use hash::{fnv1a, mix64, shard_for, ShardId};
pub use ownership::{NodeId, OwnershipTable, SharedOwnership};
pub use rendezvous::RendezvousHasher;
pub use router::{Route, RoutingError, ShardRouter};
