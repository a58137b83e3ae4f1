//! Cluster Module
//!
//! Membership, the listener logging its changes, the node transport and
//! the bootstrap tying nodes together.

mod listener;
mod membership;
mod node;
mod transport;

pub use listener::spawn_cluster_listener;
pub use membership::{
    Member, MemberStatus, MembershipEvent, OwnershipObserver, Roles, StaticMembership,
};
pub use node::{Cluster, ClusterError};
pub use transport::{DeliveryError, LocalTransport, NodeTransport};
