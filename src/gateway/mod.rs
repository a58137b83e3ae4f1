//! Gateway Module
//!
//! Turns external synchronous requests into routed entity messages and
//! waits for the correlated reply.
//!
//! - `ask`: routing, delivery and the timed wait (`AskGateway::ask`)
//! - `artifact`: the six artifact state operations as response bodies

mod artifact;
mod ask;

pub use ask::{AskError, AskGateway};

#[cfg(test)]
pub(crate) fn single_owner_router(
    node: &crate::sharding::NodeId,
    shard_count: u32,
) -> crate::sharding::ShardRouter {
    use crate::sharding::{OwnershipTable, ShardId, ShardRouter, SharedOwnership};

    let ownership = SharedOwnership::new();
    ownership.publish(OwnershipTable::new(
        (0..shard_count).map(|i| (ShardId(i), node.clone())).collect(),
    ));
    ShardRouter::new(shard_count, ownership)
}
