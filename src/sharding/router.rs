//! Shard router: entity key → shard → owning node

use super::{shard_for, NodeId, OwnershipTable, ShardId, SharedOwnership};
use crate::types::EntityKey;

/// Where a message for a key must go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub shard: ShardId,
    pub node: NodeId,
    /// Ownership table version the decision was made against
    pub table_version: u64,
}

/// Routing failures. All of them are retryable by the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// Typically seen while membership is changing
    #[error("{shard} has no owner (ownership version {table_version}), retry later")]
    Unroutable { shard: ShardId, table_version: u64 },
}

impl RoutingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoutingError::Unroutable { .. })
    }
}

/// Stateless router over the shared ownership table.
///
/// Never inspects entity data; only hashes keys and reads ownership
/// snapshots.
#[derive(Debug, Clone)]
pub struct ShardRouter {
    shard_count: u32,
    ownership: SharedOwnership,
}

impl ShardRouter {
    pub fn new(shard_count: u32, ownership: SharedOwnership) -> Self {
        Self {
            shard_count,
            ownership,
        }
    }

    /// Shard of a key, independent of ownership
    pub fn shard_of(&self, key: &EntityKey) -> ShardId {
        shard_for(key, self.shard_count)
    }

    /// Resolve a key against the current ownership snapshot
    pub fn resolve(&self, key: &EntityKey) -> Result<Route, RoutingError> {
        let table = self.ownership.snapshot();
        self.resolve_in(&table, key)
    }

    /// Resolve a key against a given snapshot
    pub fn resolve_in(&self, table: &OwnershipTable, key: &EntityKey) -> Result<Route, RoutingError> {
        let shard = self.shard_of(key);
        match table.owner(shard) {
            Some(node) => Ok(Route {
                shard,
                node: node.clone(),
                table_version: table.version(),
            }),
            None => Err(RoutingError::Unroutable {
                shard,
                table_version: table.version(),
            }),
        }
    }
}
