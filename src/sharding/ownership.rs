//! Shard ownership table
//!
//! The table is written only by the membership source and read by every
//! routing decision. Readers take an `Arc` snapshot so one request always
//! sees a single consistent version.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::ShardId;

/// Identity of a cluster node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Immutable mapping from shard to owning node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipTable {
    version: u64,
    owners: HashMap<ShardId, NodeId>,
}

impl OwnershipTable {
    /// Build a table from explicit assignments
    pub fn new(owners: HashMap<ShardId, NodeId>) -> Self {
        Self { version: 0, owners }
    }

    /// Version stamped when the table was published, 0 before that
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Current owner of a shard, `None` while it is unassigned
    pub fn owner(&self, shard: ShardId) -> Option<&NodeId> {
        self.owners.get(&shard)
    }

    /// Shards owned by one node, sorted
    pub fn shards_of(&self, node: &NodeId) -> Vec<ShardId> {
        let mut shards: Vec<ShardId> = self
            .owners
            .iter()
            .filter(|(_, owner)| *owner == node)
            .map(|(shard, _)| *shard)
            .collect();
        shards.sort();
        shards
    }

    /// Number of shards with an owner
    pub fn assigned_count(&self) -> usize {
        self.owners.len()
    }
}

/// Shared, read-mostly handle on the current ownership table
#[derive(Debug, Clone, Default)]
pub struct SharedOwnership {
    current: Arc<RwLock<Arc<OwnershipTable>>>,
}

impl SharedOwnership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent view for one routing decision
    pub fn snapshot(&self) -> Arc<OwnershipTable> {
        self.current.read().clone()
    }

    /// Replace the table, stamping it with the next version.
    ///
    /// Returns the published version.
    pub fn publish(&self, mut table: OwnershipTable) -> u64 {
        let mut current = self.current.write();
        table.version = current.version + 1;
        let version = table.version;
        *current = Arc::new(table);
        version
    }
}
