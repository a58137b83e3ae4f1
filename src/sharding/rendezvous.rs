//! Rendezvous Hashing (Highest Random Weight)
//!
//! Assigns each shard to the node with the highest `hash(shard, node)`
//! score. Removing a node only moves the shards that node owned; adding one
//! only takes shards for itself.

use super::hash::{fnv1a, mix64};
use super::{NodeId, ShardId};

/// Rendezvous hasher over a set of candidate nodes
#[derive(Debug, Clone)]
pub struct RendezvousHasher {
    /// Nodes in the cluster (sorted for determinism)
    nodes: Vec<NodeId>,
}

impl RendezvousHasher {
    /// Create a new hasher with the given nodes.
    pub fn new(mut nodes: Vec<NodeId>) -> Self {
        nodes.sort();
        nodes.dedup();
        Self { nodes }
    }

    /// Look up which node owns the given shard.
    pub fn lookup(&self, shard: ShardId) -> Option<&NodeId> {
        self.nodes.iter().max_by_key(|node| Self::score(shard, node))
    }

    /// Score for a (shard, node) pair. Higher score wins ownership.
    fn score(shard: ShardId, node: &NodeId) -> u64 {
        mix64(fnv1a(node.as_str().as_bytes()) ^ fnv1a(&shard.0.to_be_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(count: usize) -> Vec<NodeId> {
        (0..count).map(|i| NodeId::new(format!("node-{i}"))).collect()
    }

    #[test]
    fn test_empty_returns_none() {
        let hasher = RendezvousHasher::new(vec![]);
        assert!(hasher.lookup(ShardId(0)).is_none());
    }

    #[test]
    fn test_single_node_owns_all() {
        let peers = nodes(1);
        let hasher = RendezvousHasher::new(peers.clone());

        for i in 0..100 {
            assert_eq!(hasher.lookup(ShardId(i)), Some(&peers[0]));
        }
    }

    #[test]
    fn test_order_of_nodes_does_not_matter() {
        let peers = nodes(5);
        let mut reversed = peers.clone();
        reversed.reverse();

        let h1 = RendezvousHasher::new(peers);
        let h2 = RendezvousHasher::new(reversed);

        for i in 0..100 {
            assert_eq!(h1.lookup(ShardId(i)), h2.lookup(ShardId(i)));
        }
    }

    #[test]
    fn test_every_node_gets_shards() {
        let peers = nodes(4);
        let hasher = RendezvousHasher::new(peers.clone());

        let mut counts = vec![0usize; 4];
        for i in 0..1000 {
            if let Some(owner) = hasher.lookup(ShardId(i)) {
                if let Some(idx) = peers.iter().position(|p| p == owner) {
                    counts[idx] += 1;
                }
            }
        }

        for (i, &count) in counts.iter().enumerate() {
            assert!(count > 200, "node {i} got only {count} of 1000 shards");
        }
    }

    #[test]
    fn test_minimal_disruption() {
        let peers = nodes(4);
        let hasher = RendezvousHasher::new(peers.clone());
        let removed = &peers[0];

        let remaining: Vec<_> = peers.iter().skip(1).cloned().collect();
        let new_hasher = RendezvousHasher::new(remaining);

        for i in 0..1000 {
            let shard = ShardId(i);
            let before = hasher.lookup(shard);
            let after = new_hasher.lookup(shard);
            if before != Some(removed) {
                assert_eq!(before, after, "{shard} moved although its owner stayed");
            }
        }
    }
}
