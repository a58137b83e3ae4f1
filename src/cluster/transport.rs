//! Node transport: hands envelopes to the entity host of a node

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::entity::EntityHost;
use crate::messaging::Envelope;
use crate::sharding::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("no entity host reachable on node {0}")]
    UnknownNode(NodeId),
}

/// Delivers envelopes to the node owning their shard.
///
/// A failed delivery drops the envelope; its reply handle then resolves
/// the ask with a failure.
#[async_trait]
pub trait NodeTransport: Send + Sync + 'static {
    async fn deliver(&self, node: &NodeId, envelope: Envelope) -> Result<(), DeliveryError>;
}

/// Transport between nodes running in the same process
#[derive(Debug, Default)]
pub struct LocalTransport {
    hosts: RwLock<HashMap<NodeId, EntityHost>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a host reachable under its node id
    pub fn register(&self, host: EntityHost) {
        self.hosts.write().insert(host.node_id().clone(), host);
    }

    pub fn unregister(&self, node: &NodeId) -> Option<EntityHost> {
        self.hosts.write().remove(node)
    }
}

#[async_trait]
impl NodeTransport for LocalTransport {
    async fn deliver(&self, node: &NodeId, envelope: Envelope) -> Result<(), DeliveryError> {
        let host = self.hosts.read().get(node).cloned();
        match host {
            Some(host) => {
                host.dispatch(envelope).await;
                Ok(())
            }
            None => Err(DeliveryError::UnknownNode(node.clone())),
        }
    }
}
