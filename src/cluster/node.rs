//! Cluster bootstrap
//!
//! Builds every configured node inside this process: `sharded` nodes get
//! an entity host over the shared event log, `endpoint` nodes get an ask
//! gateway. All of them route through one ownership table kept by the
//! static membership, and every host observes it to hand off the entities
//! of shards it loses.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use super::{spawn_cluster_listener, LocalTransport, OwnershipObserver, StaticMembership};
use crate::config::AppConfig;
use crate::entity::{EntityHost, HostConfig};
use crate::event_store::EventLog;
use crate::gateway::AskGateway;
use crate::sharding::{NodeId, OwnershipTable, ShardRouter, SharedOwnership};

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("no endpoint node configured")]
    NoEndpoint,
}

/// The running set of nodes
pub struct Cluster {
    membership: Arc<StaticMembership>,
    transport: Arc<LocalTransport>,
    hosts: Vec<EntityHost>,
    gateways: BTreeMap<NodeId, AskGateway>,
    primary: AskGateway,
    listener: JoinHandle<()>,
}

impl Cluster {
    /// Start all configured nodes. Must run inside a tokio runtime.
    pub fn start(config: &AppConfig, log: Arc<dyn EventLog>) -> Result<Self, ClusterError> {
        let ownership = SharedOwnership::new();
        let membership = Arc::new(StaticMembership::new(config.shard_count, ownership.clone()));
        let listener = spawn_cluster_listener(membership.subscribe());
        let transport = Arc::new(LocalTransport::new());
        let router = ShardRouter::new(config.shard_count, ownership);

        let mut hosts = Vec::new();
        let mut gateways = BTreeMap::new();
        for node in &config.nodes {
            info!(node = %node.id, roles = %node.roles, "Starting node");

            if node.roles.sharded {
                let host = EntityHost::sharded(
                    HostConfig {
                        node_id: node.id.clone(),
                        mailbox_capacity: config.mailbox_capacity,
                        idle_timeout: config.idle_timeout,
                    },
                    Arc::clone(&log),
                    router.clone(),
                );
                membership.observe(Arc::new(host.clone()));
                transport.register(host.clone());
                hosts.push(host);
            }
            if node.roles.endpoint {
                let gateway = AskGateway::new(
                    node.id.clone(),
                    router.clone(),
                    transport.clone(),
                    config.ask_timeout,
                );
                gateways.insert(node.id.clone(), gateway);
            }

            membership.member_up(node.id.clone(), node.roles);
        }

        let primary = gateways
            .values()
            .next()
            .cloned()
            .ok_or(ClusterError::NoEndpoint)?;

        Ok(Self {
            membership,
            transport,
            hosts,
            gateways,
            primary,
            listener,
        })
    }

    /// Gateway of the first endpoint node
    pub fn gateway(&self) -> &AskGateway {
        &self.primary
    }

    pub fn gateway_on(&self, node: &NodeId) -> Option<&AskGateway> {
        self.gateways.get(node)
    }

    pub fn membership(&self) -> &Arc<StaticMembership> {
        &self.membership
    }

    pub fn host(&self, node: &NodeId) -> Option<&EntityHost> {
        self.hosts.iter().find(|host| host.node_id() == node)
    }

    /// Live entity instances across all nodes
    pub fn active_entities(&self) -> usize {
        self.hosts.iter().map(EntityHost::active_count).sum()
    }

    /// Stop every host after draining its entities
    pub async fn shutdown(self) {
        info!(nodes = self.hosts.len(), "Shutting down cluster");
        for host in &self.hosts {
            self.transport.unregister(host.node_id());
            host.shutdown().await;
        }
        self.listener.abort();
    }
}

impl OwnershipObserver for EntityHost {
    fn ownership_changed(&self, table: &OwnershipTable) {
        self.release_unowned(table);
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("hosts", &self.hosts)
            .field("gateways", &self.gateways.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeSpec;
    use crate::event_store::MemoryEventStore;
    use crate::protocol::ArtifactAndUser;

    fn config(nodes: &str) -> AppConfig {
        AppConfig {
            nodes: nodes
                .split(',')
                .map(|spec| spec.parse::<NodeSpec>().unwrap())
                .collect(),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_roles_decide_what_each_node_runs() {
        let cluster = Cluster::start(
            &config("a:sharded,b:sharded,gw:endpoint"),
            Arc::new(MemoryEventStore::new()),
        )
        .unwrap();

        assert!(cluster.host(&NodeId::from("a")).is_some());
        assert!(cluster.host(&NodeId::from("gw")).is_none());
        assert!(cluster.gateway_on(&NodeId::from("a")).is_none());
        assert_eq!(cluster.gateway().node_id(), &NodeId::from("gw"));

        let table = cluster.membership().ownership().snapshot();
        assert_eq!(table.assigned_count(), 100);
        assert!(table.shards_of(&NodeId::from("gw")).is_empty());

        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_entities_live_on_their_shard_owner() {
        let cluster = Cluster::start(
            &config("a:sharded,b:sharded,gw:endpoint"),
            Arc::new(MemoryEventStore::new()),
        )
        .unwrap();
        let req = ArtifactAndUser::new(1, "a");

        assert!(cluster.gateway().set_artifact_read_by_user(&req).await.success);

        let gateway_router = ShardRouter::new(100, cluster.membership().ownership().clone());
        let owner = gateway_router.resolve(&req.key()).unwrap().node;
        assert_eq!(cluster.host(&owner).unwrap().active_count(), 1);
        assert_eq!(cluster.active_entities(), 1);

        cluster.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_rejected() {
        let result = Cluster::start(&config("a:sharded"), Arc::new(MemoryEventStore::new()));
        assert!(matches!(result, Err(ClusterError::NoEndpoint)));
    }
}
