//! Ask gateway: synchronous request → routed entity message → reply
//!
//! The whole exchange (routing, delivery and the wait for the reply) runs
//! under one timeout. The wait never blocks a runtime thread.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::cluster::{DeliveryError, NodeTransport};
use crate::entity::EntityFailure;
use crate::messaging::{Envelope, PendingAsks, ReplyResult, ReplyTo};
use crate::sharding::{NodeId, RoutingError, ShardRouter};
use crate::types::{ArtifactCommand, ArtifactReply, EntityKey};
use crate::utils::format_duration;

/// Why an ask produced no reply
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error(transparent)]
    Unroutable(#[from] RoutingError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Ask timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Entity(#[from] EntityFailure),

    #[error("reply channel closed before a reply arrived")]
    Abandoned,
}

/// Entry point for external requests on an endpoint node
#[derive(Clone)]
pub struct AskGateway {
    node: NodeId,
    router: ShardRouter,
    transport: Arc<dyn NodeTransport>,
    pending: Arc<PendingAsks>,
    timeout: Duration,
}

impl AskGateway {
    pub fn new(
        node: NodeId,
        router: ShardRouter,
        transport: Arc<dyn NodeTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            node,
            router,
            transport,
            pending: PendingAsks::new(),
            timeout,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Asks still waiting for their reply
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Send a command to its entity and wait for the reply.
    ///
    /// A timed out ask is abandoned: the command may still execute, but its
    /// reply is discarded.
    pub async fn ask(
        &self,
        key: EntityKey,
        command: ArtifactCommand,
    ) -> Result<ArtifactReply, AskError> {
        let (reply_to, reply) = self.pending.register();
        let ask_id = reply_to.ask_id();

        match tokio::time::timeout(self.timeout, self.exchange(key.clone(), command, reply_to, reply))
            .await
        {
            Ok(result) => {
                if let Err(err) = &result {
                    self.pending.abandon(ask_id);
                    debug!(ask_id, key = %key, %command, error = %err, "Ask failed");
                }
                result
            }
            Err(_) => {
                self.pending.abandon(ask_id);
                warn!(
                    ask_id,
                    key = %key,
                    %command,
                    timeout = %format_duration(self.timeout),
                    "Ask timed out"
                );
                Err(AskError::Timeout(self.timeout))
            }
        }
    }

    async fn exchange(
        &self,
        key: EntityKey,
        command: ArtifactCommand,
        reply_to: ReplyTo,
        reply: oneshot::Receiver<ReplyResult>,
    ) -> Result<ArtifactReply, AskError> {
        let route = self.router.resolve(&key)?;
        debug!(
            ask_id = reply_to.ask_id(),
            key = %key,
            %command,
            query = command.is_query(),
            shard = %route.shard,
            node = %route.node,
            "Routing ask"
        );

        self.transport
            .deliver(&route.node, Envelope::new(key, command, reply_to))
            .await?;

        match reply.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AskError::Abandoned),
        }
    }
}

impl std::fmt::Debug for AskGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AskGateway")
            .field("node", &self.node)
            .field("timeout", &self.timeout)
            .field("pending", &self.pending.len())
            .finish()
    }
}
