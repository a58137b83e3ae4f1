//! Request-response correlation for asks.
//!
//! Every ask registers a oneshot channel under a fresh id. The entity holds
//! a [`ReplyTo`] carrying that id; whichever of reply, timeout or drop
//! removes the entry first resolves the ask, so each ask resolves exactly
//! once and replies can never reach another caller.
//!
//! ```text
//!   gateway                          entity worker
//!   register() ──► (ReplyTo, rx)
//!   deliver(envelope{ReplyTo}) ────► handle command
//!   timeout(rx) ◄─────────────────── reply_to.send(result)
//!   abandon(id) on expiry            (late reply is discarded)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::entity::EntityFailure;
use crate::types::ArtifactReply;

/// Unique id of one outstanding ask
pub type AskId = u64;

/// What an entity sends back
pub type ReplyResult = Result<ArtifactReply, EntityFailure>;

/// Table of asks still waiting for their reply
#[derive(Debug, Default)]
pub struct PendingAsks {
    next_id: AtomicU64,
    pending: Mutex<HashMap<AskId, oneshot::Sender<ReplyResult>>>,
}

impl PendingAsks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new ask and hand out its reply handle and receiver
    pub fn register(self: &Arc<Self>) -> (ReplyTo, oneshot::Receiver<ReplyResult>) {
        let ask_id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(ask_id, tx);

        let reply_to = ReplyTo {
            ask_id,
            pending: Some(Arc::clone(self)),
        };
        (reply_to, rx)
    }

    /// Resolve an ask. Returns false if it was already resolved or abandoned.
    pub fn resolve(&self, ask_id: AskId, result: ReplyResult) -> bool {
        let sender = self.pending.lock().remove(&ask_id);
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Give up on an ask; a reply arriving later is discarded
    pub fn abandon(&self, ask_id: AskId) -> bool {
        self.pending.lock().remove(&ask_id).is_some()
    }

    /// Number of asks still waiting
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reply handle carried inside an envelope.
///
/// Dropping it without sending resolves the ask with
/// [`EntityFailure::NoReply`].
pub struct ReplyTo {
    ask_id: AskId,
    pending: Option<Arc<PendingAsks>>,
}

impl ReplyTo {
    pub fn ask_id(&self) -> AskId {
        self.ask_id
    }

    /// Send the reply. Returns false if the ask was abandoned meanwhile.
    pub fn send(mut self, result: ReplyResult) -> bool {
        match self.pending.take() {
            Some(pending) => {
                let delivered = pending.resolve(self.ask_id, result);
                if !delivered {
                    debug!(ask_id = self.ask_id, "reply for abandoned ask discarded");
                }
                delivered
            }
            None => false,
        }
    }
}

impl Drop for ReplyTo {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.resolve(self.ask_id, Err(EntityFailure::NoReply));
        }
    }
}

impl std::fmt::Debug for ReplyTo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyTo")
            .field("ask_id", &self.ask_id)
            .finish()
    }
}
