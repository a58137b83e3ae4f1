//! Entity host: the runtime for one node's live entities
//!
//! At most one instance per key is alive on a node. Each instance is a
//! tokio task owning the entity's state and draining a bounded mailbox one
//! message at a time, so commands for a key never interleave while
//! different keys run in parallel.
//!
//! ```text
//! dispatch(envelope) ──► mailbox (mpsc, bounded) ──► worker
//!                                                     ├─ handle_command
//!                                                     ├─ append event (durable)
//!                                                     ├─ apply_event
//!                                                     └─ reply
//! ```
//!
//! Instances are activated lazily by the first message and replay their
//! log before handling it. An instance goes away when it passivates (idle
//! timeout or explicit request, only with nothing in flight), when
//! persisting an event fails, when its shard moves to another node, or when
//! the host shuts down. A sharded host checks ownership on every message,
//! so an instance that lost its shard never handles another one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use super::behavior::{apply_event, handle_command, replay};
use super::EntityFailure;
use crate::event_store::EventLog;
use crate::messaging::{Envelope, ReplyResult};
use crate::sharding::{NodeId, OwnershipTable, ShardRouter};
use crate::types::{ArtifactCommand, ArtifactState, EntityKey};

/// A message that finds its instance retiring is retried once on a fresh one
const DELIVERY_ATTEMPTS: usize = 2;

/// Entity host settings
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Node this host runs on; written as the marker of every event
    pub node_id: NodeId,
    /// Bounded mailbox size per instance
    pub mailbox_capacity: usize,
    /// Passivate after this long without messages; `None` keeps instances
    /// until shutdown
    pub idle_timeout: Option<Duration>,
}

impl HostConfig {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            mailbox_capacity: 64,
            idle_timeout: Some(Duration::from_secs(120)),
        }
    }
}

enum Mailbox {
    Deliver(Envelope),
    Passivate(oneshot::Sender<bool>),
}

struct EntitySlot {
    incarnation: u64,
    mailbox: mpsc::Sender<Mailbox>,
    /// Delivered messages not yet handled; passivation waits for zero
    in_flight: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

/// One message counted as in flight until it is handed to the mailbox.
/// Dropped without `delivered` (failed send, cancelled dispatch) it gives
/// the count back.
struct InFlight {
    count: Arc<AtomicUsize>,
    armed: bool,
}

impl InFlight {
    fn delivered(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.armed {
            self.count.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

struct HostInner {
    config: HostConfig,
    log: Arc<dyn EventLog>,
    /// Ownership this host fences its instances with; `None` owns every key
    router: Option<ShardRouter>,
    entities: Mutex<HashMap<EntityKey, EntitySlot>>,
    /// Workers detached by a handoff that may still be draining
    retiring: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
    next_incarnation: AtomicU64,
}

/// Hosts the live entity instances of one node
#[derive(Clone)]
pub struct EntityHost {
    inner: Arc<HostInner>,
}

impl EntityHost {
    /// Host that serves every key it is given
    pub fn new(config: HostConfig, log: Arc<dyn EventLog>) -> Self {
        Self::build(config, log, None)
    }

    /// Host that only serves keys whose shard the router assigns to its node
    pub fn sharded(config: HostConfig, log: Arc<dyn EventLog>, router: ShardRouter) -> Self {
        Self::build(config, log, Some(router))
    }

    fn build(config: HostConfig, log: Arc<dyn EventLog>, router: Option<ShardRouter>) -> Self {
        Self {
            inner: Arc::new(HostInner {
                config,
                log,
                router,
                entities: Mutex::new(HashMap::new()),
                retiring: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                next_incarnation: AtomicU64::new(0),
            }),
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.inner.config.node_id
    }

    /// Deliver an envelope to its entity, activating it if needed.
    ///
    /// Waits only for mailbox capacity; the outcome travels through the
    /// envelope's reply handle.
    pub async fn dispatch(&self, envelope: Envelope) {
        let key = envelope.key.clone();
        let mut message = Mailbox::Deliver(envelope);

        for _ in 0..DELIVERY_ATTEMPTS {
            let (mailbox, in_flight) = match self.inner.checkout(&key) {
                Ok(checkout) => checkout,
                Err(failure) => {
                    if let Mailbox::Deliver(envelope) = message {
                        envelope.reply_to.send(Err(failure));
                    }
                    return;
                }
            };

            match mailbox.send(message).await {
                Ok(()) => {
                    in_flight.delivered();
                    return;
                }
                Err(mpsc::error::SendError(returned)) => {
                    drop(in_flight);
                    debug!(key = %key, "instance retired during delivery, retrying");
                    message = returned;
                }
            }
        }

        if let Mailbox::Deliver(envelope) = message {
            envelope.reply_to.send(Err(EntityFailure::Stopped {
                key,
                reason: "instance kept retiring during delivery".to_string(),
            }));
        }
    }

    /// Passivate a live instance.
    ///
    /// Returns false when the key is not active or still has messages in
    /// flight.
    pub async fn passivate(&self, key: &EntityKey) -> bool {
        let mailbox = self
            .inner
            .entities
            .lock()
            .get(key)
            .map(|slot| slot.mailbox.clone());
        let Some(mailbox) = mailbox else {
            return false;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if mailbox.send(Mailbox::Passivate(done_tx)).await.is_err() {
            return false;
        }
        done_rx.await.unwrap_or(false)
    }

    /// Hand off every instance whose shard `table` assigns elsewhere.
    ///
    /// The instances are detached at once so a later message re-activates
    /// from the log; anything still queued for them is refused. Returns the
    /// number of instances handed off.
    pub fn release_unowned(&self, table: &OwnershipTable) -> usize {
        let Some(router) = &self.inner.router else {
            return 0;
        };
        let node = &self.inner.config.node_id;

        let released: Vec<EntitySlot> = {
            let mut entities = self.inner.entities.lock();
            let moved: Vec<EntityKey> = entities
                .keys()
                .filter(|key| table.owner(router.shard_of(key)) != Some(node))
                .cloned()
                .collect();
            moved
                .iter()
                .filter_map(|key| entities.remove(key))
                .collect()
        };
        if released.is_empty() {
            return 0;
        }

        info!(
            node = %node,
            released = released.len(),
            version = table.version(),
            "Handing off entities of moved shards"
        );
        let count = released.len();
        let mut retiring = self.inner.retiring.lock();
        retiring.retain(|task| !task.is_finished());
        retiring.extend(released.into_iter().map(|slot| slot.task));
        count
    }

    /// Number of live instances
    pub fn active_count(&self) -> usize {
        self.inner.entities.lock().len()
    }

    /// Stop accepting messages, let every instance drain its mailbox and
    /// wait for all of them to finish.
    pub async fn shutdown(&self) {
        let slots: Vec<EntitySlot> = {
            let mut entities = self.inner.entities.lock();
            self.inner.closed.store(true, Ordering::Release);
            entities.drain().map(|(_, slot)| slot).collect()
        };

        info!(
            node = %self.inner.config.node_id,
            active = slots.len(),
            "Shutting down entity host"
        );

        // Dropping each slot's sender lets its worker finish once drained
        let mut tasks: Vec<JoinHandle<()>> = slots.into_iter().map(|slot| slot.task).collect();
        tasks.append(&mut self.inner.retiring.lock());
        for result in join_all(tasks).await {
            if let Err(err) = result {
                warn!(error = %err, "entity worker ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for EntityHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityHost")
            .field("node_id", &self.inner.config.node_id)
            .field("active", &self.active_count())
            .finish()
    }
}

impl HostInner {
    /// Live mailbox for a key, spawning the instance if there is none.
    /// Counts the caller's message as in flight.
    fn checkout(
        self: &Arc<Self>,
        key: &EntityKey,
    ) -> Result<(mpsc::Sender<Mailbox>, InFlight), EntityFailure> {
        let mut entities = self.entities.lock();
        if self.closed.load(Ordering::Acquire) {
            return Err(EntityFailure::HostStopped {
                node: self.config.node_id.clone(),
            });
        }
        if !self.owns(key) {
            return Err(self.not_owner(key));
        }

        let slot = entities
            .entry(key.clone())
            .or_insert_with(|| self.spawn_instance(key));
        slot.in_flight.fetch_add(1, Ordering::AcqRel);
        let in_flight = InFlight {
            count: Arc::clone(&slot.in_flight),
            armed: true,
        };
        Ok((slot.mailbox.clone(), in_flight))
    }

    fn spawn_instance(self: &Arc<Self>, key: &EntityKey) -> EntitySlot {
        let incarnation = self.next_incarnation.fetch_add(1, Ordering::Relaxed) + 1;
        let (mailbox, rx) = mpsc::channel(self.config.mailbox_capacity.max(1));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let worker = EntityWorker {
            host: Arc::clone(self),
            key: key.clone(),
            incarnation,
            in_flight: Arc::clone(&in_flight),
            state: ArtifactState::default(),
            last_sequence: 0,
        };
        let span = info_span!(
            "entity",
            persistence_id = %key.persistence_id(),
            node = %self.config.node_id,
            incarnation
        );
        let task = tokio::spawn(worker.run(rx).instrument(span));

        EntitySlot {
            incarnation,
            mailbox,
            in_flight,
            task,
        }
    }

    /// Whether the current ownership snapshot assigns the key to this node
    fn owns(&self, key: &EntityKey) -> bool {
        match &self.router {
            Some(router) => router
                .resolve(key)
                .is_ok_and(|route| route.node == self.config.node_id),
            None => true,
        }
    }

    /// Whether an instance may still handle messages: it is the registered
    /// incarnation and its shard has not moved away
    fn is_current(&self, key: &EntityKey, incarnation: u64) -> bool {
        let registered = self
            .entities
            .lock()
            .get(key)
            .is_some_and(|slot| slot.incarnation == incarnation);
        registered && self.owns(key)
    }

    fn not_owner(&self, key: &EntityKey) -> EntityFailure {
        EntityFailure::NotOwner {
            key: key.clone(),
            node: self.config.node_id.clone(),
        }
    }

    /// Remove an idle instance. Fails while messages are in flight.
    fn try_retire(&self, key: &EntityKey, incarnation: u64) -> bool {
        let mut entities = self.entities.lock();
        match entities.get(key) {
            Some(slot) if slot.incarnation == incarnation => {
                if slot.in_flight.load(Ordering::Acquire) > 0 {
                    return false;
                }
                entities.remove(key);
                true
            }
            // Already detached by shutdown or a handoff
            _ => true,
        }
    }

    /// Remove an instance unconditionally
    fn detach(&self, key: &EntityKey, incarnation: u64) {
        let mut entities = self.entities.lock();
        if entities
            .get(key)
            .is_some_and(|slot| slot.incarnation == incarnation)
        {
            entities.remove(key);
        }
    }
}

enum Next {
    Message(Mailbox),
    Idle,
    Closed,
}

/// One live instance; owns the entity's state exclusively
struct EntityWorker {
    host: Arc<HostInner>,
    key: EntityKey,
    incarnation: u64,
    in_flight: Arc<AtomicUsize>,
    state: ArtifactState,
    last_sequence: u64,
}

impl EntityWorker {
    async fn run(mut self, rx: mpsc::Receiver<Mailbox>) {
        self.serve(rx).await;
        self.host.log.release(&self.key);
    }

    async fn serve(&mut self, mut rx: mpsc::Receiver<Mailbox>) {
        if let Err(failure) = self.activate().await {
            warn!(error = %failure, "Activation failed");
            self.host.detach(&self.key, self.incarnation);
            close_mailbox(rx, &failure);
            return;
        }

        loop {
            match self.next(&mut rx).await {
                Next::Closed => {
                    debug!("Mailbox closed, instance stopped");
                    return;
                }
                Next::Idle => {
                    if self.host.try_retire(&self.key, self.incarnation) {
                        debug!("Passivated after idle timeout");
                        break;
                    }
                }
                Next::Message(Mailbox::Passivate(done)) => {
                    let retired = self.host.try_retire(&self.key, self.incarnation);
                    let _ = done.send(retired);
                    if retired {
                        debug!("Passivated on request");
                        break;
                    }
                }
                Next::Message(Mailbox::Deliver(envelope)) => {
                    if !self.host.is_current(&self.key, self.incarnation) {
                        let moved = self.host.not_owner(&self.key);
                        debug!("Shard handed off, refusing remaining messages");
                        self.host.detach(&self.key, self.incarnation);
                        envelope.reply_to.send(Err(moved.clone()));
                        close_mailbox(rx, &moved);
                        return;
                    }

                    let outcome = self.handle(envelope.command).await;

                    if let Err(failure @ EntityFailure::PersistFailed { .. }) = &outcome {
                        // Stop before replying so the next message re-activates from the log
                        let stopped = EntityFailure::Stopped {
                            key: self.key.clone(),
                            reason: failure.to_string(),
                        };
                        self.host.detach(&self.key, self.incarnation);
                        envelope.reply_to.send(outcome);
                        close_mailbox(rx, &stopped);
                        return;
                    }

                    envelope.reply_to.send(outcome);
                    self.in_flight.fetch_sub(1, Ordering::AcqRel);
                }
            }
        }

        close_mailbox(
            rx,
            &EntityFailure::Stopped {
                key: self.key.clone(),
                reason: "passivated".to_string(),
            },
        );
    }

    async fn next(&self, rx: &mut mpsc::Receiver<Mailbox>) -> Next {
        match self.host.config.idle_timeout {
            Some(idle) => tokio::select! {
                biased;
                message = rx.recv() => message.map_or(Next::Closed, Next::Message),
                _ = tokio::time::sleep(idle) => Next::Idle,
            },
            None => rx.recv().await.map_or(Next::Closed, Next::Message),
        }
    }

    /// Rebuild state from the full log
    async fn activate(&mut self) -> Result<(), EntityFailure> {
        let activation_failed = |reason: String| EntityFailure::ActivationFailed {
            key: self.key.clone(),
            reason,
        };

        let records = self
            .host
            .log
            .read_all(&self.key)
            .await
            .map_err(|err| activation_failed(err.to_string()))?;
        let replayed = replay(&records).map_err(|err| activation_failed(err.to_string()))?;

        self.state = replayed.state;
        self.last_sequence = replayed.last_sequence;
        info!(
            events = replayed.last_sequence,
            read = self.state.read,
            in_feed = self.state.in_feed,
            "Activated"
        );
        Ok(())
    }

    /// Persist-then-apply; state only changes once the event is durable
    async fn handle(&mut self, command: ArtifactCommand) -> ReplyResult {
        let (event, reply) = handle_command(&self.state, command);

        if let Some(event) = event {
            let marker = Some(self.host.config.node_id.to_string());
            let sequence = match self.host.log.append(&self.key, event, marker).await {
                Ok(sequence) => sequence,
                Err(err) => {
                    warn!(%command, %event, error = %err, "Failed to persist event");
                    return Err(EntityFailure::PersistFailed {
                        key: self.key.clone(),
                        event,
                        reason: err.to_string(),
                    });
                }
            };

            if sequence == self.last_sequence + 1 {
                self.last_sequence = sequence;
                self.state = apply_event(self.state, event);
            } else {
                // Another writer appended in between; the log is authoritative
                warn!(
                    expected = self.last_sequence + 1,
                    sequence, "Log sequence moved outside this instance, replaying"
                );
                if let Err(failure) = self.activate().await {
                    warn!(error = %failure, "Replay after foreign append failed");
                    self.last_sequence = sequence;
                    self.state = apply_event(self.state, event);
                }
            }
            debug!(%command, %event, sequence, "Event persisted");
        }

        Ok(reply)
    }
}

/// Refuse everything still queued with the given failure
fn close_mailbox(mut rx: mpsc::Receiver<Mailbox>, failure: &EntityFailure) {
    rx.close();
    while let Ok(message) = rx.try_recv() {
        match message {
            Mailbox::Deliver(envelope) => {
                envelope.reply_to.send(Err(failure.clone()));
            }
            Mailbox::Passivate(done) => {
                let _ = done.send(true);
            }
        }
    }
}
