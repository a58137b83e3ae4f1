//! Static membership
//!
//! Keeps the member list of the cluster and derives the shard ownership
//! table from it. Every change republishes the table and is broadcast to
//! subscribers such as the cluster listener.
//!
//! Shards are allocated by rendezvous hashing over all `sharded` members,
//! reachable or not. Shards whose owner is unreachable stay unowned, so
//! routing reports them as retryable instead of guessing, and a member
//! coming back gets exactly its own shards again. Removing a member moves
//! only that member's shards.
//!
//! Observers hear about every new table right after it is published, while
//! the membership lock is still held, so a node hands off the entities of
//! moved shards before the next membership change is applied.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::sharding::{NodeId, OwnershipTable, RendezvousHasher, ShardId, SharedOwnership};

/// Buffered membership events per subscriber
const EVENT_CAPACITY: usize = 256;

/// What a member does in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Roles {
    /// Hosts entities and takes part in shard allocation
    pub sharded: bool,
    /// Accepts external requests
    pub endpoint: bool,
}

impl Roles {
    pub const ALL: Roles = Roles {
        sharded: true,
        endpoint: true,
    };

    /// Parse `sharded`, `endpoint` or both joined with `+`
    pub fn parse(spec: &str) -> Option<Self> {
        let mut roles = Roles::default();
        for role in spec.split('+').map(str::trim) {
            match role {
                "sharded" => roles.sharded = true,
                "endpoint" => roles.endpoint = true,
                _ => return None,
            }
        }
        Some(roles)
    }
}

impl std::fmt::Display for Roles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.sharded, self.endpoint) {
            (true, true) => f.write_str("sharded+endpoint"),
            (true, false) => f.write_str("sharded"),
            (false, true) => f.write_str("endpoint"),
            (false, false) => f.write_str("none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Up,
    Unreachable,
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberStatus::Up => f.write_str("up"),
            MemberStatus::Unreachable => f.write_str("unreachable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub node: NodeId,
    pub roles: Roles,
    pub status: MemberStatus,
}

/// Membership change notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    MemberUp(Member),
    MemberUnreachable(Member),
    MemberReachable(Member),
    MemberRemoved {
        member: Member,
        previous_status: MemberStatus,
    },
}

/// Reacts synchronously to each published ownership table
pub trait OwnershipObserver: Send + Sync + std::fmt::Debug {
    fn ownership_changed(&self, table: &OwnershipTable);
}

/// Member list with a fixed shard count, feeding the shared ownership table
#[derive(Debug)]
pub struct StaticMembership {
    shard_count: u32,
    ownership: SharedOwnership,
    members: Mutex<BTreeMap<NodeId, Member>>,
    observers: Mutex<Vec<Arc<dyn OwnershipObserver>>>,
    events: broadcast::Sender<MembershipEvent>,
}

impl StaticMembership {
    pub fn new(shard_count: u32, ownership: SharedOwnership) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shard_count,
            ownership,
            members: Mutex::new(BTreeMap::new()),
            observers: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Receive every change made after this call
    pub fn subscribe(&self) -> broadcast::Receiver<MembershipEvent> {
        self.events.subscribe()
    }

    /// Register an observer for every later ownership change
    pub fn observe(&self, observer: Arc<dyn OwnershipObserver>) {
        self.observers.lock().push(observer);
    }

    /// Current members in node order
    pub fn members(&self) -> Vec<Member> {
        self.members.lock().values().cloned().collect()
    }

    pub fn ownership(&self) -> &SharedOwnership {
        &self.ownership
    }

    /// Add a member, or update the roles of a known one, as up.
    ///
    /// Returns the published ownership version.
    pub fn member_up(&self, node: NodeId, roles: Roles) -> u64 {
        let mut members = self.members.lock();
        let member = Member {
            node: node.clone(),
            roles,
            status: MemberStatus::Up,
        };
        members.insert(node, member.clone());

        let version = self.reallocate(&members);
        self.notify(MembershipEvent::MemberUp(member));
        version
    }

    /// Mark a member unreachable; its shards become unowned.
    ///
    /// Returns `None` for an unknown member.
    pub fn mark_unreachable(&self, node: &NodeId) -> Option<u64> {
        self.set_status(node, MemberStatus::Unreachable)
            .map(|(member, version)| {
                self.notify(MembershipEvent::MemberUnreachable(member));
                version
            })
    }

    /// Mark a member reachable again; it gets its shards back
    pub fn mark_reachable(&self, node: &NodeId) -> Option<u64> {
        self.set_status(node, MemberStatus::Up).map(|(member, version)| {
            self.notify(MembershipEvent::MemberReachable(member));
            version
        })
    }

    /// Remove a member; its shards move to the remaining members
    pub fn remove(&self, node: &NodeId) -> Option<u64> {
        let mut members = self.members.lock();
        let member = members.remove(node)?;

        let version = self.reallocate(&members);
        self.notify(MembershipEvent::MemberRemoved {
            previous_status: member.status,
            member,
        });
        Some(version)
    }

    fn set_status(&self, node: &NodeId, status: MemberStatus) -> Option<(Member, u64)> {
        let mut members = self.members.lock();
        let member = members.get_mut(node)?;
        member.status = status;
        let member = member.clone();

        let version = self.reallocate(&members);
        Some((member, version))
    }

    /// Recompute and publish ownership; called with the member lock held so
    /// table versions follow membership order
    fn reallocate(&self, members: &BTreeMap<NodeId, Member>) -> u64 {
        let candidates: Vec<NodeId> = members
            .values()
            .filter(|m| m.roles.sharded)
            .map(|m| m.node.clone())
            .collect();
        let hasher = RendezvousHasher::new(candidates);

        let owners: HashMap<ShardId, NodeId> = (0..self.shard_count)
            .map(ShardId)
            .filter_map(|shard| {
                let owner = hasher.lookup(shard)?;
                let reachable = members
                    .get(owner)
                    .is_some_and(|m| m.status == MemberStatus::Up);
                reachable.then(|| (shard, owner.clone()))
            })
            .collect();

        let table = OwnershipTable::new(owners);
        let assigned = table.assigned_count();
        let version = self.ownership.publish(table);

        let published = self.ownership.snapshot();
        for observer in self.observers.lock().iter() {
            observer.ownership_changed(&published);
        }

        info!(
            version,
            assigned,
            shards = self.shard_count,
            members = members.len(),
            "Published shard ownership"
        );
        version
    }

    fn notify(&self, event: MembershipEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(nodes: &[&str]) -> StaticMembership {
        let membership = StaticMembership::new(100, SharedOwnership::new());
        for node in nodes {
            membership.member_up(NodeId::from(*node), Roles::ALL);
        }
        membership
    }

    fn owners(membership: &StaticMembership) -> Vec<Option<NodeId>> {
        let table = membership.ownership().snapshot();
        (0..100).map(|i| table.owner(ShardId(i)).cloned()).collect()
    }

    #[test]
    fn test_roles_parse() {
        assert_eq!(Roles::parse("sharded+endpoint"), Some(Roles::ALL));
        assert_eq!(
            Roles::parse("endpoint"),
            Some(Roles {
                sharded: false,
                endpoint: true
            })
        );
        assert_eq!(Roles::parse("sharded + endpoint"), Some(Roles::ALL));
        assert_eq!(Roles::parse("seed"), None);
        assert_eq!(Roles::ALL.to_string(), "sharded+endpoint");
    }

    #[test]
    fn test_every_shard_is_owned_by_a_sharded_member() {
        let membership = StaticMembership::new(100, SharedOwnership::new());
        membership.member_up(NodeId::from("a"), Roles::ALL);
        membership.member_up(
            NodeId::from("gateway"),
            Roles {
                sharded: false,
                endpoint: true,
            },
        );

        let table = membership.ownership().snapshot();
        assert_eq!(table.assigned_count(), 100);
        assert!(table.shards_of(&NodeId::from("gateway")).is_empty());
        assert_eq!(table.version(), 2);
    }

    #[test]
    fn test_unreachable_member_shards_become_unowned() {
        let membership = membership(&["a", "b", "c"]);
        let before = owners(&membership);
        let b = NodeId::from("b");

        membership.mark_unreachable(&b);
        let during = owners(&membership);
        for (old, new) in before.iter().zip(&during) {
            if old.as_ref() == Some(&b) {
                assert_eq!(new, &None);
            } else {
                assert_eq!(new, old);
            }
        }

        membership.mark_reachable(&b);
        assert_eq!(owners(&membership), before);
    }

    #[test]
    fn test_removal_moves_only_removed_member_shards() {
        let membership = membership(&["a", "b", "c"]);
        let before = owners(&membership);
        let c = NodeId::from("c");

        assert!(membership.remove(&c).is_some());
        let after = owners(&membership);

        for (old, new) in before.iter().zip(&after) {
            assert!(new.is_some());
            if old.as_ref() != Some(&c) {
                assert_eq!(new, old);
            }
        }
        assert!(membership.remove(&c).is_none());
    }

    #[test]
    fn test_changes_are_broadcast() {
        let membership = membership(&["a"]);
        let mut events = membership.subscribe();
        let b = NodeId::from("b");

        membership.member_up(b.clone(), Roles::ALL);
        membership.mark_unreachable(&b);
        membership.remove(&b);

        assert!(matches!(
            events.try_recv().unwrap(),
            MembershipEvent::MemberUp(Member { node, .. }) if node == b
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            MembershipEvent::MemberUnreachable(_)
        ));
        assert_eq!(
            events.try_recv().unwrap(),
            MembershipEvent::MemberRemoved {
                member: Member {
                    node: b,
                    roles: Roles::ALL,
                    status: MemberStatus::Unreachable,
                },
                previous_status: MemberStatus::Unreachable,
            }
        );
    }

    #[test]
    fn test_unknown_member_changes_nothing() {
        let membership = membership(&["a"]);
        let version = membership.ownership().snapshot().version();

        assert!(membership.mark_unreachable(&NodeId::from("ghost")).is_none());
        assert_eq!(membership.ownership().snapshot().version(), version);
    }

    /// Records the version of every table it is shown
    #[derive(Debug, Default)]
    struct Recorder {
        versions: Mutex<Vec<u64>>,
    }

    impl OwnershipObserver for Recorder {
        fn ownership_changed(&self, table: &OwnershipTable) {
            self.versions.lock().push(table.version());
        }
    }

    #[test]
    fn test_observers_see_each_published_table() {
        let membership = membership(&["a"]);
        let recorder = Arc::new(Recorder::default());
        membership.observe(recorder.clone());

        let up = membership.member_up(NodeId::from("b"), Roles::ALL);
        let removed = membership.remove(&NodeId::from("a")).unwrap();

        assert_eq!(*recorder.versions.lock(), vec![up, removed]);
    }
}
