//! Cluster listener: logs membership changes

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::MembershipEvent;

/// Spawn a task logging every membership event until the source closes
pub fn spawn_cluster_listener(mut events: broadcast::Receiver<MembershipEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Cluster listener started");
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Cluster listener fell behind, events dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("Membership closed, cluster listener stopping");
                    break;
                }
            }
        }
    })
}

fn log_event(event: &MembershipEvent) {
    match event {
        MembershipEvent::MemberUp(member) => {
            info!(node = %member.node, roles = %member.roles, "Member is Up");
        }
        MembershipEvent::MemberUnreachable(member) => {
            info!(node = %member.node, "Member detected as unreachable");
        }
        MembershipEvent::MemberReachable(member) => {
            info!(node = %member.node, "Member is reachable again");
        }
        MembershipEvent::MemberRemoved {
            member,
            previous_status,
        } => {
            info!(node = %member.node, previous = %previous_status, "Member is Removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Roles, StaticMembership};
    use crate::sharding::{NodeId, SharedOwnership};

    #[tokio::test]
    async fn test_listener_stops_when_membership_is_dropped() {
        let membership = StaticMembership::new(10, SharedOwnership::new());
        let handle = spawn_cluster_listener(membership.subscribe());

        membership.member_up(NodeId::from("a"), Roles::ALL);
        membership.remove(&NodeId::from("a"));
        drop(membership);

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("listener should stop")
            .unwrap();
    }
}
