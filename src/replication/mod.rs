//! Replication roles and bookkeeping.
//!
//! A server is either a leader, tracking attached replicas, their
//! acknowledged offsets and an optional pending WAIT, or a follower,
//! tracking the number of master-stream bytes it has consumed.

mod follower;
mod handshake;
mod leader;

use rand::Rng;

pub use follower::{run_replica_link, ReplicaLinkError};
pub use handshake::{perform_handshake, HandshakeError, HandshakeOutcome};
pub use leader::{LeaderReplication, PendingWait, ReplicaHandle};

#[derive(Debug)]
pub enum ReplicationState {
    Leader(LeaderReplication),
    Follower(FollowerReplication),
}

impl ReplicationState {
    /// The role string used by INFO. Replica mode reports the historical
    /// "slave" name the protocol expects.
    pub fn role_name(&self) -> &'static str {
        match self {
            ReplicationState::Leader(_) => "master",
            ReplicationState::Follower(_) => "slave",
        }
    }

    /// The replication ID reported by INFO: the leader's own ID, or the
    /// master's ID once a follower has completed its handshake.
    pub fn reported_replid(&self) -> &str {
        match self {
            ReplicationState::Leader(leader) => &leader.replid,
            ReplicationState::Follower(follower) => follower
                .master_replid
                .as_deref()
                .unwrap_or(&follower.replid),
        }
    }

    /// The byte offset this server has seen: propagated bytes for a leader,
    /// consumed master bytes for a follower.
    pub fn offset(&self) -> u64 {
        match self {
            ReplicationState::Leader(leader) => leader.repl_offset,
            ReplicationState::Follower(follower) => follower.master_offset,
        }
    }

    pub fn as_leader(&self) -> Option<&LeaderReplication> {
        match self {
            ReplicationState::Leader(leader) => Some(leader),
            ReplicationState::Follower(_) => None,
        }
    }

    pub fn as_leader_mut(&mut self) -> Option<&mut LeaderReplication> {
        match self {
            ReplicationState::Leader(leader) => Some(leader),
            ReplicationState::Follower(_) => None,
        }
    }

    pub fn as_follower_mut(&mut self) -> Option<&mut FollowerReplication> {
        match self {
            ReplicationState::Leader(_) => None,
            ReplicationState::Follower(follower) => Some(follower),
        }
    }
}

#[derive(Debug)]
pub struct FollowerReplication {
    /// This server's own replication ID, reported until a master is known.
    pub replid: String,
    /// The master's replication ID learned from FULLRESYNC.
    pub master_replid: Option<String>,
    /// Bytes of the propagated master stream consumed and applied.
    pub master_offset: u64,
}

impl FollowerReplication {
    pub fn new(replid: String) -> Self {
        Self {
            replid,
            master_replid: None,
            master_offset: 0,
        }
    }
}

/// Generates the 40-hex-character replication ID a server carries for its
/// lifetime.
pub fn generate_replid() -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::rng();
    (0..40)
        .map(|_| HEX[rng.random_range(0..HEX.len())] as char)
        .collect()
}
