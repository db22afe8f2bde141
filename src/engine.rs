//! Shared server state.
//!
//! The keyspace, the replication bookkeeping and the blocked-reader table
//! are mutated together behind one lock, so every command observes and
//! produces a consistent snapshot of all three.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::keyspace::Keyspace;
use crate::replication::ReplicationState;
use crate::state::BlockedReads;

pub struct Engine {
    pub keyspace: Keyspace,
    pub replication: ReplicationState,
    pub readers: BlockedReads,
}

pub type SharedEngine = Arc<Mutex<Engine>>;

impl Engine {
    pub fn new(replication: ReplicationState) -> Self {
        Self {
            keyspace: Keyspace::new(),
            replication,
            readers: BlockedReads::new(),
        }
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }
}
