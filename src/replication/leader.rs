//! Leader-side replication: the replica table, write propagation and WAIT
//! bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{oneshot, Mutex};

/// One attached replica: its propagation channel and the highest offset it
/// has acknowledged.
#[derive(Debug)]
pub struct ReplicaHandle {
    pub writer: Arc<Mutex<OwnedWriteHalf>>,
    pub acked_offset: u64,
}

/// A WAIT in flight. At most one exists at a time; behavior under
/// overlapping WAITs is unspecified and the newest record simply replaces
/// the old one.
#[derive(Debug)]
pub struct PendingWait {
    pub required: usize,
    /// The leader offset captured when the WAIT was registered; an ACK
    /// counts when it reaches this value.
    pub baseline_offset: u64,
    pub acks_received: usize,
    /// Fires once the quorum is reached. Taken on first use so resolution
    /// is idempotent.
    pub notify: Option<oneshot::Sender<()>>,
}

#[derive(Debug)]
pub struct LeaderReplication {
    pub replid: String,
    /// Total bytes of propagated write traffic.
    pub repl_offset: u64,
    replicas: HashMap<String, ReplicaHandle>,
    pub pending_wait: Option<PendingWait>,
}

impl LeaderReplication {
    pub fn new(replid: String) -> Self {
        Self {
            replid,
            repl_offset: 0,
            replicas: HashMap::new(),
            pending_wait: None,
        }
    }

    pub fn register_replica(&mut self, peer: String, writer: Arc<Mutex<OwnedWriteHalf>>) {
        self.replicas.insert(
            peer,
            ReplicaHandle {
                writer,
                acked_offset: 0,
            },
        );
    }

    pub fn remove_replica(&mut self, peer: &str) {
        self.replicas.remove(peer);
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    /// Write halves of every attached replica, for out-of-band traffic such
    /// as the GETACK broadcast.
    pub fn replica_writers(&self) -> Vec<Arc<Mutex<OwnedWriteHalf>>> {
        self.replicas
            .values()
            .map(|handle| Arc::clone(&handle.writer))
            .collect()
    }

    /// Forwards the raw bytes of an executed write to every replica and
    /// advances the leader offset by their length.
    ///
    /// Callers hold the engine lock across this, which is what keeps the
    /// propagation order per replica equal to the local execution order.
    /// Sends are best effort; a dead replica is dropped when its connection
    /// task notices.
    pub async fn propagate(&mut self, raw: &[u8]) {
        self.repl_offset += raw.len() as u64;

        for (peer, handle) in &self.replicas {
            let mut writer = handle.writer.lock().await;
            if let Err(error) = writer.write_all(raw).await {
                tracing::warn!(replica = %peer, error = %error, "failed to propagate write");
            }
        }
    }

    /// Records `REPLCONF ACK <acked>` from a replica. An ACK with no WAIT
    /// pending only updates the replica's offset.
    pub fn acknowledge(&mut self, peer: &str, acked: u64) {
        if let Some(handle) = self.replicas.get_mut(peer) {
            handle.acked_offset = acked;
        }

        let Some(wait) = self.pending_wait.as_mut() else {
            return;
        };
        if acked < wait.baseline_offset {
            return;
        }

        wait.acks_received += 1;
        if wait.acks_received >= wait.required {
            if let Some(notify) = wait.notify.take() {
                let _ = notify.send(());
            }
        }
    }
}
