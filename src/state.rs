//! Registry of clients parked in blocking stream reads.
//!
//! A blocked XREAD registers one watcher per stream key it covers and parks
//! on the wake channel. Every append notifies the key's watchers; the woken
//! task re-evaluates its read and decides whether to reply or re-park.

use std::collections::HashMap;

use tokio::sync::mpsc;

#[derive(Debug)]
pub struct StreamWatcher {
    pub client: String,
    pub wake: mpsc::Sender<()>,
}

#[derive(Debug, Default)]
pub struct BlockedReads {
    watchers: HashMap<String, Vec<StreamWatcher>>,
}

impl BlockedReads {
    pub fn new() -> Self {
        Self {
            watchers: HashMap::new(),
        }
    }

    pub fn watch(&mut self, key: String, watcher: StreamWatcher) {
        self.watchers.entry(key).or_default().push(watcher);
    }

    /// Drops every watcher `client` registered for the given keys.
    pub fn unwatch(&mut self, keys: &[String], client: &str) {
        for key in keys {
            if let Some(watchers) = self.watchers.get_mut(key) {
                watchers.retain(|watcher| watcher.client != client);
                if watchers.is_empty() {
                    self.watchers.remove(key);
                }
            }
        }
    }

    /// Drops every watcher a disconnecting client left behind, whatever key
    /// it was parked on.
    pub fn unwatch_client(&mut self, client: &str) {
        self.watchers.retain(|_, watchers| {
            watchers.retain(|watcher| watcher.client != client);
            !watchers.is_empty()
        });
    }

    /// Wakes everyone watching `key`. A full wake channel is fine: one
    /// pending wake is enough for the waiter to re-evaluate.
    pub fn notify_append(&mut self, key: &str) {
        if let Some(watchers) = self.watchers.get(key) {
            for watcher in watchers {
                let _ = watcher.wake.try_send(());
            }
        }
    }
}
