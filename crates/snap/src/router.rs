//! Snapshot stats notification
//!
//! The manager tells the store loop whenever the registry changes so it can
//! refresh the snapshot counts it reports. The sink is optional.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use tracing::debug;

/// Messages delivered to the store loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMsg {
    /// Registry changed; re-read [`SnapManager::stats`](crate::SnapManager::stats)
    SnapshotStats,
}

/// Receiver of registry-change notifications
pub trait StatsObserver: Send + Sync {
    /// Called after every register/deregister that changed the registry.
    /// Must not block.
    fn notify_snapshot_stats(&self);
}

/// Channel-backed observer feeding the store loop
#[derive(Debug, Clone)]
pub struct StoreRouter {
    sender: Sender<StoreMsg>,
}

impl StoreRouter {
    /// Create a router and the receiving end for the store loop
    pub fn new() -> (Self, Receiver<StoreMsg>) {
        let (sender, receiver) = mpsc::channel();
        (StoreRouter { sender }, receiver)
    }
}

impl StatsObserver for StoreRouter {
    fn notify_snapshot_stats(&self) {
        if self.sender.send(StoreMsg::SnapshotStats).is_err() {
            debug!("Store loop is gone, dropping snapshot stats notification");
        }
    }
}

pub(crate) fn notify_stats(observer: Option<&Arc<dyn StatsObserver>>) {
    if let Some(observer) = observer {
        observer.notify_snapshot_stats();
    }
}
