//! Shared test utilities for the integration test suites.
//!
//! Import via `mod common;` from a test's main.rs.

#![allow(dead_code)]

use std::sync::mpsc::Receiver;
use std::sync::Arc;

pub use regionstore::{
    Engines, Region, SnapEntry, SnapKey, SnapManager, SnapManagerConfig, StoreConfig, StoreMsg,
    StoreRouter,
};
use tempfile::TempDir;

/// A store opened from a temporary data directory: engines, snapshot
/// manager and the receiving end of its stats channel.
pub struct TestStore {
    pub dir: TempDir,
    pub config: StoreConfig,
    pub engines: Engines,
    pub snap_mgr: Arc<SnapManager>,
    pub stats_rx: Receiver<StoreMsg>,
}

impl TestStore {
    /// Fresh store with default settings
    pub fn new() -> Self {
        Self::with_snap_config(SnapManagerConfig::default())
    }

    /// Fresh store with the given snapshot settings
    pub fn with_snap_config(snap: SnapManagerConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = StoreConfig::load_or_create(dir.path()).unwrap();
        config.snap = snap;
        config
            .write_to_file(&dir.path().join(regionstore_engine::CONFIG_FILE_NAME))
            .unwrap();
        Self::open(dir)
    }

    fn open(dir: TempDir) -> Self {
        let config = StoreConfig::load_or_create(dir.path()).unwrap();
        let engines = Engines::open(&config).unwrap();
        let (router, stats_rx) = StoreRouter::new();
        let snap_mgr = Arc::new(SnapManager::new(
            config.snap_path(),
            &config.snap,
            Some(Arc::new(router)),
        ));
        snap_mgr.init().unwrap();
        TestStore {
            dir,
            config,
            engines,
            snap_mgr,
            stats_rx,
        }
    }

    /// Drop everything in memory and open the same directory again
    pub fn restart(self) -> Self {
        let TestStore {
            dir,
            engines,
            snap_mgr,
            ..
        } = self;
        drop(snap_mgr);
        drop(engines);
        Self::open(dir)
    }

    /// Generate a snapshot of `size` bytes for `key` the way the raft loop
    /// does: register, build, deregister
    pub fn generate(&self, key: SnapKey, size: usize) -> Vec<u8> {
        self.snap_mgr.register(key, SnapEntry::Generating);
        let payload = {
            let mut snap = self.snap_mgr.get_snapshot_for_building(key).unwrap();
            snap.build(&Region::first(key.region_id, 1, 1), &vec![0xAB; size])
                .unwrap()
        };
        self.snap_mgr.deregister(key, SnapEntry::Generating);
        regionstore::Message::to_bytes(&payload).unwrap()
    }

    /// Number of stats notifications delivered so far
    pub fn drain_stats(&self) -> usize {
        self.stats_rx.try_iter().count()
    }
}
