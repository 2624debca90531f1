//! State that must survive a store restart

use std::fs;

use crate::common::*;
use regionstore::{bootstrap_store, load_prepared_region, load_store_ident, prepare_bootstrap};

#[test]
fn bootstrap_state_survives_restart() {
    let store = TestStore::new();
    bootstrap_store(&store.engines, 9, 2).unwrap();
    let region = prepare_bootstrap(&store.engines, 2, 1, 3).unwrap();

    let store = store.restart();
    let ident = load_store_ident(&store.engines).unwrap().unwrap();
    assert_eq!((ident.cluster_id, ident.store_id), (9, 2));
    assert_eq!(load_prepared_region(&store.engines).unwrap(), Some(region));
    assert!(bootstrap_store(&store.engines, 9, 2).is_err());
}

#[test]
fn snapshot_size_is_recounted_and_tmp_files_dropped() {
    let store = TestStore::new();
    store.generate(SnapKey::new(1, 1, 1), 70);
    store.generate(SnapKey::new(2, 1, 1), 30);
    // A half-written receive left behind by a crash.
    fs::write(store.config.snap_path().join("rev_5_1_1.sst.tmp"), vec![0u8; 500]).unwrap();

    let store = store.restart();
    assert_eq!(store.snap_mgr.get_total_snap_size(), 100);
    assert!(!store.config.snap_path().join("rev_5_1_1.sst.tmp").exists());
    assert_eq!(store.snap_mgr.list_idle_snap().unwrap().len(), 2);
}

#[test]
fn snap_settings_come_from_config_file() {
    let store = TestStore::with_snap_config(
        SnapManagerConfig::default()
            .with_max_total_size(1 << 20)
            .with_max_write_bytes_per_sec(1 << 30),
    );
    let store = store.restart();
    assert_eq!(store.snap_mgr.max_total_size(), 1 << 20);
    assert_eq!(store.snap_mgr.limiter().bytes_per_sec(), Some(1 << 30));
}
