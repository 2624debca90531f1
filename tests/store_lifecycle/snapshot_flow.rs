//! Snapshot transfer between two stores and quota pressure on the sender

use std::fs::File;
use std::time::{Duration, SystemTime};

use crate::common::*;
use regionstore::Error;
use regionstore_snap::naming::meta_file_name;

fn backdate(store: &TestStore, key: SnapKey, secs: u64) {
    let path = store.config.snap_path().join(meta_file_name(&key, true));
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(secs))
        .unwrap();
}

#[test]
fn transfer_snapshot_between_stores() {
    let leader = TestStore::new();
    let follower = TestStore::new();
    let key = SnapKey::new(3, 6, 9);

    let payload = leader.generate(key, 4096);
    leader.snap_mgr.register(key, SnapEntry::Sending);
    follower.snap_mgr.register(key, SnapEntry::Receiving);
    assert_eq!(leader.snap_mgr.stats().sending_count, 1);
    assert_eq!(follower.snap_mgr.stats().receiving_count, 1);

    let data = leader
        .snap_mgr
        .get_snapshot_for_sending(key)
        .unwrap()
        .read_data()
        .unwrap();
    let mut recv = follower
        .snap_mgr
        .get_snapshot_for_receiving(key, &payload)
        .unwrap();
    for chunk in data.chunks(1000) {
        recv.write_chunk(chunk).unwrap();
    }
    recv.save().unwrap();
    leader.snap_mgr.deregister(key, SnapEntry::Sending);
    follower.snap_mgr.deregister(key, SnapEntry::Receiving);

    follower.snap_mgr.register(key, SnapEntry::Applying);
    let apply = follower.snap_mgr.get_snapshot_for_applying(key).unwrap();
    assert_eq!(apply.read_data().unwrap(), data);
    follower.snap_mgr.deregister(key, SnapEntry::Applying);

    assert_eq!(follower.snap_mgr.get_total_snap_size(), 4096);
    // Generate: 2 notifications, send: 2.
    assert_eq!(leader.drain_stats(), 4);
    // Receive: 2, apply: 2.
    assert_eq!(follower.drain_stats(), 4);
}

#[test]
fn quota_evicts_oldest_idle_sending_snapshot() {
    let store = TestStore::with_snap_config(SnapManagerConfig::default().with_max_total_size(250));
    let keys: Vec<_> = (1..=3).map(|id| SnapKey::new(id, 1, 1)).collect();
    for key in &keys {
        store.generate(*key, 100);
    }
    backdate(&store, keys[0], 30);
    backdate(&store, keys[1], 20);
    backdate(&store, keys[2], 10);
    assert_eq!(store.snap_mgr.get_total_snap_size(), 300);

    store.generate(SnapKey::new(4, 1, 1), 100);
    // keys[0] went before the new build; the new one brings usage back up.
    assert_eq!(store.snap_mgr.get_total_snap_size(), 300);
    let idle: Vec<_> = store
        .snap_mgr
        .list_idle_snap()
        .unwrap()
        .into_iter()
        .map(|s| s.key.region_id)
        .collect();
    assert_eq!(idle, vec![2, 3, 4]);
}

#[test]
fn quota_exhausted_when_every_snapshot_is_busy() {
    let store = TestStore::with_snap_config(SnapManagerConfig::default().with_max_total_size(150));
    let a = SnapKey::new(1, 1, 1);
    let b = SnapKey::new(2, 1, 1);
    store.generate(a, 100);
    store.generate(b, 100);
    store.snap_mgr.register(a, SnapEntry::Sending);
    store.snap_mgr.register(b, SnapEntry::Sending);

    let err = store
        .snap_mgr
        .get_snapshot_for_building(SnapKey::new(3, 1, 1))
        .unwrap_err();
    assert!(matches!(err, Error::QuotaExhausted(_)));
    assert_eq!(store.snap_mgr.get_total_snap_size(), 200);

    // Once a transfer finishes its snapshot becomes evictable.
    store.snap_mgr.deregister(a, SnapEntry::Sending);
    store
        .snap_mgr
        .get_snapshot_for_building(SnapKey::new(3, 1, 1))
        .unwrap();
    assert_eq!(store.snap_mgr.get_total_snap_size(), 100);
}
