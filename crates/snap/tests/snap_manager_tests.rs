//! SnapManager integration tests
//!
//! Exercise the manager through its public API against a real directory:
//! quota accounting, eviction order, idle listing and startup cleanup.

use std::fs::{self, File};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};

use regionstore_core::{Error, Message, Region, SnapEntry, SnapKey};
use regionstore_snap::naming::{data_file_name, meta_file_name};
use regionstore_snap::{SnapManager, SnapManagerConfig, SnapshotData, StoreRouter};
use tempfile::TempDir;

fn open(dir: &TempDir, max_total_size: u64) -> SnapManager {
    let config = SnapManagerConfig::default().with_max_total_size(max_total_size);
    let mgr = SnapManager::new(dir.path().join("snap"), &config, None);
    mgr.init().unwrap();
    mgr
}

fn build(mgr: &SnapManager, key: SnapKey, size: usize) -> SnapshotData {
    let mut snap = mgr.get_snapshot_for_building(key).unwrap();
    snap.build(&Region::first(key.region_id, 1, key.region_id), &vec![1u8; size])
        .unwrap()
}

/// Backdate a snapshot's meta file by `age`
fn age_meta(mgr: &SnapManager, key: SnapKey, age: Duration) {
    let path = mgr.base().join(meta_file_name(&key, true));
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

#[test]
fn test_three_snapshots_total_size() {
    let dir = TempDir::new().unwrap();
    let mgr = open(&dir, 0);
    assert_eq!(mgr.get_total_snap_size(), 0);
    for region_id in 1..=3 {
        build(&mgr, SnapKey::new(region_id, 1, 10), 100);
    }
    assert_eq!(mgr.get_total_snap_size(), 300);
}

#[test]
fn test_eviction_deletes_only_the_oldest() {
    let dir = TempDir::new().unwrap();
    let mgr = open(&dir, 250);

    let oldest = SnapKey::new(1, 1, 10);
    let middle = SnapKey::new(2, 1, 10);
    let newest = SnapKey::new(3, 1, 10);
    // Each build runs while usage is within quota, so nothing is evicted yet.
    build(&mgr, oldest, 100);
    build(&mgr, middle, 100);
    build(&mgr, newest, 100);
    age_meta(&mgr, oldest, Duration::from_secs(300));
    age_meta(&mgr, middle, Duration::from_secs(200));
    age_meta(&mgr, newest, Duration::from_secs(100));
    assert_eq!(mgr.get_total_snap_size(), 300);

    let _next = mgr.get_snapshot_for_building(SnapKey::new(4, 1, 10)).unwrap();
    assert_eq!(mgr.get_total_snap_size(), 200);
    assert!(!mgr.base().join(meta_file_name(&oldest, true)).exists());
    assert!(mgr.base().join(meta_file_name(&middle, true)).exists());
    assert!(mgr.base().join(meta_file_name(&newest, true)).exists());
}

#[test]
fn test_eviction_skips_registered_and_receiving() {
    let dir = TempDir::new().unwrap();
    let mgr = open(&dir, 150);

    let busy = SnapKey::new(1, 1, 1);
    let idle = SnapKey::new(2, 1, 1);
    build(&mgr, busy, 100);
    build(&mgr, idle, 100);
    age_meta(&mgr, busy, Duration::from_secs(600));
    mgr.register(busy, SnapEntry::Sending);

    // A received snapshot counts toward the quota but is never evicted.
    let body = vec![9u8; 100];
    let payload = SnapshotData {
        region: Region::first(3, 1, 3),
        meta: regionstore_snap::SnapshotMeta {
            data_size: body.len() as u64,
            checksum: crc32fast::hash(&body),
        },
    };
    let received = SnapKey::new(3, 1, 1);
    let mut recv = mgr
        .get_snapshot_for_receiving(received, &payload.to_bytes().unwrap())
        .unwrap();
    recv.write_chunk(&body).unwrap();
    recv.save().unwrap();
    assert_eq!(mgr.get_total_snap_size(), 300);

    let err = mgr.get_snapshot_for_building(SnapKey::new(4, 1, 1)).unwrap_err();
    assert!(matches!(err, Error::QuotaExhausted(_)));
    // The idle sending snapshot went first; the rest were protected.
    assert_eq!(mgr.get_total_snap_size(), 200);
    assert!(mgr.get_snapshot_for_sending(busy).unwrap().exists());
    assert!(mgr.get_snapshot_for_applying(received).unwrap().exists());
}

#[test]
fn test_list_idle_snap_excludes_registered() {
    let dir = TempDir::new().unwrap();
    let mgr = open(&dir, 0);
    let keys: Vec<_> = (1..=4).map(|i| SnapKey::new(i, 2, 3)).collect();
    for key in &keys {
        build(&mgr, *key, 8);
    }
    mgr.register(keys[1], SnapEntry::Generating);
    mgr.register(keys[3], SnapEntry::Applying);

    let idle: Vec<_> = mgr.list_idle_snap().unwrap().into_iter().map(|s| s.key).collect();
    assert_eq!(idle, vec![keys[0], keys[2]]);

    mgr.deregister(keys[1], SnapEntry::Generating);
    let idle: Vec<_> = mgr.list_idle_snap().unwrap().into_iter().map(|s| s.key).collect();
    assert_eq!(idle, vec![keys[0], keys[1], keys[2]]);
}

#[test]
fn test_init_cleans_tmp_and_counts_sst() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("snap");
    fs::create_dir_all(&base).unwrap();
    let key = SnapKey::new(5, 6, 7);
    let received = SnapKey::new(5, 6, 8);
    fs::write(base.join(data_file_name(&key, true)), vec![0u8; 40]).unwrap();
    fs::write(base.join(meta_file_name(&key, true)), b"{}").unwrap();
    fs::write(base.join(data_file_name(&received, false)), vec![0u8; 2]).unwrap();
    fs::write(base.join(meta_file_name(&received, false)), b"{}").unwrap();
    fs::write(base.join("gen_5_6_9.sst.tmp"), vec![0u8; 1000]).unwrap();
    fs::write(base.join("rev_5_6_9.meta.tmp"), b"{}").unwrap();
    fs::write(base.join("LOCK"), b"other").unwrap();

    let mgr = SnapManager::new(&base, &SnapManagerConfig::default(), None);
    mgr.init().unwrap();
    assert_eq!(mgr.get_total_snap_size(), 42);
    assert!(!base.join("gen_5_6_9.sst.tmp").exists());
    assert!(!base.join("rev_5_6_9.meta.tmp").exists());
    assert!(base.join("LOCK").exists());
}

/// A data file whose meta never landed is dropped at startup, and a
/// rebuild of the same key is counted once
#[test]
fn test_orphan_data_file_not_double_counted() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("snap");
    fs::create_dir_all(&base).unwrap();
    let key = SnapKey::new(1, 1, 1);
    fs::write(base.join(data_file_name(&key, true)), vec![0u8; 100]).unwrap();

    let mgr = open(&dir, 0);
    assert_eq!(mgr.get_total_snap_size(), 0);
    assert!(!base.join(data_file_name(&key, true)).exists());

    build(&mgr, key, 100);
    assert_eq!(mgr.get_total_snap_size(), 100);
    let snap = mgr.get_snapshot_for_sending(key).unwrap();
    assert!(mgr.delete_snapshot(key, snap.as_ref(), true).unwrap());
    assert_eq!(mgr.get_total_snap_size(), 0);
}

/// An orphan data file appearing after startup is released when the
/// rebuild replaces it
#[test]
fn test_rebuild_over_orphan_releases_old_size() {
    let dir = TempDir::new().unwrap();
    let mgr = open(&dir, 0);
    let key = SnapKey::new(2, 1, 1);
    build(&mgr, key, 60);
    fs::remove_file(mgr.base().join(meta_file_name(&key, true))).unwrap();
    assert_eq!(mgr.get_total_snap_size(), 60);

    build(&mgr, key, 100);
    assert_eq!(mgr.get_total_snap_size(), 100);
    let len = fs::metadata(mgr.base().join(data_file_name(&key, true)))
        .unwrap()
        .len();
    assert_eq!(len, 100);
}

#[test]
fn test_init_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("a").join("b");
    let mgr = SnapManager::new(&base, &SnapManagerConfig::default(), None);
    mgr.init().unwrap();
    assert!(base.is_dir());
    assert_eq!(mgr.get_total_snap_size(), 0);
}

#[test]
fn test_init_rejects_file_base() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("snap");
    fs::write(&base, b"not a dir").unwrap();
    let mgr = SnapManager::new(&base, &SnapManagerConfig::default(), None);
    assert!(matches!(mgr.init(), Err(Error::Config(_))));
}

#[test]
fn test_send_then_receive_between_managers() {
    let dir = TempDir::new().unwrap();
    let leader = SnapManager::new(dir.path().join("leader"), &SnapManagerConfig::default(), None);
    let follower =
        SnapManager::new(dir.path().join("follower"), &SnapManagerConfig::default(), None);
    leader.init().unwrap();
    follower.init().unwrap();

    let key = SnapKey::new(7, 3, 42);
    leader.register(key, SnapEntry::Generating);
    let payload = {
        let mut snap_gen = leader.get_snapshot_for_building(key).unwrap();
        snap_gen.build(&Region::first(7, 1, 7), b"kv pairs of region 7").unwrap()
    };
    leader.deregister(key, SnapEntry::Generating);

    leader.register(key, SnapEntry::Sending);
    follower.register(key, SnapEntry::Receiving);
    let send = leader.get_snapshot_for_sending(key).unwrap();
    let mut recv = follower
        .get_snapshot_for_receiving(key, &payload.to_bytes().unwrap())
        .unwrap();
    for chunk in send.read_data().unwrap().chunks(5) {
        recv.write_chunk(chunk).unwrap();
    }
    recv.save().unwrap();
    leader.deregister(key, SnapEntry::Sending);
    follower.deregister(key, SnapEntry::Receiving);

    follower.register(key, SnapEntry::Applying);
    let apply = follower.get_snapshot_for_applying(key).unwrap();
    assert_eq!(apply.read_data().unwrap(), b"kv pairs of region 7".to_vec());
    assert_eq!(apply.snapshot_data().unwrap().region.id, 7);
    follower.deregister(key, SnapEntry::Applying);

    assert!(follower.delete_snapshot(key, apply.as_ref(), true).unwrap());
    assert_eq!(follower.get_total_snap_size(), 0);
    assert_eq!(leader.get_total_snap_size(), 20);
}

#[test]
fn test_concurrent_register_and_build() {
    let dir = TempDir::new().unwrap();
    let (router, rx) = StoreRouter::new();
    let mgr = Arc::new(SnapManager::new(
        dir.path().join("snap"),
        &SnapManagerConfig::default(),
        Some(Arc::new(router)),
    ));
    mgr.init().unwrap();

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let mgr = Arc::clone(&mgr);
            thread::spawn(move || {
                for i in 0..25u64 {
                    let key = SnapKey::new(t * 100 + i, 1, 1);
                    mgr.register(key, SnapEntry::Generating);
                    build(&mgr, key, 10);
                    mgr.deregister(key, SnapEntry::Generating);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(mgr.get_total_snap_size(), 8 * 25 * 10);
    assert_eq!(mgr.stats().sending_count, 0);
    assert_eq!(mgr.list_idle_snap().unwrap().len(), 200);
    assert_eq!(rx.try_iter().count(), 400);
}
