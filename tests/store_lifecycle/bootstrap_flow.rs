//! Bootstrap followed by the first snapshot of the bootstrapped region

use crate::common::*;
use regionstore::keys::{region_meta_prefix, region_raft_prefix};
use regionstore::{
    bootstrap_store, clear_prepare_bootstrap, clear_prepare_bootstrap_state, is_range_empty,
    is_store_bootstrapped, load_prepared_region, prepare_bootstrap, Error,
};

#[test]
fn bootstrap_commit_then_snapshot_first_region() {
    let store = TestStore::new();
    let engines = &store.engines;

    assert!(!is_store_bootstrapped(engines).unwrap());
    bootstrap_store(engines, 1, 1).unwrap();
    let region = prepare_bootstrap(engines, 1, 1, 1).unwrap();
    assert_eq!(load_prepared_region(engines).unwrap(), Some(region.clone()));

    clear_prepare_bootstrap_state(engines).unwrap();
    assert_eq!(load_prepared_region(engines).unwrap(), None);

    let key = SnapKey::new(region.id, 5, 5);
    store.generate(key, 64);
    assert_eq!(store.snap_mgr.get_total_snap_size(), 64);
    let snap = store.snap_mgr.get_snapshot_for_sending(key).unwrap();
    assert_eq!(snap.snapshot_data().unwrap().region, region);
}

#[test]
fn bootstrap_rollback_allows_retry() {
    let store = TestStore::new();
    let engines = &store.engines;

    bootstrap_store(engines, 1, 1).unwrap();
    prepare_bootstrap(engines, 1, 1, 1).unwrap();
    clear_prepare_bootstrap(engines, 1).unwrap();
    for prefix in [region_meta_prefix, region_raft_prefix] {
        assert!(is_range_empty(engines.kv.as_ref(), &prefix(1), &prefix(2)).unwrap());
        assert!(is_range_empty(engines.raft.as_ref(), &prefix(1), &prefix(2)).unwrap());
    }

    // The coordinator may hand out another region id on retry.
    let region = prepare_bootstrap(engines, 1, 2, 2).unwrap();
    assert_eq!(load_prepared_region(engines).unwrap(), Some(region));

    assert!(matches!(
        bootstrap_store(engines, 1, 1),
        Err(Error::AlreadyBootstrapped(_))
    ));
}
