//! regionstore - snapshot lifecycle and store bootstrap for a
//! region-partitioned raft key-value store
//!
//! # Quick Start
//!
//! ```ignore
//! use regionstore::{bootstrap_store, prepare_bootstrap, Engines, SnapManager, StoreConfig};
//!
//! let config = StoreConfig::load_or_create(data_dir)?;
//! let engines = Engines::open(&config)?;
//! bootstrap_store(&engines, cluster_id, store_id)?;
//! let region = prepare_bootstrap(&engines, store_id, region_id, peer_id)?;
//!
//! let snap_mgr = SnapManager::new(config.snap_path(), &config.snap, None);
//! snap_mgr.init()?;
//! ```
//!
//! # Architecture
//!
//! - `regionstore-core`: errors, snapshot identity, region records, key layout
//! - `regionstore-storage`: internal-key codec and the MVCC engine
//! - `regionstore-snap`: snapshot handles, registry, quota and `SnapManager`
//! - `regionstore-engine`: the kv/raft engine pair and the bootstrap protocol

pub use regionstore_core::{
    keys, Error, Message, Region, RegionLocalState, RaftApplyState, RaftLocalState, Result,
    SnapEntry, SnapKey, SnapKeyWithSending, SnapStats, StoreIdent,
};
pub use regionstore_engine::{
    bootstrap_store, clear_prepare_bootstrap, clear_prepare_bootstrap_state, is_range_empty,
    is_store_bootstrapped, load_prepared_region, load_store_ident, prepare_bootstrap, Engines,
    StoreConfig,
};
pub use regionstore_snap::{
    IoLimiter, SnapManager, SnapManagerConfig, Snapshot, SnapshotData, SnapshotFactory,
    StatsObserver, StoreMsg, StoreRouter,
};
pub use regionstore_storage::{
    compare_internal_key, InternalKey, KvEngine, MemEngine, ValueType, WriteBatch,
};
