//! Snapshot lifecycle for regionstore
//!
//! This crate provides:
//! - `SnapManager`: hands out role-bound snapshot handles, tracks which
//!   snapshots are in use and keeps the snapshot directory under quota
//! - `Snapshot` / `SnapshotFactory`: the handle contract and its injection
//!   seam, with a file-backed default (`FileSnapshot`)
//! - The on-disk naming contract for snapshot files
//! - `IoLimiter`: write throttling for snapshot files
//! - `StatsObserver` / `StoreRouter`: registry-change notification

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod limiter;
pub mod manager;
pub mod naming;
pub mod registry;
pub mod router;
pub mod snapshot;

pub use config::SnapManagerConfig;
pub use limiter::{BytesPerSecLimiter, IoLimiter, LimitWriter, UnlimitedLimiter};
pub use manager::SnapManager;
pub use naming::parse_meta_file_name;
pub use registry::{EntrySet, SnapRegistry};
pub use router::{StatsObserver, StoreMsg, StoreRouter};
pub use snapshot::{
    FileSnapshot, FileSnapshotFactory, SnapContext, Snapshot, SnapshotData, SnapshotFactory,
    SnapshotMeta,
};
