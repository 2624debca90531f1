//! Snapshot manager
//!
//! `SnapManager` hands out role-bound [`Snapshot`] handles, tracks which
//! snapshots are in use, and keeps the snapshot directory under its quota.
//!
//! # Locking
//!
//! The registry sits behind one `RwLock` covering the whole manager.
//! Register, deregister and stats hold it only for the metadata mutation.
//! The quota counter is an `AtomicU64` outside the lock, so
//! [`SnapManager::get_total_snap_size`] never waits on registry traffic.
//! [`SnapManager::delete_snapshot`] is the one operation that keeps the
//! write lock across file removal: a concurrent `register` for the same key
//! must see either the whole snapshot or none of it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use regionstore_core::{
    Error, IoResultExt, Message, Result, SnapEntry, SnapKey, SnapKeyWithSending, SnapStats,
};
use tracing::{debug, info, warn};

use crate::config::SnapManagerConfig;
use crate::limiter::IoLimiter;
use crate::naming::{parse_meta_file_name, META_FILE_SUFFIX, SST_FILE_SUFFIX, TMP_FILE_SUFFIX};
use crate::registry::SnapRegistry;
use crate::router::{notify_stats, StatsObserver};
use crate::snapshot::{FileSnapshotFactory, SnapContext, Snapshot, SnapshotData, SnapshotFactory};

/// Owner of the snapshot directory, registry and quota
pub struct SnapManager {
    ctx: SnapContext,
    registry: RwLock<SnapRegistry>,
    router: Option<Arc<dyn StatsObserver>>,
    factory: Arc<dyn SnapshotFactory>,
    max_total_size: u64,
}

impl SnapManager {
    /// Create a manager over `path` with file-backed snapshots.
    ///
    /// Nothing touches the disk until [`init`](Self::init).
    pub fn new(
        path: impl Into<PathBuf>,
        config: &SnapManagerConfig,
        router: Option<Arc<dyn StatsObserver>>,
    ) -> Self {
        Self::with_factory(
            path,
            config,
            router,
            Arc::new(FileSnapshotFactory),
            config.build_limiter(),
        )
    }

    /// Create a manager with an injected snapshot factory and limiter
    pub fn with_factory(
        path: impl Into<PathBuf>,
        config: &SnapManagerConfig,
        router: Option<Arc<dyn StatsObserver>>,
        factory: Arc<dyn SnapshotFactory>,
        limiter: Arc<dyn IoLimiter>,
    ) -> Self {
        SnapManager {
            ctx: SnapContext {
                dir: path.into(),
                size_track: Arc::new(AtomicU64::new(0)),
                limiter,
            },
            registry: RwLock::new(SnapRegistry::new()),
            router,
            factory,
            max_total_size: config.effective_max_total_size(),
        }
    }

    /// Snapshot base directory
    pub fn base(&self) -> &Path {
        &self.ctx.dir
    }

    /// Enforced quota, `u64::MAX` when unlimited
    pub fn max_total_size(&self) -> u64 {
        self.max_total_size
    }

    /// Limiter shared by every handle
    pub fn limiter(&self) -> &Arc<dyn IoLimiter> {
        &self.ctx.limiter
    }

    /// Prepare the base directory.
    ///
    /// Creates it if missing. Otherwise removes leftover `.tmp` files and
    /// `.sst` files without a `.meta`, and adds the size of every remaining
    /// `.sst` file to the quota counter.
    ///
    /// # Errors
    /// `Config` if the base path exists but is not a directory.
    pub fn init(&self) -> Result<()> {
        let base = &self.ctx.dir;
        let meta = match fs::metadata(base) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(base).ctx(|| format!("create {}", base.display()))?;
                info!(path = %base.display(), "Created snapshot directory");
                return Ok(());
            }
            Err(e) => return Err(Error::io(format!("stat {}", base.display()), e)),
        };
        if !meta.is_dir() {
            return Err(Error::Config(format!(
                "{} should be a directory",
                base.display()
            )));
        }

        let mut removed = 0usize;
        let mut removed_orphan = 0usize;
        let mut counted = 0u64;
        for entry in fs::read_dir(base).ctx(|| format!("read dir {}", base.display()))? {
            let entry = entry.ctx(|| format!("read dir {}", base.display()))?;
            let file_type = entry
                .file_type()
                .ctx(|| format!("stat {}", entry.path().display()))?;
            if file_type.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(TMP_FILE_SUFFIX) {
                let path = entry.path();
                fs::remove_file(&path).ctx(|| format!("remove {}", path.display()))?;
                removed += 1;
            } else if let Some(stem) = name.strip_suffix(SST_FILE_SUFFIX) {
                let path = entry.path();
                if !base.join(format!("{}{}", stem, META_FILE_SUFFIX)).is_file() {
                    // Crashed between the data and meta renames.
                    fs::remove_file(&path).ctx(|| format!("remove {}", path.display()))?;
                    removed_orphan += 1;
                    continue;
                }
                let len = entry
                    .metadata()
                    .ctx(|| format!("stat {}", path.display()))?
                    .len();
                counted += len;
            }
        }
        self.ctx.size_track.fetch_add(counted, Ordering::AcqRel);
        info!(
            path = %base.display(),
            removed_tmp = removed,
            removed_orphan,
            total_size = counted,
            "Initialized snapshot directory"
        );
        Ok(())
    }

    /// Snapshots on disk that no one has registered.
    ///
    /// Sorted by key; at an equal key the receiving-side file comes first.
    ///
    /// # Errors
    /// `Parse` on a meta file whose name does not follow the naming contract.
    pub fn list_idle_snap(&self) -> Result<Vec<SnapKeyWithSending>> {
        let base = &self.ctx.dir;
        let mut found = Vec::new();
        for entry in fs::read_dir(base).ctx(|| format!("read dir {}", base.display()))? {
            let entry = entry.ctx(|| format!("read dir {}", base.display()))?;
            if entry
                .file_type()
                .ctx(|| format!("stat {}", entry.path().display()))?
                .is_dir()
            {
                continue;
            }
            if let Some(parsed) = parse_meta_file_name(&entry.file_name().to_string_lossy())? {
                found.push(parsed);
            }
        }

        let mut idle: Vec<SnapKeyWithSending> = {
            let registry = self.registry.read();
            found
                .into_iter()
                .filter(|s| !registry.contains_key(&s.key))
                .collect()
        };
        idle.sort_by_key(|s| (s.key, s.is_sending));
        Ok(idle)
    }

    /// True if `key` holds any registry entry
    pub fn has_registered(&self, key: &SnapKey) -> bool {
        self.registry.read().contains_key(key)
    }

    /// Bytes of finalized snapshot data on disk
    pub fn get_total_snap_size(&self) -> u64 {
        self.ctx.size_track.load(Ordering::Acquire)
    }

    /// Handle for generating a snapshot, evicting idle snapshots first if
    /// usage is over quota.
    ///
    /// # Errors
    /// `QuotaExhausted` if eviction cannot bring usage under the quota.
    pub fn get_snapshot_for_building(&self, key: SnapKey) -> Result<Box<dyn Snapshot>> {
        if self.get_total_snap_size() > self.max_total_size {
            self.delete_old_idle_snaps()?;
        }
        self.factory.for_building(&self.ctx, key)
    }

    /// Handle for streaming a generated snapshot
    pub fn get_snapshot_for_sending(&self, key: SnapKey) -> Result<Box<dyn Snapshot>> {
        self.factory.for_sending(&self.ctx, key)
    }

    /// Handle for receiving a snapshot; `data` is the encoded
    /// [`SnapshotData`] carried by the raft message.
    ///
    /// # Errors
    /// `Codec` if `data` does not decode.
    pub fn get_snapshot_for_receiving(
        &self,
        key: SnapKey,
        data: &[u8],
    ) -> Result<Box<dyn Snapshot>> {
        let snapshot_data = SnapshotData::from_bytes(data)?;
        self.factory.for_receiving(&self.ctx, key, snapshot_data)
    }

    /// Handle for applying a received snapshot
    ///
    /// # Errors
    /// `NotFound` if no finalized snapshot exists for `key`.
    pub fn get_snapshot_for_applying(&self, key: SnapKey) -> Result<Box<dyn Snapshot>> {
        let snap = self.factory.for_applying(&self.ctx, key)?;
        if !snap.exists() {
            return Err(Error::NotFound(format!("snapshot of {} not exists", key)));
        }
        Ok(snap)
    }

    /// Record that `key` is in use as `entry`. A duplicate is logged and
    /// ignored.
    pub fn register(&self, key: SnapKey, entry: SnapEntry) {
        debug!(key = %key, entry = %entry, "Register snapshot");
        let added = self.registry.write().register(key, entry);
        if added {
            notify_stats(self.router.as_ref());
        } else {
            warn!(key = %key, entry = %entry, "Snapshot is registered more than once");
        }
    }

    /// Record that `key` is no longer in use as `entry`. A stale call is
    /// logged and ignored.
    pub fn deregister(&self, key: SnapKey, entry: SnapEntry) {
        debug!(key = %key, entry = %entry, "Deregister snapshot");
        let removed = self.registry.write().deregister(&key, entry);
        if removed {
            notify_stats(self.router.as_ref());
        } else {
            warn!(key = %key, entry = %entry, "Stale deregister");
        }
    }

    /// Registry counts per side
    pub fn stats(&self) -> SnapStats {
        self.registry.read().stats()
    }

    /// Delete `snap` unless `key` is in use.
    ///
    /// With `check_entry` the deletion is refused only when the key holds a
    /// non-empty entry set; without it, whenever the key is present at all.
    /// Returns whether the snapshot was deleted.
    pub fn delete_snapshot(
        &self,
        key: SnapKey,
        snap: &dyn Snapshot,
        check_entry: bool,
    ) -> Result<bool> {
        let registry = self.registry.write();
        if check_entry {
            if let Some(entries) = registry.entries(&key).filter(|e| !e.is_empty()) {
                info!(
                    path = %snap.path().display(),
                    entries = ?entries,
                    "Skip deleting snapshot, it is still registered"
                );
                return Ok(false);
            }
        } else if registry.contains_key(&key) {
            info!(path = %snap.path().display(), "Skip deleting registered snapshot");
            return Ok(false);
        }
        snap.delete()?;
        drop(registry);
        Ok(true)
    }

    /// Delete idle sending-side snapshots, oldest meta file first, until
    /// usage is within quota.
    fn delete_old_idle_snaps(&self) -> Result<()> {
        let mut candidates: Vec<(SystemTime, SnapKey, Box<dyn Snapshot>)> = Vec::new();
        for idle in self.list_idle_snap()? {
            if !idle.is_sending {
                continue;
            }
            let snap = match self.get_snapshot_for_sending(idle.key) {
                Ok(snap) => snap,
                Err(e) => {
                    debug!(key = %idle.key, error = %e, "Skip idle snapshot");
                    continue;
                }
            };
            let modified = snap
                .meta()?
                .modified()
                .ctx(|| format!("mtime {}", snap.path().display()))?;
            candidates.push((modified, idle.key, snap));
        }
        candidates.sort_by_key(|(modified, key, _)| (*modified, *key));

        let mut candidates = candidates.into_iter();
        while self.get_total_snap_size() > self.max_total_size {
            let Some((_, key, snap)) = candidates.next() else {
                warn!(
                    total_size = self.get_total_snap_size(),
                    max_total_size = self.max_total_size,
                    "No idle snapshot left to evict"
                );
                return Err(Error::too_many_snapshots());
            };
            if self.delete_snapshot(key, snap.as_ref(), false)? {
                info!(key = %key, path = %snap.path().display(), "Evicted idle snapshot");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SnapManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapManager")
            .field("base", &self.ctx.dir)
            .field("total_size", &self.get_total_snap_size())
            .field("max_total_size", &self.max_total_size)
            .field("factory", &self.factory)
            .finish()
    }
}
