//! Snapshot handles
//!
//! A [`Snapshot`] is one on-disk snapshot artifact bound to a lifecycle role.
//! The manager never creates files itself; it asks a [`SnapshotFactory`]
//! for a handle and only uses the handle's path, metadata, existence check
//! and deletion. [`FileSnapshotFactory`] is the default implementation.
//!
//! # Crash Safety
//!
//! Every file is written to `<name>.tmp`, fsynced, then renamed. The data
//! file is renamed before the meta file, so a visible `.meta` always has its
//! `.sst` beside it. Leftover `.tmp` files, and `.sst` files whose `.meta`
//! never landed, are removed by [`SnapManager::init`](crate::SnapManager::init).

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use regionstore_core::{Error, IoResultExt, Message, Region, Result, SnapEntry, SnapKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::limiter::{IoLimiter, LimitWriter};
use crate::naming::{data_file_name, meta_file_name, tmp_file_name};

/// Size and checksum of a snapshot's data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Data file length in bytes
    pub data_size: u64,
    /// crc32 of the data file
    pub checksum: u32,
}

/// Wire payload describing a snapshot, carried in the raft snapshot message.
///
/// Also stored, as JSON, in the snapshot's `.meta` file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Region the snapshot was taken of
    pub region: Region,
    /// Data file description
    pub meta: SnapshotMeta,
}

impl Message for SnapshotData {}

/// Shared state every handle needs from its manager
#[derive(Debug, Clone)]
pub struct SnapContext {
    /// Snapshot base directory
    pub dir: PathBuf,
    /// Total bytes of finalized data files
    pub size_track: Arc<AtomicU64>,
    /// Limiter for snapshot writes
    pub limiter: Arc<dyn IoLimiter>,
}

/// One on-disk snapshot bound to a lifecycle role
pub trait Snapshot: Send + fmt::Debug {
    /// Identity
    fn key(&self) -> SnapKey;

    /// Role the handle was opened for
    fn role(&self) -> SnapEntry;

    /// Path of the meta file, used in logs
    fn path(&self) -> &Path;

    /// True once the snapshot is finalized on disk
    fn exists(&self) -> bool;

    /// Filesystem metadata of the meta file
    fn meta(&self) -> Result<fs::Metadata>;

    /// Bytes counted toward the quota, 0 if not finalized
    fn total_size(&self) -> u64;

    /// Remove every file of the snapshot and release its quota
    fn delete(&self) -> Result<()>;

    /// Generating: write `data` as the snapshot of `region`.
    ///
    /// Returns the wire payload. A snapshot that already exists is not
    /// rebuilt; its stored payload is returned.
    fn build(&mut self, region: &Region, data: &[u8]) -> Result<SnapshotData>;

    /// Receiving: append a chunk of snapshot data
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    /// Receiving: verify and finalize the received data
    fn save(&mut self) -> Result<()>;

    /// Sending/applying: read the whole data file, verifying its checksum
    fn read_data(&self) -> Result<Vec<u8>>;

    /// Payload stored in the meta file
    fn snapshot_data(&self) -> Result<SnapshotData>;
}

/// Creates role-bound snapshot handles
pub trait SnapshotFactory: Send + Sync + fmt::Debug {
    /// Handle for generating a snapshot
    fn for_building(&self, ctx: &SnapContext, key: SnapKey) -> Result<Box<dyn Snapshot>>;

    /// Handle for streaming a generated snapshot
    fn for_sending(&self, ctx: &SnapContext, key: SnapKey) -> Result<Box<dyn Snapshot>>;

    /// Handle for receiving a snapshot described by `data`
    fn for_receiving(
        &self,
        ctx: &SnapContext,
        key: SnapKey,
        data: SnapshotData,
    ) -> Result<Box<dyn Snapshot>>;

    /// Handle for applying a received snapshot
    fn for_applying(&self, ctx: &SnapContext, key: SnapKey) -> Result<Box<dyn Snapshot>>;
}

/// Factory for [`FileSnapshot`] handles
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSnapshotFactory;

impl SnapshotFactory for FileSnapshotFactory {
    fn for_building(&self, ctx: &SnapContext, key: SnapKey) -> Result<Box<dyn Snapshot>> {
        Ok(Box::new(FileSnapshot::new(ctx, key, SnapEntry::Generating)))
    }

    fn for_sending(&self, ctx: &SnapContext, key: SnapKey) -> Result<Box<dyn Snapshot>> {
        let snap = FileSnapshot::new(ctx, key, SnapEntry::Sending);
        if snap.exists() {
            // Fail early on an unreadable meta file.
            snap.snapshot_data()?;
        }
        Ok(Box::new(snap))
    }

    fn for_receiving(
        &self,
        ctx: &SnapContext,
        key: SnapKey,
        data: SnapshotData,
    ) -> Result<Box<dyn Snapshot>> {
        let mut snap = FileSnapshot::new(ctx, key, SnapEntry::Receiving);
        snap.expected = Some(data);
        Ok(Box::new(snap))
    }

    fn for_applying(&self, ctx: &SnapContext, key: SnapKey) -> Result<Box<dyn Snapshot>> {
        Ok(Box::new(FileSnapshot::new(ctx, key, SnapEntry::Applying)))
    }
}

struct ReceiveState {
    writer: LimitWriter<BufWriter<File>>,
    hasher: crc32fast::Hasher,
    written: u64,
}

/// Snapshot stored as a `.sst` data file plus a JSON `.meta` file
pub struct FileSnapshot {
    key: SnapKey,
    role: SnapEntry,
    meta_path: PathBuf,
    data_path: PathBuf,
    meta_tmp_path: PathBuf,
    data_tmp_path: PathBuf,
    size_track: Arc<AtomicU64>,
    limiter: Arc<dyn IoLimiter>,
    /// Receiving: payload the data must match
    expected: Option<SnapshotData>,
    receiving: Option<ReceiveState>,
}

impl FileSnapshot {
    /// Handle for `key` in `role`; touches no file
    pub fn new(ctx: &SnapContext, key: SnapKey, role: SnapEntry) -> Self {
        let is_sending = role.is_sending_side();
        let meta_name = meta_file_name(&key, is_sending);
        let data_name = data_file_name(&key, is_sending);
        FileSnapshot {
            key,
            role,
            meta_tmp_path: ctx.dir.join(tmp_file_name(&meta_name)),
            data_tmp_path: ctx.dir.join(tmp_file_name(&data_name)),
            meta_path: ctx.dir.join(meta_name),
            data_path: ctx.dir.join(data_name),
            size_track: Arc::clone(&ctx.size_track),
            limiter: Arc::clone(&ctx.limiter),
            expected: None,
            receiving: None,
        }
    }

    fn check_role(&self, op: &str, allowed: &[SnapEntry]) -> Result<()> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot {} snapshot {} opened for {}",
                op, self.key, self.role
            )))
        }
    }

    fn write_meta(&self, data: &SnapshotData) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(data)?;
        let mut file = File::create(&self.meta_tmp_path)
            .ctx(|| format!("create {}", self.meta_tmp_path.display()))?;
        file.write_all(&bytes)
            .ctx(|| format!("write {}", self.meta_tmp_path.display()))?;
        file.sync_all()
            .ctx(|| format!("sync {}", self.meta_tmp_path.display()))?;
        fs::rename(&self.meta_tmp_path, &self.meta_path).ctx(|| {
            format!(
                "rename {} -> {}",
                self.meta_tmp_path.display(),
                self.meta_path.display()
            )
        })
    }

    /// Rename the data file into place. A data file already there was
    /// counted when it was finalized or found by `init`, so its size is
    /// released once it is replaced.
    fn finalize_data(&self) -> Result<()> {
        let replaced = match fs::metadata(&self.data_path) {
            Ok(m) => Some(m.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::io(format!("stat {}", self.data_path.display()), e)),
        };
        fs::rename(&self.data_tmp_path, &self.data_path).ctx(|| {
            format!(
                "rename {} -> {}",
                self.data_tmp_path.display(),
                self.data_path.display()
            )
        })?;
        if let Some(size) = replaced {
            warn!(path = %self.data_path.display(), size, "Replaced orphan snapshot data");
            release_size(&self.size_track, size);
        }
        Ok(())
    }

    fn remove_tmp_files(&self) -> Result<()> {
        remove_if_exists(&self.data_tmp_path)?;
        remove_if_exists(&self.meta_tmp_path)?;
        Ok(())
    }
}

impl fmt::Debug for FileSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSnapshot")
            .field("key", &self.key)
            .field("role", &self.role)
            .field("path", &self.meta_path)
            .finish()
    }
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(format!("remove {}", path.display()), e)),
    }
}

/// Subtract from the quota counter without wrapping below zero
pub(crate) fn release_size(size_track: &AtomicU64, bytes: u64) {
    let _ = size_track.fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
        Some(cur.saturating_sub(bytes))
    });
}

impl Snapshot for FileSnapshot {
    fn key(&self) -> SnapKey {
        self.key
    }

    fn role(&self) -> SnapEntry {
        self.role
    }

    fn path(&self) -> &Path {
        &self.meta_path
    }

    fn exists(&self) -> bool {
        self.meta_path.is_file() && self.data_path.is_file()
    }

    fn meta(&self) -> Result<fs::Metadata> {
        fs::metadata(&self.meta_path).ctx(|| format!("stat {}", self.meta_path.display()))
    }

    fn total_size(&self) -> u64 {
        if !self.meta_path.is_file() {
            return 0;
        }
        fs::metadata(&self.data_path).map(|m| m.len()).unwrap_or(0)
    }

    fn delete(&self) -> Result<()> {
        debug!(path = %self.meta_path.display(), "Deleting snapshot");
        let data_size = match fs::metadata(&self.data_path) {
            Ok(m) => Some(m.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::io(format!("stat {}", self.data_path.display()), e)),
        };
        // Meta first: once it is gone the snapshot no longer looks finalized.
        remove_if_exists(&self.meta_path)?;
        if let Some(size) = data_size {
            if remove_if_exists(&self.data_path)? {
                release_size(&self.size_track, size);
            }
        }
        self.remove_tmp_files()
    }

    fn build(&mut self, region: &Region, data: &[u8]) -> Result<SnapshotData> {
        self.check_role("build", &[SnapEntry::Generating])?;
        if self.exists() {
            info!(key = %self.key, "Snapshot already exists, skip building");
            return self.snapshot_data();
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.data_tmp_path)
            .ctx(|| format!("create {}", self.data_tmp_path.display()))?;
        let mut writer = LimitWriter::new(Arc::clone(&self.limiter), BufWriter::new(file));
        writer
            .write_all(data)
            .ctx(|| format!("write {}", self.data_tmp_path.display()))?;
        writer
            .flush()
            .ctx(|| format!("flush {}", self.data_tmp_path.display()))?;
        writer
            .get_ref()
            .get_ref()
            .sync_all()
            .ctx(|| format!("sync {}", self.data_tmp_path.display()))?;
        drop(writer);
        self.finalize_data()?;

        let snapshot_data = SnapshotData {
            region: region.clone(),
            meta: SnapshotMeta {
                data_size: data.len() as u64,
                checksum: crc32fast::hash(data),
            },
        };
        self.write_meta(&snapshot_data)?;
        self.size_track
            .fetch_add(snapshot_data.meta.data_size, Ordering::AcqRel);
        info!(
            key = %self.key,
            region_id = region.id,
            size = snapshot_data.meta.data_size,
            "Built snapshot"
        );
        Ok(snapshot_data)
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.check_role("receive", &[SnapEntry::Receiving])?;
        if self.exists() {
            // Already received in an earlier attempt.
            return Ok(());
        }
        if self.receiving.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.data_tmp_path)
                .ctx(|| format!("create {}", self.data_tmp_path.display()))?;
            self.receiving = Some(ReceiveState {
                writer: LimitWriter::new(Arc::clone(&self.limiter), BufWriter::new(file)),
                hasher: crc32fast::Hasher::new(),
                written: 0,
            });
        }
        if let Some(state) = self.receiving.as_mut() {
            state
                .writer
                .write_all(chunk)
                .ctx(|| format!("write {}", self.data_tmp_path.display()))?;
            state.hasher.update(chunk);
            state.written += chunk.len() as u64;
        }
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        self.check_role("save", &[SnapEntry::Receiving])?;
        if self.exists() {
            return Ok(());
        }
        let expected = self
            .expected
            .clone()
            .ok_or_else(|| Error::InvalidState(format!("snapshot {} has no payload", self.key)))?;

        if self.receiving.is_none() {
            // Zero chunks were received; an empty snapshot is still valid.
            self.write_chunk(&[])?;
        }
        let Some(state) = self.receiving.take() else {
            return Err(Error::InvalidState(format!(
                "snapshot {} was not received",
                self.key
            )));
        };
        let checksum = state.hasher.finalize();
        let written = state.written;
        let mut writer = state.writer;
        writer
            .flush()
            .ctx(|| format!("flush {}", self.data_tmp_path.display()))?;
        writer
            .get_ref()
            .get_ref()
            .sync_all()
            .ctx(|| format!("sync {}", self.data_tmp_path.display()))?;
        drop(writer);

        if written != expected.meta.data_size || checksum != expected.meta.checksum {
            self.remove_tmp_files()?;
            return Err(Error::Corruption(format!(
                "snapshot {} mismatch: got {} bytes crc {:#010x}, expected {} bytes crc {:#010x}",
                self.key, written, checksum, expected.meta.data_size, expected.meta.checksum
            )));
        }

        self.finalize_data()?;
        self.write_meta(&expected)?;
        self.size_track.fetch_add(written, Ordering::AcqRel);
        info!(key = %self.key, size = written, "Received snapshot");
        Ok(())
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        self.check_role("read", &[SnapEntry::Sending, SnapEntry::Applying])?;
        if !self.exists() {
            return Err(Error::NotFound(format!("snapshot {} not exists", self.key)));
        }
        let expected = self.snapshot_data()?;
        let data =
            fs::read(&self.data_path).ctx(|| format!("read {}", self.data_path.display()))?;
        let checksum = crc32fast::hash(&data);
        if data.len() as u64 != expected.meta.data_size || checksum != expected.meta.checksum {
            return Err(Error::Corruption(format!(
                "snapshot {} data does not match its meta",
                self.key
            )));
        }
        Ok(data)
    }

    fn snapshot_data(&self) -> Result<SnapshotData> {
        let bytes =
            fs::read(&self.meta_path).ctx(|| format!("read {}", self.meta_path.display()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
