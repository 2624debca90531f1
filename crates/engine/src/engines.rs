//! The pair of engines a store runs on
//!
//! Region data and region metadata live in the kv engine; raft log entries
//! and raft state live in the raft engine. The two are written by separate
//! batches, so a write spanning both is not atomic.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use regionstore_core::{IoResultExt, Result};
use regionstore_storage::{KvEngine, MemEngine, WriteBatch};
use tracing::info;

use crate::bootstrap::load_prepared_region;
use crate::config::StoreConfig;

/// kv engine plus raft engine
#[derive(Clone)]
pub struct Engines {
    /// Region data and metadata
    pub kv: Arc<dyn KvEngine>,
    /// Raft log and raft state
    pub raft: Arc<dyn KvEngine>,
    /// Location of the kv engine, `None` when in memory
    pub kv_path: Option<PathBuf>,
    /// Location of the raft engine, `None` when in memory
    pub raft_path: Option<PathBuf>,
}

impl Engines {
    /// Wrap two already-open engines
    pub fn new(kv: Arc<dyn KvEngine>, raft: Arc<dyn KvEngine>) -> Self {
        Engines {
            kv,
            raft,
            kv_path: None,
            raft_path: None,
        }
    }

    /// Two empty in-memory engines
    pub fn new_in_memory() -> Self {
        Self::new(Arc::new(MemEngine::new()), Arc::new(MemEngine::new()))
    }

    /// Open both engines under the configured data directory, replaying
    /// their batch logs.
    ///
    /// A prepare-bootstrap cut short between its kv and raft batches is
    /// completed before the engines are returned.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .ctx(|| format!("create data dir {}", config.data_dir.display()))?;
        let kv_path = config.kv_path();
        let raft_path = config.raft_path();
        let kv = MemEngine::open(&kv_path)?;
        let raft = MemEngine::open(&raft_path)?;
        info!(
            kv_path = %kv_path.display(),
            raft_path = %raft_path.display(),
            "Opened engines"
        );
        let engines = Engines {
            kv: Arc::new(kv),
            raft: Arc::new(raft),
            kv_path: Some(kv_path),
            raft_path: Some(raft_path),
        };
        if let Some(region) = load_prepared_region(&engines)? {
            info!(region_id = region.id, "Found prepared bootstrap region");
        }
        Ok(engines)
    }

    /// Write a batch to the kv engine
    pub fn write_kv(&self, batch: &WriteBatch) -> Result<()> {
        self.kv.write(batch)
    }

    /// Write a batch to the raft engine
    pub fn write_raft(&self, batch: &WriteBatch) -> Result<()> {
        self.raft.write(batch)
    }
}

impl fmt::Debug for Engines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engines")
            .field("kv_path", &self.kv_path)
            .field("raft_path", &self.raft_path)
            .finish()
    }
}
