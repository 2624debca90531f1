//! Store configuration via `regionstore.toml`
//!
//! On first open a default `regionstore.toml` is written into the data
//! directory. To change settings, edit the file and restart.

use std::fs;
use std::path::{Path, PathBuf};

use regionstore_core::{Error, IoResultExt, Result};
use regionstore_snap::SnapManagerConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "regionstore.toml";

const KV_LOG_NAME: &str = "kv.log";
const RAFT_LOG_NAME: &str = "raft.log";
const SNAP_DIR_NAME: &str = "snap";

/// Store configuration loaded from `regionstore.toml`.
///
/// # Example
///
/// ```toml
/// [snap]
/// max_total_size = 0
/// max_write_bytes_per_sec = 0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Data directory; filled in from the directory the file was loaded from
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Snapshot manager settings
    #[serde(default)]
    pub snap: SnapManagerConfig,
}

impl StoreConfig {
    /// Default config rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            data_dir: data_dir.into(),
            snap: SnapManagerConfig::default(),
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# regionstore configuration

[snap]
# Quota on the total size of snapshot data files, in bytes.
# 0 = unlimited. When exceeded, idle sending snapshots are evicted
# oldest first before a new snapshot is generated.
max_total_size = 0

# Write rate for snapshot files, in bytes per second. 0 = unlimited.
max_write_bytes_per_sec = 0
"#
    }

    /// Read and parse config from a file path.
    ///
    /// `data_dir` is set to the file's parent directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).ctx(|| format!("read config file {}", path.display()))?;
        let mut config: StoreConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.data_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Load `regionstore.toml` from `dir`, writing the default file first if
    /// it is missing. Creates `dir` if needed.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).ctx(|| format!("create data dir {}", dir.display()))?;
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            fs::write(&path, Self::default_toml())
                .ctx(|| format!("write default config file {}", path.display()))?;
            info!(path = %path.display(), "Wrote default config");
        }
        Self::from_file(&path)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content).ctx(|| format!("write config file {}", path.display()))
    }

    /// Batch log of the kv engine
    pub fn kv_path(&self) -> PathBuf {
        self.data_dir.join(KV_LOG_NAME)
    }

    /// Batch log of the raft engine
    pub fn raft_path(&self) -> PathBuf {
        self.data_dir.join(RAFT_LOG_NAME)
    }

    /// Snapshot directory
    pub fn snap_path(&self) -> PathBuf {
        self.data_dir.join(SNAP_DIR_NAME)
    }
}
