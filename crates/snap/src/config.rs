//! Snapshot manager configuration

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::limiter::{BytesPerSecLimiter, IoLimiter, UnlimitedLimiter};

/// Configuration for [`SnapManager`](crate::SnapManager).
///
/// `0` means unlimited for both fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapManagerConfig {
    /// Quota on the total size of finalized snapshot data files
    #[serde(default)]
    pub max_total_size: u64,
    /// Write rate for snapshot files
    #[serde(default)]
    pub max_write_bytes_per_sec: u64,
}

impl SnapManagerConfig {
    /// Builder-style quota setter
    pub fn with_max_total_size(mut self, bytes: u64) -> Self {
        self.max_total_size = bytes;
        self
    }

    /// Builder-style rate setter
    pub fn with_max_write_bytes_per_sec(mut self, bytes: u64) -> Self {
        self.max_write_bytes_per_sec = bytes;
        self
    }

    /// Quota the manager enforces
    pub fn effective_max_total_size(&self) -> u64 {
        if self.max_total_size == 0 {
            u64::MAX
        } else {
            self.max_total_size
        }
    }

    /// Limiter matching `max_write_bytes_per_sec`
    pub fn build_limiter(&self) -> Arc<dyn IoLimiter> {
        match self.max_write_bytes_per_sec {
            0 => Arc::new(UnlimitedLimiter),
            rate => Arc::new(BytesPerSecLimiter::new(rate)),
        }
    }
}
