//! Snapshot identity types
//!
//! This module defines the foundational snapshot types:
//! - SnapKey: (region, term, index) triple naming one snapshot instance
//! - SnapEntry: lifecycle role a snapshot is currently used in
//! - SnapKeyWithSending: a SnapKey found on disk, tagged with its side
//! - SnapStats: aggregate counts derived from the registry

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one snapshot instance
///
/// Ordered by region id, then term, then index (field order matters for
/// the derived `Ord`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct SnapKey {
    /// Region the snapshot belongs to
    pub region_id: u64,
    /// Raft term of the snapshot's last entry
    pub term: u64,
    /// Raft index of the snapshot's last entry
    pub index: u64,
}

impl SnapKey {
    /// Create a new SnapKey
    #[inline]
    pub fn new(region_id: u64, term: u64, index: u64) -> Self {
        SnapKey {
            region_id,
            term,
            index,
        }
    }
}

impl fmt::Display for SnapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.region_id, self.term, self.index)
    }
}

/// Lifecycle role of a snapshot
///
/// Producer side moves Generating -> Sending, consumer side moves
/// Receiving -> Applying. The same key may hold entries of both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapEntry {
    /// Snapshot is being built from the kv engine
    Generating,
    /// Snapshot is being streamed to a peer
    Sending,
    /// Snapshot is being received from a peer
    Receiving,
    /// Snapshot is being applied to the kv engine
    Applying,
}

impl SnapEntry {
    /// All entries, in pipeline order
    pub const ALL: [SnapEntry; 4] = [
        SnapEntry::Generating,
        SnapEntry::Sending,
        SnapEntry::Receiving,
        SnapEntry::Applying,
    ];

    /// Name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapEntry::Generating => "generating",
            SnapEntry::Sending => "sending",
            SnapEntry::Receiving => "receiving",
            SnapEntry::Applying => "applying",
        }
    }

    /// True for the producer-side roles (Generating, Sending)
    pub fn is_sending_side(&self) -> bool {
        matches!(self, SnapEntry::Generating | SnapEntry::Sending)
    }
}

impl fmt::Display for SnapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot found on disk, tagged with the side that produced its files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapKeyWithSending {
    /// Snapshot identity
    pub key: SnapKey,
    /// True for generating/sending-side files
    pub is_sending: bool,
}

/// Aggregate snapshot counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapStats {
    /// Keys holding Generating or Sending
    pub sending_count: usize,
    /// Keys holding Receiving or Applying
    pub receiving_count: usize,
}
