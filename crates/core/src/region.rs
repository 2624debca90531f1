//! Region and raft metadata records
//!
//! These are the values persisted under the local keys in [`crate::keys`].
//! They are serialized with MessagePack (`rmp-serde`) through the
//! [`Message`] trait.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Epoch of the first region of a freshly bootstrapped cluster
pub const INIT_EPOCH_VER: u64 = 1;
/// Conf version of the first region of a freshly bootstrapped cluster
pub const INIT_EPOCH_CONF_VER: u64 = 1;
/// Term of the fake log entry every initialized region starts from
pub const RAFT_INIT_LOG_TERM: u64 = 5;
/// Index of the fake log entry every initialized region starts from
pub const RAFT_INIT_LOG_INDEX: u64 = 5;

/// MessagePack encoding for persisted records
pub trait Message: Serialize + DeserializeOwned + Sized {
    /// Serialize to MessagePack bytes.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    /// Deserialize from MessagePack bytes.
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// One replica of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Peer {
    /// Peer id, unique in the cluster
    pub id: u64,
    /// Store hosting this peer
    pub store_id: u64,
}

/// Region membership/range versioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionEpoch {
    /// Bumped on membership change
    pub conf_ver: u64,
    /// Bumped on split/merge
    pub version: u64,
}

/// Region descriptor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Region {
    /// Region id
    pub id: u64,
    /// Inclusive start of the key range (empty = unbounded)
    pub start_key: Vec<u8>,
    /// Exclusive end of the key range (empty = unbounded)
    pub end_key: Vec<u8>,
    /// Current epoch
    pub region_epoch: RegionEpoch,
    /// Replicas
    pub peers: Vec<Peer>,
}

impl Region {
    /// The single-peer region a store starts its cluster with
    pub fn first(region_id: u64, store_id: u64, peer_id: u64) -> Self {
        Region {
            id: region_id,
            start_key: Vec::new(),
            end_key: Vec::new(),
            region_epoch: RegionEpoch {
                conf_ver: INIT_EPOCH_CONF_VER,
                version: INIT_EPOCH_VER,
            },
            peers: vec![Peer {
                id: peer_id,
                store_id,
            }],
        }
    }
}

/// Lifecycle state of the local peer of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PeerState {
    /// Serving normally
    #[default]
    Normal,
    /// A snapshot is being applied
    Applying,
    /// The peer was destroyed
    Tombstone,
}

/// Region state persisted in the kv engine
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionLocalState {
    /// Peer state
    pub state: PeerState,
    /// Region descriptor
    pub region: Region,
}

/// Compacted prefix of the raft log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RaftTruncatedState {
    /// Index of the last truncated entry
    pub index: u64,
    /// Term of the last truncated entry
    pub term: u64,
}

/// Applied progress persisted in the kv engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RaftApplyState {
    /// Last applied log index
    pub applied_index: u64,
    /// Truncated log prefix
    pub truncated_state: RaftTruncatedState,
}

impl RaftApplyState {
    /// Apply state of a freshly initialized region
    pub fn initial() -> Self {
        RaftApplyState {
            applied_index: RAFT_INIT_LOG_INDEX,
            truncated_state: RaftTruncatedState {
                index: RAFT_INIT_LOG_INDEX,
                term: RAFT_INIT_LOG_TERM,
            },
        }
    }
}

/// Raft hard state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HardState {
    /// Current term
    pub term: u64,
    /// Vote in the current term
    pub vote: u64,
    /// Committed index
    pub commit: u64,
}

/// Raft log metadata persisted in the raft engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RaftLocalState {
    /// Hard state
    pub hard_state: HardState,
    /// Index of the last log entry
    pub last_index: u64,
}

impl RaftLocalState {
    /// Raft state of a freshly initialized region
    pub fn initial() -> Self {
        RaftLocalState {
            hard_state: HardState {
                term: RAFT_INIT_LOG_TERM,
                vote: 0,
                commit: RAFT_INIT_LOG_INDEX,
            },
            last_index: RAFT_INIT_LOG_INDEX,
        }
    }
}

/// Store identity, written once by store bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreIdent {
    /// Cluster the store belongs to
    pub cluster_id: u64,
    /// Store id
    pub store_id: u64,
}

impl Message for Region {}
impl Message for RegionLocalState {}
impl Message for RaftApplyState {}
impl Message for RaftLocalState {}
impl Message for StoreIdent {}
