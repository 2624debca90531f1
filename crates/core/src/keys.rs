//! Local key layout
//!
//! Every key a store writes for its own bookkeeping starts with
//! [`LOCAL_PREFIX`]. Per-region keys embed the region id big-endian so
//! that one region's keys form a contiguous range:
//!
//! ```text
//! 0x01 0x01                          store ident
//! 0x01 0x02                          prepare-bootstrap marker
//! 0x01 0x02 region_id 0x01 log_idx   raft log entry     (raft engine)
//! 0x01 0x02 region_id 0x02           raft state         (raft engine)
//! 0x01 0x02 region_id 0x03           apply state        (kv engine)
//! 0x01 0x03 region_id 0x01           region state       (kv engine)
//! ```
//!
//! The prepare marker `0x01 0x02` is a strict prefix of every raft-prefix
//! key, so range checks over a region must use [`region_raft_prefix`]
//! rather than the bare marker.

use byteorder::{BigEndian, ByteOrder};

/// First byte of every local key
pub const LOCAL_PREFIX: u8 = 0x01;

/// Lower bound of the whole key space
pub const MIN_KEY: &[u8] = &[];
/// Upper bound of the whole key space
pub const MAX_KEY: &[u8] = &[0xFF];

/// Lower bound of local keys
pub const LOCAL_MIN_KEY: &[u8] = &[LOCAL_PREFIX];
/// Upper bound of local keys
pub const LOCAL_MAX_KEY: &[u8] = &[LOCAL_PREFIX + 1];

/// Store identity key
pub const STORE_IDENT_KEY: &[u8] = &[LOCAL_PREFIX, 0x01];
/// Provisional first-region descriptor written by prepare-bootstrap
pub const PREPARE_BOOTSTRAP_KEY: &[u8] = &[LOCAL_PREFIX, 0x02];

/// Second byte of per-region raft keys
pub const REGION_RAFT_PREFIX: u8 = 0x02;
/// Second byte of per-region meta keys
pub const REGION_META_PREFIX: u8 = 0x03;

/// Suffix of raft log entry keys
pub const RAFT_LOG_SUFFIX: u8 = 0x01;
/// Suffix of the raft state key
pub const RAFT_STATE_SUFFIX: u8 = 0x02;
/// Suffix of the apply state key
pub const APPLY_STATE_SUFFIX: u8 = 0x03;
/// Suffix of the region state key
pub const REGION_STATE_SUFFIX: u8 = 0x01;

const REGION_PREFIX_LEN: usize = 2 + 8;

fn make_region_prefix(region_id: u64, category: u8) -> Vec<u8> {
    let mut key = vec![0u8; REGION_PREFIX_LEN];
    key[0] = LOCAL_PREFIX;
    key[1] = category;
    BigEndian::write_u64(&mut key[2..], region_id);
    key
}

fn make_region_key(region_id: u64, category: u8, suffix: u8) -> Vec<u8> {
    let mut key = make_region_prefix(region_id, category);
    key.push(suffix);
    key
}

/// Start of the region's raft key range
pub fn region_raft_prefix(region_id: u64) -> Vec<u8> {
    make_region_prefix(region_id, REGION_RAFT_PREFIX)
}

/// Start of the region's meta key range
pub fn region_meta_prefix(region_id: u64) -> Vec<u8> {
    make_region_prefix(region_id, REGION_META_PREFIX)
}

/// Raft state key of a region
pub fn raft_state_key(region_id: u64) -> Vec<u8> {
    make_region_key(region_id, REGION_RAFT_PREFIX, RAFT_STATE_SUFFIX)
}

/// Apply state key of a region
pub fn apply_state_key(region_id: u64) -> Vec<u8> {
    make_region_key(region_id, REGION_RAFT_PREFIX, APPLY_STATE_SUFFIX)
}

/// Region state key of a region
pub fn region_state_key(region_id: u64) -> Vec<u8> {
    make_region_key(region_id, REGION_META_PREFIX, REGION_STATE_SUFFIX)
}

/// Raft log entry key
pub fn raft_log_key(region_id: u64, log_index: u64) -> Vec<u8> {
    let mut key = make_region_key(region_id, REGION_RAFT_PREFIX, RAFT_LOG_SUFFIX);
    let mut idx = [0u8; 8];
    BigEndian::write_u64(&mut idx, log_index);
    key.extend_from_slice(&idx);
    key
}

/// Extract the region id from a per-region key, if it is one
pub fn decode_region_id(key: &[u8]) -> Option<u64> {
    if key.len() < REGION_PREFIX_LEN || key[0] != LOCAL_PREFIX {
        return None;
    }
    match key[1] {
        REGION_RAFT_PREFIX | REGION_META_PREFIX => Some(BigEndian::read_u64(&key[2..10])),
        _ => None,
    }
}
