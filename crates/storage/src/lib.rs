//! Storage layer for regionstore
//!
//! This crate implements the engine side consumed by bootstrap and peer storage:
//! - InternalKey: user key + sequence number + value type, MVCC ordering
//! - KvEngine: point reads, atomic write batches, ordered range scans
//! - MemEngine: BTreeMap over internal keys with RwLock, optional batch log
//! - Testing: crash-point injection for batch writes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod internal_key;
mod log;
pub mod memory;
pub mod testing;

pub use engine::{get_msg, is_range_empty, put_msg, KvEngine, Mutation, WriteBatch};
pub use internal_key::{
    compare_internal_key, BytewiseComparator, Comparator, InternalKey, ValueType,
    MAX_SEQUENCE_NUMBER,
};
pub use memory::MemEngine;
