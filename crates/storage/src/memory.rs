//! MemEngine: MVCC in-memory engine ordered by internal keys
//!
//! This module implements the [`KvEngine`] trait using:
//! - `BTreeMap` keyed by encoded [`InternalKey`]s, ordered with
//!   [`compare_internal_key`] so that each user key's newest version comes first
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for the last assigned sequence number
//! - an optional [`BatchLog`] making committed batches survive a restart
//!
//! # Design Notes
//!
//! - **Version history is kept**: a write adds a version, a delete adds a tombstone
//! - **Batch atomicity**: a batch is appended to the log as one record and
//!   published to the map under one write lock, so readers and replay see
//!   all of it or none of it
//! - **Writers are serialized** by the log mutex, which also orders sequence numbers

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use regionstore_core::{Error, Result};
use tracing::{debug, warn};

use crate::engine::{KvEngine, Mutation, WriteBatch};
use crate::internal_key::{
    compare_internal_key, user_key, InternalKey, ValueType, MAX_SEQUENCE_NUMBER, TRAILER_LEN,
};
use crate::log::{BatchLog, LogRecord};
use crate::testing::{CrashInjector, CrashPoint};

/// Encoded internal key with internal-key ordering
#[derive(Debug, Clone, PartialEq, Eq)]
struct EncodedKey(Vec<u8>);

impl Ord for EncodedKey {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        compare_internal_key(&self.0, &other.0)
    }
}

impl PartialOrd for EncodedKey {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// Smallest internal key for `user_key`: its newest possible version
fn seek_key(key: &[u8]) -> EncodedKey {
    let mut buf = Vec::with_capacity(key.len() + TRAILER_LEN);
    buf.extend_from_slice(key);
    buf.extend_from_slice(&[0xFF; TRAILER_LEN]);
    EncodedKey(buf)
}

/// MVCC engine with an optional durable batch log
#[derive(Debug)]
pub struct MemEngine {
    /// Every version of every key, newest first per user key
    data: RwLock<BTreeMap<EncodedKey, Vec<u8>>>,
    /// Last sequence number handed out
    last_sequence: AtomicU64,
    /// Durable log; the mutex also serializes writers
    log: Mutex<Option<BatchLog>>,
    /// Crash injection for tests
    crash: Arc<CrashInjector>,
    /// Set once an injected crash fired
    crashed: AtomicBool,
}

impl MemEngine {
    /// Create an empty, purely in-memory engine
    pub fn new() -> Self {
        MemEngine {
            data: RwLock::new(BTreeMap::new()),
            last_sequence: AtomicU64::new(0),
            log: Mutex::new(None),
            crash: Arc::new(CrashInjector::new()),
            crashed: AtomicBool::new(false),
        }
    }

    /// Open an engine backed by the batch log at `path`, replaying it
    pub fn open(path: &Path) -> Result<Self> {
        let (log, records) = BatchLog::open(path)?;
        let engine = MemEngine::new();
        for record in &records {
            engine.apply(record.first_seq, &record.mutations);
        }
        debug!(
            path = %path.display(),
            batches = records.len(),
            last_sequence = engine.last_sequence(),
            "Opened engine"
        );
        *engine.log.lock() = Some(log);
        Ok(engine)
    }

    /// Last sequence number assigned to a write
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Acquire)
    }

    /// Arm a simulated crash for the next write
    pub fn inject_crash(&self, point: CrashPoint) {
        self.crash.arm(point);
    }

    /// Shared crash injector
    pub fn crash_injector(&self) -> Arc<CrashInjector> {
        Arc::clone(&self.crash)
    }

    fn simulated_crash(&self, point: CrashPoint) -> Error {
        self.crashed.store(true, Ordering::Release);
        warn!(point = point.description(), "Simulated crash");
        Error::Engine(format!("simulated crash: {}", point.description()))
    }

    /// Publish a batch to the map
    fn apply(&self, first_seq: u64, mutations: &[Mutation]) {
        let mut data = self.data.write();
        let mut seq = first_seq;
        for m in mutations {
            let (ikey, value) = match m {
                Mutation::Put { key, value } => {
                    (InternalKey::new(key.clone(), seq, ValueType::Value), value.clone())
                }
                Mutation::Delete { key } => {
                    (InternalKey::new(key.clone(), seq, ValueType::Deletion), Vec::new())
                }
            };
            data.insert(EncodedKey(ikey.encode()), value);
            seq += 1;
        }
        let last = seq.saturating_sub(1);
        if last > self.last_sequence.load(Ordering::Acquire) {
            self.last_sequence.store(last, Ordering::Release);
        }
    }
}

impl Default for MemEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KvEngine for MemEngine {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let data = self.data.read();
        let newest = data.range(seek_key(key)..).next();
        match newest {
            Some((ikey, value)) if user_key(&ikey.0) == key => {
                let decoded = InternalKey::decode(&ikey.0)?;
                if decoded.value_type == ValueType::Deletion {
                    Ok(None)
                } else {
                    Ok(Some(value.clone()))
                }
            }
            _ => Ok(None),
        }
    }

    fn write(&self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut log = self.log.lock();
        if self.crashed.load(Ordering::Acquire) {
            return Err(Error::Engine(
                "engine is down after a simulated crash".to_string(),
            ));
        }

        let first_seq = self.last_sequence() + 1;
        let last_seq = first_seq + batch.len() as u64 - 1;
        if last_seq > MAX_SEQUENCE_NUMBER {
            return Err(Error::Engine("sequence number space exhausted".to_string()));
        }

        if self.crash.should_crash(CrashPoint::BeforeLogAppend) {
            return Err(self.simulated_crash(CrashPoint::BeforeLogAppend));
        }
        let torn = self.crash.should_crash(CrashPoint::TornLogAppend);
        if let Some(log) = log.as_mut() {
            let record = LogRecord {
                first_seq,
                mutations: batch.mutations().to_vec(),
            };
            if torn {
                log.append_torn(&record)?;
            } else {
                log.append(&record)?;
            }
        }
        if torn {
            return Err(self.simulated_crash(CrashPoint::TornLogAppend));
        }
        if self.crash.should_crash(CrashPoint::AfterLogAppend) {
            return Err(self.simulated_crash(CrashPoint::AfterLogAppend));
        }

        self.apply(first_seq, batch.mutations());
        Ok(())
    }

    fn scan(
        &self,
        start: &[u8],
        end: &[u8],
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<()> {
        let data = self.data.read();
        let mut last_user_key: Option<&[u8]> = None;
        for (ikey, value) in data.range(seek_key(start)..) {
            let ukey = user_key(&ikey.0);
            if !end.is_empty() && ukey >= end {
                break;
            }
            if last_user_key == Some(ukey) {
                // Older version of a key already resolved.
                continue;
            }
            last_user_key = Some(ukey);
            let decoded = InternalKey::decode(&ikey.0)?;
            if decoded.value_type == ValueType::Deletion {
                continue;
            }
            if !visitor(ukey, value) {
                break;
            }
        }
        Ok(())
    }
}
