//! Crash harness for engine batch writes
//!
//! # Crash Points
//!
//! A batch write goes through three steps: append the record to the batch
//! log, fsync it, then publish the mutations to the memtable. The harness
//! can stop the write at each boundary:
//! - before anything reaches the log
//! - halfway through the log append (a torn record)
//! - after the log append, before the memtable update
//!
//! After an injected crash the engine refuses further writes, the same way
//! a dead process would. Reopening from the log shows what survived.

use parking_lot::Mutex;

/// Crash injection points in a batch write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrashPoint {
    /// Before the batch record is appended to the log
    BeforeLogAppend,
    /// Half of the batch record reaches the log
    TornLogAppend,
    /// Record is durable, memtable not yet updated
    AfterLogAppend,
}

impl CrashPoint {
    /// Get all crash points
    pub fn all() -> Vec<CrashPoint> {
        vec![
            CrashPoint::BeforeLogAppend,
            CrashPoint::TornLogAppend,
            CrashPoint::AfterLogAppend,
        ]
    }

    /// Get description of crash point
    pub fn description(&self) -> &'static str {
        match self {
            CrashPoint::BeforeLogAppend => "Before batch log append",
            CrashPoint::TornLogAppend => "During batch log append (torn record)",
            CrashPoint::AfterLogAppend => "After batch log append, before memtable update",
        }
    }

    /// Expected state of the batch once the engine is reopened
    pub fn expected_data_state(&self) -> DataState {
        match self {
            CrashPoint::BeforeLogAppend => DataState::NotPresent,
            CrashPoint::TornLogAppend => DataState::NotPresent,
            CrashPoint::AfterLogAppend => DataState::Present,
        }
    }
}

/// Expected data state after recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataState {
    /// No mutation of the batch is visible
    NotPresent,
    /// Every mutation of the batch is visible
    Present,
}

/// One-shot crash trigger shared with an engine
#[derive(Debug, Default)]
pub struct CrashInjector {
    armed: Mutex<Option<CrashPoint>>,
    fired: Mutex<Option<CrashPoint>>,
}

impl CrashInjector {
    /// Create a disarmed injector
    pub fn new() -> Self {
        Self::default()
    }

    /// Crash at `point` on the next write
    pub fn arm(&self, point: CrashPoint) {
        *self.armed.lock() = Some(point);
    }

    /// Cancel a pending crash
    pub fn disarm(&self) {
        *self.armed.lock() = None;
    }

    /// Consume the pending crash if it is armed at `point`
    pub fn should_crash(&self, point: CrashPoint) -> bool {
        let mut armed = self.armed.lock();
        if *armed == Some(point) {
            *armed = None;
            *self.fired.lock() = Some(point);
            true
        } else {
            false
        }
    }

    /// Point of the crash that already happened, if any
    pub fn crashed_at(&self) -> Option<CrashPoint> {
        *self.fired.lock()
    }
}
