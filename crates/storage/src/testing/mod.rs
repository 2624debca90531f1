//! Testing utilities for engine crash safety
//!
//! - **Crash Harness**: crash-point injection for [`MemEngine`](crate::MemEngine)
//!   batch writes, and the data state each point must leave behind
//!
//! # Example
//!
//! ```ignore
//! use regionstore_storage::testing::CrashPoint;
//!
//! let engine = MemEngine::open(&path)?;
//! engine.inject_crash(CrashPoint::TornLogAppend);
//! assert!(engine.write(&batch).is_err());
//! drop(engine);
//! let engine = MemEngine::open(&path)?; // batch is gone
//! ```

mod crash_harness;

pub use crash_harness::{CrashInjector, CrashPoint, DataState};
