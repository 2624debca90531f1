//! Store lifecycle tests
//!
//! Drive a whole store through the root crate: bootstrap, snapshot
//! generation and transfer, quota eviction and restart.

#[path = "../common/mod.rs"]
mod common;

mod bootstrap_flow;
mod restart;
mod snapshot_flow;
