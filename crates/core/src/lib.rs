//! Core types for regionstore
//!
//! This crate defines the foundational types used throughout the system:
//! - Error: Error type hierarchy
//! - SnapKey / SnapEntry: snapshot identity and lifecycle role
//! - Region records: region descriptor, local/apply/raft state, store ident
//! - Keys: local key layout shared by bootstrap and peer storage

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod keys;
pub mod region;
pub mod types;

pub use error::{Error, IoResultExt, Result};
pub use region::{
    HardState, Message, Peer, PeerState, RaftApplyState, RaftLocalState, RaftTruncatedState,
    Region, RegionEpoch, RegionLocalState, StoreIdent,
};
pub use types::{SnapEntry, SnapKey, SnapKeyWithSending, SnapStats};
