//! Store engines and bootstrap for regionstore
//!
//! This crate ties the lower layers into a store:
//! - Engines: the kv engine and the raft engine a store runs on
//! - Bootstrap: one-time store identity and first-region initialization
//! - StoreConfig: `regionstore.toml` in the data directory

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod config;
pub mod engines;

pub use bootstrap::{
    bootstrap_store, clear_prepare_bootstrap, clear_prepare_bootstrap_state, is_range_empty,
    is_region_clean, is_store_bootstrapped, load_prepared_region, load_store_ident,
    prepare_bootstrap,
};
pub use config::{StoreConfig, CONFIG_FILE_NAME};
pub use engines::Engines;
