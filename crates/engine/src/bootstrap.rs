//! Store and first-region bootstrap
//!
//! ```text
//! Unbootstrapped --prepare_bootstrap--> Prepared --clear_prepare_bootstrap_state--> Committed
//!                                               \--clear_prepare_bootstrap--------> RolledBack
//! ```
//!
//! Which branch follows `Prepared` is decided by the cluster coordinator.
//!
//! # Atomicity
//!
//! Prepare writes two batches. The kv batch carries the prepare marker,
//! the region state and the apply state, and is the commit point: a crash
//! before it lands leaves nothing behind. The raft batch carries the raft
//! state; if a crash cuts it short, [`load_prepared_region`] rewrites it
//! on the next start. Until then the marker, region state and apply state
//! exist without the raft state, so [`Engines::open`] runs that repair
//! before handing out the engines.

use regionstore_core::keys::{
    apply_state_key, raft_state_key, region_meta_prefix, region_raft_prefix, region_state_key,
    MIN_KEY, PREPARE_BOOTSTRAP_KEY, STORE_IDENT_KEY,
};
use regionstore_core::{
    Error, PeerState, RaftApplyState, RaftLocalState, Region, RegionLocalState, Result, StoreIdent,
};
use regionstore_storage::{get_msg, KvEngine, WriteBatch};
use tracing::{info, warn};

use crate::engines::Engines;

/// True if no live entry exists in `[start, end)`; an empty `end` is
/// unbounded
pub fn is_range_empty(engine: &dyn KvEngine, start: &[u8], end: &[u8]) -> Result<bool> {
    regionstore_storage::is_range_empty(engine, start, end)
}

/// Write the store identity.
///
/// # Errors
/// `AlreadyBootstrapped` if the identity exists or either engine already
/// holds data. Nothing is written in that case.
pub fn bootstrap_store(engines: &Engines, cluster_id: u64, store_id: u64) -> Result<()> {
    if let Some(ident) = load_store_ident(engines)? {
        return Err(Error::AlreadyBootstrapped(format!(
            "store is already bootstrapped with cluster {} store {}",
            ident.cluster_id, ident.store_id
        )));
    }
    if !is_range_empty(engines.kv.as_ref(), MIN_KEY, &[])? {
        return Err(Error::AlreadyBootstrapped(
            "kv store is not empty and has already had data".to_string(),
        ));
    }
    if !is_range_empty(engines.raft.as_ref(), MIN_KEY, &[])? {
        return Err(Error::AlreadyBootstrapped(
            "raft store is not empty and has already had data".to_string(),
        ));
    }

    let ident = StoreIdent {
        cluster_id,
        store_id,
    };
    let mut wb = WriteBatch::new();
    wb.put_msg(STORE_IDENT_KEY, &ident)?;
    engines.write_kv(&wb)?;
    info!(cluster_id, store_id, "Bootstrapped store");
    Ok(())
}

/// Read the store identity, if bootstrapped
pub fn load_store_ident(engines: &Engines) -> Result<Option<StoreIdent>> {
    get_msg(engines.kv.as_ref(), STORE_IDENT_KEY)
}

/// True once [`bootstrap_store`] has succeeded
pub fn is_store_bootstrapped(engines: &Engines) -> Result<bool> {
    Ok(load_store_ident(engines)?.is_some())
}

/// Persist the provisional first region of the cluster and its initial
/// local, apply and raft state. Returns the region.
pub fn prepare_bootstrap(
    engines: &Engines,
    store_id: u64,
    region_id: u64,
    peer_id: u64,
) -> Result<Region> {
    let region = Region::first(region_id, store_id, peer_id);
    write_prepare_bootstrap(engines, &region)?;
    info!(store_id, region_id, peer_id, "Prepared bootstrap region");
    Ok(region)
}

fn write_prepare_bootstrap(engines: &Engines, region: &Region) -> Result<()> {
    let state = RegionLocalState {
        state: PeerState::Normal,
        region: region.clone(),
    };
    let mut kv_wb = WriteBatch::new();
    kv_wb.put_msg(PREPARE_BOOTSTRAP_KEY, region)?;
    kv_wb.put_msg(&region_state_key(region.id), &state)?;
    kv_wb.put_msg(&apply_state_key(region.id), &RaftApplyState::initial())?;
    engines.write_kv(&kv_wb)?;

    write_initial_raft_state(engines, region.id)
}

fn write_initial_raft_state(engines: &Engines, region_id: u64) -> Result<()> {
    let mut raft_wb = WriteBatch::new();
    raft_wb.put_msg(&raft_state_key(region_id), &RaftLocalState::initial())?;
    engines.write_raft(&raft_wb)
}

/// The provisional region left by [`prepare_bootstrap`], if any.
///
/// Rewrites the initial raft state when a crash lost it.
pub fn load_prepared_region(engines: &Engines) -> Result<Option<Region>> {
    let Some(region) = get_msg::<Region>(engines.kv.as_ref(), PREPARE_BOOTSTRAP_KEY)? else {
        return Ok(None);
    };
    let raft_state: Option<RaftLocalState> =
        get_msg(engines.raft.as_ref(), &raft_state_key(region.id))?;
    if raft_state.is_none() {
        warn!(region_id = region.id, "Raft state of prepared region is missing, rewriting");
        write_initial_raft_state(engines, region.id)?;
    }
    Ok(Some(region))
}

/// Drop the prepare marker; the region's state stays. Used once the
/// cluster accepted the bootstrap.
pub fn clear_prepare_bootstrap_state(engines: &Engines) -> Result<()> {
    let mut wb = WriteBatch::new();
    wb.delete(PREPARE_BOOTSTRAP_KEY);
    engines.write_kv(&wb)?;
    info!("Cleared prepare bootstrap marker");
    Ok(())
}

/// Roll back [`prepare_bootstrap`]: remove the region's raft, region and
/// apply state together with the marker.
pub fn clear_prepare_bootstrap(engines: &Engines, region_id: u64) -> Result<()> {
    let mut raft_wb = WriteBatch::new();
    raft_wb.delete(&raft_state_key(region_id));
    engines.write_raft(&raft_wb)?;

    let mut kv_wb = WriteBatch::new();
    kv_wb.delete(PREPARE_BOOTSTRAP_KEY);
    kv_wb.delete(&region_state_key(region_id));
    kv_wb.delete(&apply_state_key(region_id));
    engines.write_kv(&kv_wb)?;
    info!(region_id, "Cleared prepare bootstrap");
    Ok(())
}

/// True if neither engine holds meta or raft keys for `region_id`
pub fn is_region_clean(engines: &Engines, region_id: u64) -> Result<bool> {
    let meta_start = region_meta_prefix(region_id);
    let meta_end = region_meta_prefix(region_id.saturating_add(1));
    let raft_start = region_raft_prefix(region_id);
    let raft_end = region_raft_prefix(region_id.saturating_add(1));
    for engine in [engines.kv.as_ref(), engines.raft.as_ref()] {
        if !is_range_empty(engine, &meta_start, &meta_end)?
            || !is_range_empty(engine, &raft_start, &raft_end)?
        {
            return Ok(false);
        }
    }
    Ok(true)
}
