//! On-disk snapshot file names
//!
//! ```text
//! {gen|rev}_{region_id}_{term}_{index}.meta        snapshot metadata
//! {gen|rev}_{region_id}_{term}_{index}.sst         snapshot data (counted in the quota)
//! {gen|rev}_{region_id}_{term}_{index}.*.tmp       in-progress writes (removed on init)
//! ```
//!
//! `gen` files belong to the producer side (generating/sending), `rev` files
//! to the consumer side (receiving/applying).

use regionstore_core::{Error, Result, SnapKey, SnapKeyWithSending};

/// Prefix of generating/sending-side files
pub const SNAP_GEN_PREFIX: &str = "gen";
/// Prefix of receiving/applying-side files
pub const SNAP_REV_PREFIX: &str = "rev";

/// Suffix of metadata files
pub const META_FILE_SUFFIX: &str = ".meta";
/// Suffix of finalized data files
pub const SST_FILE_SUFFIX: &str = ".sst";
/// Suffix of temporary files
pub const TMP_FILE_SUFFIX: &str = ".tmp";

/// Prefix for one side
pub fn snap_prefix(is_sending: bool) -> &'static str {
    if is_sending {
        SNAP_GEN_PREFIX
    } else {
        SNAP_REV_PREFIX
    }
}

/// Common stem of a snapshot's files, e.g. `gen_1_5_10`
pub fn snap_file_stem(key: &SnapKey, is_sending: bool) -> String {
    format!("{}_{}", snap_prefix(is_sending), key)
}

/// Metadata file name
pub fn meta_file_name(key: &SnapKey, is_sending: bool) -> String {
    format!("{}{}", snap_file_stem(key, is_sending), META_FILE_SUFFIX)
}

/// Data file name
pub fn data_file_name(key: &SnapKey, is_sending: bool) -> String {
    format!("{}{}", snap_file_stem(key, is_sending), SST_FILE_SUFFIX)
}

/// Temporary name for a file being written
pub fn tmp_file_name(final_name: &str) -> String {
    format!("{}{}", final_name, TMP_FILE_SUFFIX)
}

/// Parse a metadata file name.
///
/// Returns `Ok(None)` for names without the meta suffix.
///
/// # Errors
/// Returns `Parse` if the stem is not exactly four `_`-separated segments
/// or a numeric segment does not parse.
pub fn parse_meta_file_name(name: &str) -> Result<Option<SnapKeyWithSending>> {
    let stem = match name.strip_suffix(META_FILE_SUFFIX) {
        Some(stem) => stem,
        None => return Ok(None),
    };
    let is_sending = stem.starts_with(SNAP_GEN_PREFIX);

    let segments: Vec<&str> = stem.split('_').collect();
    if segments.len() != 4 {
        return Err(Error::Parse(format!("failed to parse file {}", stem)));
    }
    let parse = |s: &str| {
        s.parse::<u64>()
            .map_err(|e| Error::Parse(format!("failed to parse file {}: {}", stem, e)))
    };
    let key = SnapKey::new(parse(segments[1])?, parse(segments[2])?, parse(segments[3])?);
    Ok(Some(SnapKeyWithSending { key, is_sending }))
}
