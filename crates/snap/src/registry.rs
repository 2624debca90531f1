//! In-memory registry of snapshots in use
//!
//! Maps each [`SnapKey`] to the set of lifecycle roles it is currently used
//! in. A key with no entry is idle: its files may be listed as idle and
//! deleted. The registry itself is not synchronized; [`SnapManager`]
//! guards it with one `RwLock`.
//!
//! [`SnapManager`]: crate::SnapManager

use std::collections::HashMap;
use std::fmt;

use regionstore_core::{SnapEntry, SnapKey, SnapStats};

/// Set of [`SnapEntry`] values, one bit each
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EntrySet(u8);

impl EntrySet {
    fn bit(entry: SnapEntry) -> u8 {
        match entry {
            SnapEntry::Generating => 1 << 0,
            SnapEntry::Sending => 1 << 1,
            SnapEntry::Receiving => 1 << 2,
            SnapEntry::Applying => 1 << 3,
        }
    }

    /// Add `entry`; false if it was already present
    pub fn insert(&mut self, entry: SnapEntry) -> bool {
        let bit = Self::bit(entry);
        let added = self.0 & bit == 0;
        self.0 |= bit;
        added
    }

    /// Remove `entry`; false if it was absent
    pub fn remove(&mut self, entry: SnapEntry) -> bool {
        let bit = Self::bit(entry);
        let present = self.0 & bit != 0;
        self.0 &= !bit;
        present
    }

    /// Membership test
    pub fn contains(&self, entry: SnapEntry) -> bool {
        self.0 & Self::bit(entry) != 0
    }

    /// True if no entry is set
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of entries set
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Entries set, in pipeline order
    pub fn iter(&self) -> impl Iterator<Item = SnapEntry> + '_ {
        SnapEntry::ALL.into_iter().filter(move |e| self.contains(*e))
    }

    /// Holds Generating or Sending
    pub fn is_sending(&self) -> bool {
        self.contains(SnapEntry::Generating) || self.contains(SnapEntry::Sending)
    }

    /// Holds Receiving or Applying
    pub fn is_receiving(&self) -> bool {
        self.contains(SnapEntry::Receiving) || self.contains(SnapEntry::Applying)
    }
}

impl fmt::Debug for EntrySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// SnapKey -> roles currently in use
#[derive(Debug, Default)]
pub struct SnapRegistry {
    entries: HashMap<SnapKey, EntrySet>,
}

impl SnapRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entry` for `key`; false if it was already recorded
    pub fn register(&mut self, key: SnapKey, entry: SnapEntry) -> bool {
        self.entries.entry(key).or_default().insert(entry)
    }

    /// Drop `entry` for `key`; false if it was not recorded.
    ///
    /// A key whose last entry is removed leaves the registry.
    pub fn deregister(&mut self, key: &SnapKey, entry: SnapEntry) -> bool {
        let Some(set) = self.entries.get_mut(key) else {
            return false;
        };
        let removed = set.remove(entry);
        if set.is_empty() {
            self.entries.remove(key);
        }
        removed
    }

    /// True if `key` holds any entry
    pub fn contains_key(&self, key: &SnapKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries recorded for `key`
    pub fn entries(&self, key: &SnapKey) -> Option<EntrySet> {
        self.entries.get(key).copied()
    }

    /// Count keys per side; a key may count on both sides
    pub fn stats(&self) -> SnapStats {
        let mut stats = SnapStats::default();
        for set in self.entries.values() {
            if set.is_sending() {
                stats.sending_count += 1;
            }
            if set.is_receiving() {
                stats.receiving_count += 1;
            }
        }
        stats
    }

    /// Number of keys in use
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no key is in use
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
