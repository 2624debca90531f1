//! Key-value engine interface
//!
//! The bootstrap protocol and peer storage only need four things from an
//! engine: point reads, atomic batched writes, and ordered range scans.

use regionstore_core::{Message, Result};

/// One mutation inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Set `key` to `value`
    Put {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Remove `key`
    Delete {
        /// Key
        key: Vec<u8>,
    },
}

impl Mutation {
    /// Key the mutation touches
    pub fn key(&self) -> &[u8] {
        match self {
            Mutation::Put { key, .. } | Mutation::Delete { key } => key,
        }
    }
}

/// Ordered list of mutations applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.mutations.push(Mutation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Queue a put of a serialized record
    pub fn put_msg<M: Message>(&mut self, key: &[u8], msg: &M) -> Result<()> {
        let value = msg.to_bytes()?;
        self.mutations.push(Mutation::Put {
            key: key.to_vec(),
            value,
        });
        Ok(())
    }

    /// Queue a delete
    pub fn delete(&mut self, key: &[u8]) {
        self.mutations.push(Mutation::Delete { key: key.to_vec() });
    }

    /// Queued mutations, in order
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Number of queued mutations
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Drop all queued mutations
    pub fn clear(&mut self) {
        self.mutations.clear();
    }
}

/// Ordered key-value engine
pub trait KvEngine: Send + Sync {
    /// Newest live value of `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Apply every mutation of `batch` atomically
    fn write(&self, batch: &WriteBatch) -> Result<()>;

    /// Visit live entries with `start <= key < end` in key order.
    ///
    /// An empty `end` means unbounded. The visitor returns `false` to stop.
    fn scan(
        &self,
        start: &[u8],
        end: &[u8],
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<()>;

    /// Single-key put
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut wb = WriteBatch::new();
        wb.put(key, value);
        self.write(&wb)
    }

    /// Single-key delete
    fn delete(&self, key: &[u8]) -> Result<()> {
        let mut wb = WriteBatch::new();
        wb.delete(key);
        self.write(&wb)
    }
}

/// Read and decode a record
pub fn get_msg<M: Message>(engine: &dyn KvEngine, key: &[u8]) -> Result<Option<M>> {
    match engine.get(key)? {
        Some(bytes) => Ok(Some(M::from_bytes(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a single record
pub fn put_msg<M: Message>(engine: &dyn KvEngine, key: &[u8], msg: &M) -> Result<()> {
    let mut wb = WriteBatch::new();
    wb.put_msg(key, msg)?;
    engine.write(&wb)
}

/// True if no live entry exists in `[start, end)`
pub fn is_range_empty(engine: &dyn KvEngine, start: &[u8], end: &[u8]) -> Result<bool> {
    let mut has_data = false;
    engine.scan(start, end, &mut |_, _| {
        has_data = true;
        false
    })?;
    Ok(!has_data)
}
