//! Internal key encoding
//!
//! An internal key is the engine-level form of a user key:
//!
//! ```text
//! user_key || be_u64((sequence_number << 8) | value_type)
//! ```
//!
//! Internal keys order by increasing user key (per a pluggable comparator),
//! then by decreasing packed trailer. Since the sequence number occupies the
//! high 56 bits of the trailer, a forward scan over one user key meets the
//! newest write first.

use std::cmp::Ordering;

use byteorder::{BigEndian, ByteOrder};
use regionstore_core::{Error, Result};

/// Length of the packed (sequence, type) trailer
pub const TRAILER_LEN: usize = 8;

/// Largest sequence number that fits the 56-bit field
pub const MAX_SEQUENCE_NUMBER: u64 = (1 << 56) - 1;

/// Kind of a versioned entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// Tombstone
    Deletion = 0,
    /// Full value
    Value = 1,
    /// Merge operand
    Merge = 2,
}

impl ValueType {
    /// Decode from the low byte of a trailer
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ValueType::Deletion),
            1 => Some(ValueType::Value),
            2 => Some(ValueType::Merge),
            _ => None,
        }
    }

    /// True for every value type up to and including `Merge`.
    ///
    /// Includes `Deletion`; compare against `ValueType::Deletion` to spot a
    /// tombstone.
    pub fn is_value(self) -> bool {
        self <= ValueType::Merge
    }
}

/// Decoded internal key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InternalKey {
    /// User-visible key
    pub user_key: Vec<u8>,
    /// Write sequence number, below 2^56
    pub sequence_number: u64,
    /// Entry kind
    pub value_type: ValueType,
}

impl InternalKey {
    /// Create a new internal key.
    ///
    /// Only the low 56 bits of `sequence_number` are kept; use
    /// [`try_new`](Self::try_new) to reject a larger value instead.
    pub fn new(user_key: impl Into<Vec<u8>>, sequence_number: u64, value_type: ValueType) -> Self {
        InternalKey {
            user_key: user_key.into(),
            sequence_number: sequence_number & MAX_SEQUENCE_NUMBER,
            value_type,
        }
    }

    /// Create a new internal key, checking the sequence number range
    ///
    /// # Errors
    /// Returns `Codec` if `sequence_number` is above [`MAX_SEQUENCE_NUMBER`].
    pub fn try_new(
        user_key: impl Into<Vec<u8>>,
        sequence_number: u64,
        value_type: ValueType,
    ) -> Result<Self> {
        if sequence_number > MAX_SEQUENCE_NUMBER {
            return Err(Error::Codec(format!(
                "sequence number {} exceeds {}",
                sequence_number, MAX_SEQUENCE_NUMBER
            )));
        }
        Ok(Self::new(user_key, sequence_number, value_type))
    }

    /// Encode to `user_key || trailer`
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.user_key.len() + TRAILER_LEN);
        self.encode_into(&mut buf);
        buf
    }

    /// Append the encoding to `buf`
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.user_key);
        let mut trailer = [0u8; TRAILER_LEN];
        BigEndian::write_u64(&mut trailer, self.pack_seq_and_type());
        buf.extend_from_slice(&trailer);
    }

    /// Decode an encoded internal key
    ///
    /// # Errors
    /// Returns `Corruption` if the input is shorter than the trailer or
    /// carries an unknown value type.
    pub fn decode(encoded: &[u8]) -> Result<Self> {
        if encoded.len() < TRAILER_LEN {
            return Err(Error::Corruption(format!(
                "internal key too short: {} bytes",
                encoded.len()
            )));
        }
        let split = encoded.len() - TRAILER_LEN;
        let packed = BigEndian::read_u64(&encoded[split..]);
        let (sequence_number, value_type) = unpack_seq_and_type(packed)?;
        Ok(InternalKey {
            user_key: encoded[..split].to_vec(),
            sequence_number,
            value_type,
        })
    }

    fn pack_seq_and_type(&self) -> u64 {
        (self.sequence_number << 8) | self.value_type as u64
    }
}

fn unpack_seq_and_type(packed: u64) -> Result<(u64, ValueType)> {
    let raw = (packed & 0xff) as u8;
    let value_type = ValueType::from_u8(raw)
        .ok_or_else(|| Error::Corruption(format!("unknown value type {}", raw)))?;
    Ok((packed >> 8, value_type))
}

/// User-key portion of an encoded internal key
///
/// Inputs shorter than the trailer are returned whole.
pub fn user_key(encoded: &[u8]) -> &[u8] {
    split_trailer(encoded).0
}

fn split_trailer(encoded: &[u8]) -> (&[u8], u64) {
    if encoded.len() < TRAILER_LEN {
        return (encoded, 0);
    }
    let split = encoded.len() - TRAILER_LEN;
    (&encoded[..split], BigEndian::read_u64(&encoded[split..]))
}

/// Orders user keys; internal-key order is derived from it
pub trait Comparator {
    /// Compare two user keys
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Compare two encoded internal keys:
    /// increasing user key, then decreasing sequence number (and type).
    fn compare_internal_key(&self, a: &[u8], b: &[u8]) -> Ordering {
        let (ua, na) = split_trailer(a);
        let (ub, nb) = split_trailer(b);
        self.compare(ua, ub).then_with(|| nb.cmp(&na))
    }
}

impl<F> Comparator for F
where
    F: Fn(&[u8], &[u8]) -> Ordering,
{
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self(a, b)
    }
}

/// Lexicographic byte order
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// Compare two encoded internal keys with the bytewise comparator
pub fn compare_internal_key(a: &[u8], b: &[u8]) -> Ordering {
    BytewiseComparator.compare_internal_key(a, b)
}
