//! Batch log backing a persistent [`MemEngine`](crate::MemEngine)
//!
//! One record per committed write batch:
//!
//! ```text
//! len: u32 LE | crc32(payload): u32 LE | payload
//! payload = first_seq: u64 LE | count: u32 LE | mutation*
//! mutation = 0x00 | klen: u32 | key                      (delete)
//!          | 0x01 | klen: u32 | key | vlen: u32 | value   (put)
//! ```
//!
//! A record either replays whole or not at all. A short or checksum-failing
//! record at the end of the file is a torn append and is cut off on open;
//! the same damage anywhere else is corruption.

use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use regionstore_core::{Error, IoResultExt, Result};
use tracing::{debug, warn};

use crate::engine::Mutation;

const HEADER_LEN: usize = 8;
const TAG_DELETE: u8 = 0x00;
const TAG_PUT: u8 = 0x01;

/// One committed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogRecord {
    pub first_seq: u64,
    pub mutations: Vec<Mutation>,
}

impl LogRecord {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        // Writes into a Vec cannot fail.
        let _ = payload.write_u64::<LittleEndian>(self.first_seq);
        let _ = payload.write_u32::<LittleEndian>(self.mutations.len() as u32);
        for m in &self.mutations {
            match m {
                Mutation::Delete { key } => {
                    payload.push(TAG_DELETE);
                    let _ = payload.write_u32::<LittleEndian>(key.len() as u32);
                    payload.extend_from_slice(key);
                }
                Mutation::Put { key, value } => {
                    payload.push(TAG_PUT);
                    let _ = payload.write_u32::<LittleEndian>(key.len() as u32);
                    payload.extend_from_slice(key);
                    let _ = payload.write_u32::<LittleEndian>(value.len() as u32);
                    payload.extend_from_slice(value);
                }
            }
        }

        let mut framed = Vec::with_capacity(HEADER_LEN + payload.len());
        let _ = framed.write_u32::<LittleEndian>(payload.len() as u32);
        let _ = framed.write_u32::<LittleEndian>(crc32fast::hash(&payload));
        framed.extend_from_slice(&payload);
        framed
    }

    fn decode_payload(payload: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(payload);
        let first_seq = cur.read_u64::<LittleEndian>()?;
        let count = cur.read_u32::<LittleEndian>()?;
        let mut mutations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = cur.read_u8()?;
            let key = read_bytes(&mut cur)?;
            let m = match tag {
                TAG_DELETE => Mutation::Delete { key },
                TAG_PUT => Mutation::Put {
                    key,
                    value: read_bytes(&mut cur)?,
                },
                other => {
                    return Err(Error::Corruption(format!("unknown mutation tag {}", other)));
                }
            };
            mutations.push(m);
        }
        Ok(LogRecord {
            first_seq,
            mutations,
        })
    }
}

fn read_bytes(cur: &mut Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = cur.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    cur.read_exact(&mut buf)?;
    Ok(buf)
}

/// Append-only batch log file
#[derive(Debug)]
pub(crate) struct BatchLog {
    file: File,
    path: PathBuf,
}

impl BatchLog {
    /// Open (or create) the log and return every intact record in order
    pub(crate) fn open(path: &Path) -> Result<(Self, Vec<LogRecord>)> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .ctx(|| format!("open batch log {}", path.display()))?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .ctx(|| format!("read batch log {}", path.display()))?;

        let (records, valid_len) = Self::replay(&bytes)?;
        if valid_len < bytes.len() {
            warn!(
                path = %path.display(),
                discarded = bytes.len() - valid_len,
                "Discarding torn batch log tail"
            );
            file.set_len(valid_len as u64)
                .ctx(|| format!("truncate batch log {}", path.display()))?;
            file.sync_all()
                .ctx(|| format!("sync batch log {}", path.display()))?;
        }
        file.seek(SeekFrom::End(0))
            .ctx(|| format!("seek batch log {}", path.display()))?;
        debug!(path = %path.display(), records = records.len(), "Opened batch log");

        Ok((
            BatchLog {
                file,
                path: path.to_path_buf(),
            },
            records,
        ))
    }

    fn replay(bytes: &[u8]) -> Result<(Vec<LogRecord>, usize)> {
        let mut records = Vec::new();
        let mut offset = 0usize;
        while offset < bytes.len() {
            let rest = &bytes[offset..];
            if rest.len() < HEADER_LEN {
                break;
            }
            let mut header = Cursor::new(&rest[..HEADER_LEN]);
            let len = header.read_u32::<LittleEndian>()? as usize;
            let crc = header.read_u32::<LittleEndian>()?;
            if rest.len() < HEADER_LEN + len {
                break;
            }
            let payload = &rest[HEADER_LEN..HEADER_LEN + len];
            let end = offset + HEADER_LEN + len;
            if crc32fast::hash(payload) != crc {
                if end == bytes.len() {
                    break;
                }
                return Err(Error::Corruption(format!(
                    "batch log checksum mismatch at offset {}",
                    offset
                )));
            }
            records.push(LogRecord::decode_payload(payload)?);
            offset = end;
        }
        Ok((records, offset))
    }

    /// Append a record and make it durable
    pub(crate) fn append(&mut self, record: &LogRecord) -> Result<()> {
        let bytes = record.encode();
        self.file
            .write_all(&bytes)
            .ctx(|| format!("append batch log {}", self.path.display()))?;
        self.file
            .sync_data()
            .ctx(|| format!("sync batch log {}", self.path.display()))
    }

    /// Write only the first half of a record, as a crash mid-append would
    pub(crate) fn append_torn(&mut self, record: &LogRecord) -> Result<()> {
        let bytes = record.encode();
        let half = bytes.len() / 2;
        self.file
            .write_all(&bytes[..half])
            .ctx(|| format!("append batch log {}", self.path.display()))?;
        self.file
            .sync_data()
            .ctx(|| format!("sync batch log {}", self.path.display()))
    }
}
