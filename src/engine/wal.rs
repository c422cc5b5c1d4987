//! STRATA - Write-Ahead Log
//! Append-only operation log for a future durability layer. The tree does
//! not write to it; crash recovery is not provided.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};
use crate::types::{Key, Value};

/// Logged operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub operation: Operation,
    pub key: Key,
    pub value: Value,
}

impl LogRecord {
    pub fn insert(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self {
            operation: Operation::Insert,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn update(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Self {
            operation: Operation::Update,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Key>) -> Self {
        Self {
            operation: Operation::Delete,
            key: key.into(),
            value: Value::new(),
        }
    }
}

/// Upper bound on one encoded record; larger lengths are corruption.
const MAX_RECORD_LEN: u32 = 64 * 1024 * 1024;

const HEADER_LEN: u64 = 8;
const TRAILER_LEN: u64 = 4;

/// Write-Ahead Log file.
///
/// ## Frame Format (per record)
/// ```text
/// [payload_len: 4 bytes (LE)][crc32(payload_len): 4 bytes (LE)]
/// [payload: bincode(LogRecord)][crc32(payload_len + payload): 4 bytes (LE)]
/// ```
/// The header checksum lets replay tell a damaged length apart from a frame
/// cut short by a crash.
pub struct WriteAheadLog {
    path: PathBuf,
    file: File,
    sync_writes: bool,
}

impl WriteAheadLog {
    /// Open or create a WAL file for appending.
    pub fn open(path: impl Into<PathBuf>, sync_writes: bool) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            sync_writes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(record: &LogRecord) -> Result<Vec<u8>> {
        let payload = bincode::serialize(record)?;
        let len = match u32::try_from(payload.len()) {
            Ok(len) if len <= MAX_RECORD_LEN => len.to_le_bytes(),
            _ => {
                return Err(StrataError::Serialization(format!(
                    "record of {} bytes exceeds the {} byte frame limit",
                    payload.len(),
                    MAX_RECORD_LEN
                )))
            }
        };

        let mut buf = Vec::with_capacity(payload.len() + (HEADER_LEN + TRAILER_LEN) as usize);
        buf.extend_from_slice(&len);
        buf.extend_from_slice(&crc32fast::hash(&len).to_le_bytes());
        buf.extend_from_slice(&payload);
        buf.extend_from_slice(&frame_checksum(&len, &payload).to_le_bytes());
        Ok(buf)
    }

    /// Append one record, with fsync when `sync_writes` is set.
    pub fn append(&mut self, record: &LogRecord) -> Result<()> {
        let frame = Self::encode(record)?;
        self.file.write_all(&frame)?;
        if self.sync_writes {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Drop every record written so far.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Read back every complete record of the log at `path`.
    ///
    /// A frame cut short at the end of the file (torn write) ends the replay
    /// without error. A bad header checksum, an oversized length or a bad
    /// frame checksum is reported as corruption.
    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<LogRecord>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        let mut offset = 0u64;

        loop {
            let mut header = [0u8; HEADER_LEN as usize];
            match read_full(&mut reader, &mut header)? {
                0 => break,
                n if n < header.len() => {
                    log::warn!("{:?}: ignoring torn frame header at byte {}", path, offset);
                    break;
                }
                _ => {}
            }

            let (len, header_crc) = header.split_at(4);
            if crc32fast::hash(len) != u32_le(header_crc) {
                return Err(StrataError::Corruption(format!(
                    "{:?}: bad frame header at byte {}",
                    path, offset
                )));
            }
            let payload_len = u32_le(len);
            if payload_len > MAX_RECORD_LEN {
                return Err(StrataError::Corruption(format!(
                    "{:?}: frame at byte {} claims {} bytes",
                    path, offset, payload_len
                )));
            }

            let mut body = vec![0u8; payload_len as usize + TRAILER_LEN as usize];
            if read_full(&mut reader, &mut body)? < body.len() {
                log::warn!("{:?}: ignoring torn record at byte {}", path, offset);
                break;
            }
            let (payload, crc) = body.split_at(payload_len as usize);
            if frame_checksum(len, payload) != u32_le(crc) {
                return Err(StrataError::Corruption(format!(
                    "{:?}: CRC mismatch in record {} at byte {}",
                    path,
                    records.len(),
                    offset
                )));
            }

            records.push(bincode::deserialize(payload)?);
            offset += HEADER_LEN + body.len() as u64;
        }
        Ok(records)
    }
}

fn frame_checksum(len: &[u8], payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(len);
    hasher.update(payload);
    hasher.finalize()
}

fn u32_le(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

// bytes read before EOF
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}
