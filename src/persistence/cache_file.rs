//! Embedding Cache File
//!
//! Binary persistence for the identifier -> embedding mapping.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Cache file format (all integers little endian):
/// - Magic: 4 bytes "IVEC"
/// - Version: 1 byte
/// - Dimension: 4 bytes
/// - Entry count: 4 bytes
/// - Entries: [id_len (4) + id (utf-8) + dimension * f32]*
/// - CRC32: 4 bytes over everything above

const CACHE_MAGIC: &[u8] = b"IVEC";
const CACHE_VERSION: u8 = 1;
const HEADER_SIZE: usize = 4 + 1 + 4 + 4;
const TRAILER_SIZE: usize = 4;

/// One persisted embedding
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub id: String,
    pub embedding: Vec<f32>,
}

impl CacheRecord {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            embedding,
        }
    }
}

/// Handle on the cache file of one dataset root
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Cache file named `file_name` directly under `root`
    pub fn in_root(root: &Path, file_name: &str) -> Self {
        Self::new(root.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read all records, `Ok(None)` when no cache file exists
    pub fn load(&self) -> Result<Option<Vec<CacheRecord>>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode(&data)
            .map(Some)
            .map_err(|reason| Error::CacheCorrupt {
                path: self.path.clone(),
                reason,
            })
    }

    /// Replace the cache file with `records`.
    ///
    /// Writes a sibling temp file and renames it over the old one, so
    /// readers see either the previous or the new cache.
    pub fn save(&self, records: &[CacheRecord]) -> Result<()> {
        let data = encode(records)?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        if let Err(e) = write_and_replace(&tmp_path, &self.path, &data) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

fn write_and_replace(tmp_path: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(tmp_path, path)
}

/// Serialize records; every embedding must have the same dimension
pub fn encode(records: &[CacheRecord]) -> Result<Bytes> {
    let dimension = records.first().map(|r| r.embedding.len()).unwrap_or(0);

    let body_len: usize = records
        .iter()
        .map(|r| 4 + r.id.len() + r.embedding.len() * 4)
        .sum();
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body_len + TRAILER_SIZE);

    // Header
    buf.put_slice(CACHE_MAGIC);
    buf.put_u8(CACHE_VERSION);
    buf.put_u32_le(dimension as u32);
    buf.put_u32_le(records.len() as u32);

    // Entries
    for record in records {
        if record.embedding.len() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: record.embedding.len(),
            });
        }
        buf.put_u32_le(record.id.len() as u32);
        buf.put_slice(record.id.as_bytes());
        for &x in &record.embedding {
            buf.put_f32_le(x);
        }
    }

    let checksum = crc32(&buf);
    buf.put_u32_le(checksum);

    Ok(buf.freeze())
}

/// Parse a cache file image, describing the first problem found
pub fn decode(data: &[u8]) -> std::result::Result<Vec<CacheRecord>, String> {
    if data.len() < HEADER_SIZE + TRAILER_SIZE {
        return Err(format!("file too short ({} bytes)", data.len()));
    }
    if &data[..4] != CACHE_MAGIC {
        return Err("invalid cache magic".to_string());
    }

    let (body, mut trailer) = data.split_at(data.len() - TRAILER_SIZE);
    let stored = trailer.get_u32_le();
    let computed = crc32(body);
    if stored != computed {
        return Err(format!(
            "checksum mismatch: stored {:#010x}, computed {:#010x}",
            stored, computed
        ));
    }

    let mut buf = &body[4..];
    let version = buf.get_u8();
    if version != CACHE_VERSION {
        return Err(format!("unsupported cache version: {}", version));
    }
    let dimension = buf.get_u32_le() as usize;
    let count = buf.get_u32_le() as usize;

    let vector_bytes = dimension
        .checked_mul(4)
        .ok_or_else(|| format!("dimension {} out of range", dimension))?;

    let mut records: Vec<CacheRecord> = Vec::with_capacity(count.min(buf.remaining() / 4));
    let mut seen = hashbrown::HashSet::with_capacity(records.capacity());

    for i in 0..count {
        if buf.remaining() < 4 {
            return Err(format!("truncated at entry {}", i));
        }
        let id_len = buf.get_u32_le() as usize;
        if buf.remaining() < id_len {
            return Err(format!("truncated id at entry {}", i));
        }
        let id = std::str::from_utf8(&buf[..id_len])
            .map_err(|_| format!("entry {} id is not valid utf-8", i))?
            .to_string();
        buf.advance(id_len);

        if buf.remaining() < vector_bytes {
            return Err(format!("truncated embedding at entry {}", i));
        }
        let mut embedding = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            embedding.push(buf.get_f32_le());
        }

        if !seen.insert(id.clone()) {
            return Err(format!("duplicate entry {:?}", id));
        }
        records.push(CacheRecord { id, embedding });
    }

    if buf.has_remaining() {
        return Err(format!("{} trailing bytes after entries", buf.remaining()));
    }

    Ok(records)
}

/// CRC32 with the reflected polynomial 0xEDB88320 (zlib/PNG variant)
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}
