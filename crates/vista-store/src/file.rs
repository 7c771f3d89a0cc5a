//! On-disk encoding of a [`Group`].
//!
//! ```text
//! [4 bytes: magic "VSTA"]
//! [2 bytes: format version (little-endian u16)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [8 bytes: payload length (little-endian u64)]
//! [N bytes: payload (bincode-serialized Group)]
//! ```
//!
//! Files are replaced atomically: the new contents are written to a temporary
//! file in the same directory and renamed over the old one.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::group::Group;

const MAGIC: &[u8; 4] = b"VSTA";
const FORMAT_VERSION: u16 = 1;
const HEADER_SIZE: usize = 4 + 2 + 4 + 8;

/// Serialize a group with its header.
pub fn encode(group: &Group) -> StoreResult<Vec<u8>> {
    let payload = bincode::serialize(group)?;
    let crc = crc32fast::hash(&payload);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a group, verifying header and checksum. `path` is only used in
/// error messages.
pub fn decode(bytes: &[u8], path: &Path) -> StoreResult<Group> {
    let corrupt = |reason: &str| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if bytes.len() < HEADER_SIZE {
        return Err(corrupt("file shorter than header"));
    }
    let (header, payload) = bytes.split_at(HEADER_SIZE);
    if &header[0..4] != MAGIC {
        return Err(corrupt("bad magic"));
    }

    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedFormat(version));
    }

    let expected_crc = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&header[10..18]);
    let length = u64::from_le_bytes(len_bytes);
    if length != payload.len() as u64 {
        return Err(corrupt("payload length mismatch"));
    }
    if crc32fast::hash(payload) != expected_crc {
        return Err(corrupt("checksum mismatch"));
    }

    let mut group: Group = bincode::deserialize(payload)?;
    group.reindex();
    Ok(group)
}

/// Read the group stored at `path`. Returns `Ok(None)` if there is no file.
pub fn load(path: &Path) -> StoreResult<Option<Group>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let group = decode(&bytes, path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "loaded store file");
    Ok(Some(group))
}

/// Atomically replace the file at `path` with `group`.
pub fn save(path: &Path, group: &Group) -> StoreResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let bytes = encode(group)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "saved store file");
    Ok(())
}
