//! The on-disk `<fingerprint>.qdc` entry layout (§6): a fixed binary
//! header around a JSON metadata blob and an opaque, backend-defined
//! payload, closed out with a CRC32 of everything before it.

use std::io::{self, Read, Write};
use std::path::Path;

use qd_ir::Arch;
use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 4] = *b"QDCK";
pub const FORMAT_VERSION: u32 = 1;

/// Per-entry bookkeeping carried both inside the `.qdc` file (as its JSON
/// metadata section) and in `qdcache.tcb`'s fingerprint map, matching
/// `KernelCacheMeta{size,args,rets,ret_type,args_type,created_at,
/// last_used_at}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntryMetadata {
    pub size: u64,
    pub args_type: Vec<String>,
    pub rets: Vec<String>,
    pub ret_type: String,
    pub created_at: u64,
    pub last_used_at: u64,
}

fn arch_tag(arch: Arch) -> u32 {
    match arch {
        Arch::Cpu => 0,
        Arch::Cuda => 1,
        Arch::Amdgpu => 2,
        Arch::Vulkan => 3,
        Arch::Metal => 4,
    }
}

fn arch_from_tag(tag: u32) -> Option<Arch> {
    match tag {
        0 => Some(Arch::Cpu),
        1 => Some(Arch::Cuda),
        2 => Some(Arch::Amdgpu),
        3 => Some(Arch::Vulkan),
        4 => Some(Arch::Metal),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("bad magic bytes, this is not a .qdc file")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
    #[error("unknown arch tag {0}")]
    UnknownArch(u32),
    #[error("CRC32 mismatch, entry is corrupt")]
    CrcMismatch,
    #[error("metadata is not valid JSON: {0}")]
    BadMetadata(#[from] serde_json::Error),
}

/// One parsed `.qdc` entry.
pub struct CacheEntry {
    pub arch: Arch,
    pub metadata: CacheEntryMetadata,
    pub payload: Vec<u8>,
}

/// Serializes `metadata`/`payload` into the `.qdc` byte layout and writes
/// it atomically: build the full buffer, write to a sibling temp file,
/// then rename over `path` (the same discipline `wasmtime-cache` uses for
/// its config file).
pub fn write_entry(
    path: &Path,
    arch: Arch,
    metadata: &CacheEntryMetadata,
    payload: &[u8],
) -> Result<(), FormatError> {
    let metadata_bytes = serde_json::to_vec(metadata)?;
    let mut buf = Vec::with_capacity(24 + metadata_bytes.len() + payload.len());
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&arch_tag(arch).to_le_bytes());
    buf.extend_from_slice(&(metadata_bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(&metadata_bytes);
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(payload);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&buf)?;
    tmp.persist(path).map_err(|e| FormatError::Io(e.error))?;
    Ok(())
}

pub fn read_entry(path: &Path) -> Result<CacheEntry, FormatError> {
    let mut buf = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut buf)?;
    if buf.len() < 24 {
        return Err(FormatError::BadMagic);
    }
    if buf[0..4] != MAGIC {
        return Err(FormatError::BadMagic);
    }
    let format_version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    if format_version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(format_version));
    }
    let arch_tag_value = u32::from_le_bytes(buf[8..12].try_into().unwrap());
    let arch = arch_from_tag(arch_tag_value).ok_or(FormatError::UnknownArch(arch_tag_value))?;
    let metadata_len = u32::from_le_bytes(buf[12..16].try_into().unwrap()) as usize;
    let metadata_start = 16;
    let metadata_end = metadata_start + metadata_len;
    let metadata: CacheEntryMetadata = serde_json::from_slice(&buf[metadata_start..metadata_end])?;

    let payload_len_start = metadata_end;
    let payload_len = u64::from_le_bytes(
        buf[payload_len_start..payload_len_start + 8]
            .try_into()
            .unwrap(),
    ) as usize;
    let payload_start = payload_len_start + 8;
    let payload_end = payload_start + payload_len;
    let payload = buf[payload_start..payload_end].to_vec();

    let stored_crc = u32::from_le_bytes(buf[payload_end..payload_end + 4].try_into().unwrap());
    let computed_crc = crc32fast::hash(&buf[0..payload_end]);
    if stored_crc != computed_crc {
        return Err(FormatError::CrcMismatch);
    }

    Ok(CacheEntry {
        arch,
        metadata,
        payload,
    })
}

/// zstd-compresses `payload` before it is written into the entry's
/// payload section. The byte layout above treats this as an
/// implementation-defined encoding inside `payload_bytes` — the `.qdc`
/// format itself does not know or care that the bytes are compressed.
pub fn compress_payload(payload: &[u8]) -> io::Result<Vec<u8>> {
    zstd::encode_all(payload, 0)
}

pub fn decompress_payload(compressed: &[u8]) -> io::Result<Vec<u8>> {
    zstd::decode_all(compressed)
}
