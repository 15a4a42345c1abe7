//! `qdcache.tcb`: the single authoritative metadata file listing every
//! entry currently on disk. The cache manager treats this file, not the
//! directory listing, as ground truth — any `.qdc` file not named here is
//! an orphan, swept on next open (§4.7 "Eviction").

use std::collections::HashMap;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::format::CacheEntryMetadata;

pub const METADATA_FILE_NAME: &str = "qdcache.tcb";

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MetadataVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Default for MetadataVersion {
    fn default() -> Self {
        MetadataVersion {
            major: 0,
            minor: 1,
            patch: 0,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetadataFile {
    pub version: MetadataVersion,
    pub total_size: u64,
    pub entries: HashMap<String, CacheEntryMetadata>,
}

impl MetadataFile {
    pub fn load(path: &Path) -> io::Result<Self> {
        if !path.exists() {
            return Ok(MetadataFile::default());
        }
        let bytes = std::fs::read(path)?;
        postcard::from_bytes(&bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Writes this metadata file atomically (temp file + rename), the same
    /// durability discipline the `.qdc` entries themselves use.
    pub fn dump(&self, path: &Path) -> io::Result<()> {
        let bytes = postcard::to_allocvec(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, &bytes)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn insert(&mut self, fingerprint: String, meta: CacheEntryMetadata) {
        self.total_size += meta.size;
        self.entries.insert(fingerprint, meta);
    }

    pub fn remove(&mut self, fingerprint: &str) -> Option<CacheEntryMetadata> {
        let removed = self.entries.remove(fingerprint);
        if let Some(meta) = &removed {
            self.total_size = self.total_size.saturating_sub(meta.size);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE_NAME);
        let mut meta = MetadataFile::default();
        meta.insert(
            "abc".to_string(),
            CacheEntryMetadata {
                size: 10,
                args_type: vec![],
                rets: vec![],
                ret_type: "void".to_string(),
                created_at: 1,
                last_used_at: 1,
            },
        );
        meta.dump(&path).unwrap();
        let loaded = MetadataFile::load(&path).unwrap();
        assert_eq!(loaded.total_size, 10);
        assert!(loaded.entries.contains_key("abc"));
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE_NAME);
        let loaded = MetadataFile::load(&path).unwrap();
        assert_eq!(loaded.total_size, 0);
    }
}
