//! `CacheManager`: the single owner object for one process's compilation
//! cache (§4.7's "process-wide state with a single owner object" policy).
//! Grounded on `wasmtime-internal-cache`'s config/worker split, adapted to
//! this spec's explicit on-disk `.qdc` + `qdcache.tcb` layout rather than
//! wasmtime's module-blob cache.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use qd_ir::{Arch, CompileConfig};

use crate::eviction::EvictionPolicy;
use crate::error::CacheError;
use crate::format::{self, CacheEntryMetadata};
use crate::metadata::{MetadataFile, METADATA_FILE_NAME};
use crate::root::kernel_compilation_manager_dir;

/// An entry kept only in-memory because `CompileConfig::offline_cache` was
/// `false` at `cache_kernel` time (§4.7: "the entry is kept in-memory only
/// and MUST NOT be persisted").
struct InMemoryEntry {
    arch: Arch,
    metadata: CacheEntryMetadata,
    payload: Vec<u8>,
}

pub struct CacheManager {
    dir: PathBuf,
    metadata: MetadataFile,
    /// Fingerprints `cache_kernel` has accepted this process, to enforce
    /// the "caching the same fingerprint twice is fatal" rule even when a
    /// stale on-disk entry from a previous process exists.
    cached_this_process: HashSet<String>,
    /// Entries cached with offline caching disabled — never written to
    /// disk, never entered into `metadata`, dropped with the process.
    in_memory: HashMap<String, InMemoryEntry>,
}

impl CacheManager {
    /// Opens (creating if absent) the cache rooted at `root`, loading
    /// `qdcache.tcb` and sweeping any `.qdc` file not named in it.
    pub fn open(root: &Path) -> Result<Self, CacheError> {
        let dir = kernel_compilation_manager_dir(root);
        std::fs::create_dir_all(&dir)?;
        let metadata_path = dir.join(METADATA_FILE_NAME);
        let metadata = MetadataFile::load(&metadata_path)?;

        let mut manager = CacheManager {
            dir,
            metadata,
            cached_this_process: HashSet::new(),
            in_memory: HashMap::new(),
        };
        manager.sweep_orphans()?;
        Ok(manager)
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.qdc"))
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE_NAME)
    }

    fn sweep_orphans(&self) -> Result<(), CacheError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(()),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("qdc") {
                continue;
            }
            let fingerprint = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if !self.metadata.entries.contains_key(fingerprint) {
                log::warn!("sweeping orphaned cache entry {}", path.display());
                let _ = std::fs::remove_file(&path);
            }
        }
        Ok(())
    }

    /// Looks up `fingerprint`, returning the decompressed payload and
    /// metadata on a hit and bumping `last_used_at`. A miss or I/O failure
    /// is never an error here (§7 "warn and continue with a cold
    /// compilation"); it is surfaced as `Ok(None)`, with the failure
    /// logged.
    pub fn lookup(&mut self, fingerprint: &str, now: u64) -> Option<(Arch, CacheEntryMetadata, Vec<u8>)> {
        if let Some(entry) = self.in_memory.get(fingerprint) {
            return Some((entry.arch, entry.metadata.clone(), entry.payload.clone()));
        }
        if !self.metadata.entries.contains_key(fingerprint) {
            return None;
        }
        let path = self.entry_path(fingerprint);
        let entry = match format::read_entry(&path) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("cache entry {fingerprint} unreadable ({e}), treating as a miss");
                return None;
            }
        };
        let payload = match format::decompress_payload(&entry.payload) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("cache entry {fingerprint} payload corrupt ({e}), treating as a miss");
                return None;
            }
        };
        if let Some(meta) = self.metadata.entries.get_mut(fingerprint) {
            meta.last_used_at = now;
        }
        Some((entry.arch, entry.metadata, payload))
    }

    /// Writes a new entry. Fatal (§7) if `fingerprint` was already cached
    /// by this process — the caller should have looked it up first.
    ///
    /// When `config.offline_cache` is `false`, the entry is kept in an
    /// in-memory-only map instead of being written to disk (§4.7: "the
    /// entry is kept in-memory only and MUST NOT be persisted") — it never
    /// reaches `qdcache.tcb` or a `.qdc` file, and is gone once this
    /// `CacheManager` is dropped.
    pub fn cache_kernel(
        &mut self,
        fingerprint: &str,
        arch: Arch,
        mut metadata: CacheEntryMetadata,
        payload: &[u8],
        now: u64,
        config: &CompileConfig,
    ) -> Result<(), CacheError> {
        if self.cached_this_process.contains(fingerprint) {
            return Err(CacheError::DuplicateFingerprint(fingerprint.to_string()));
        }
        metadata.created_at = now;
        metadata.last_used_at = now;

        if !config.offline_cache {
            metadata.size = payload.len() as u64;
            self.in_memory.insert(
                fingerprint.to_string(),
                InMemoryEntry { arch, metadata, payload: payload.to_vec() },
            );
            self.cached_this_process.insert(fingerprint.to_string());
            return Ok(());
        }

        let compressed = format::compress_payload(payload)?;
        metadata.size = compressed.len() as u64;
        format::write_entry(&self.entry_path(fingerprint), arch, &metadata, &compressed)?;
        self.metadata.insert(fingerprint.to_string(), metadata);
        self.cached_this_process.insert(fingerprint.to_string());
        Ok(())
    }

    /// Persists `qdcache.tcb`. Observable cache writes only happen once
    /// this returns (§5 ordering guarantee (c)).
    pub fn dump(&self) -> Result<(), CacheError> {
        self.metadata.dump(&self.metadata_path())?;
        Ok(())
    }

    /// Applies `policy` against the current metadata, deleting the chosen
    /// entries' `.qdc` files and persisting the updated metadata.
    pub fn evict(&mut self, policy: &dyn EvictionPolicy, budget_bytes: u64) -> Result<Vec<String>, CacheError> {
        let victims = policy.select_for_eviction(&self.metadata.entries, budget_bytes);
        for fingerprint in &victims {
            self.metadata.remove(fingerprint);
            let _ = std::fs::remove_file(self.entry_path(fingerprint));
            self.cached_this_process.remove(fingerprint);
        }
        if !victims.is_empty() {
            self.dump()?;
        }
        Ok(victims)
    }

    pub fn total_size(&self) -> u64 {
        self.metadata.total_size
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.metadata.entries.contains_key(fingerprint) || self.in_memory.contains_key(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eviction::LruEviction;

    fn meta() -> CacheEntryMetadata {
        CacheEntryMetadata {
            size: 0,
            args_type: vec!["i64".to_string()],
            rets: vec![],
            ret_type: "void".to_string(),
            created_at: 0,
            last_used_at: 0,
        }
    }

    #[test]
    fn cache_then_lookup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = CacheManager::open(dir.path()).unwrap();
        let config = CompileConfig::default();
        mgr.cache_kernel("fp1", Arch::Cpu, meta(), b"payload bytes", 100, &config)
            .unwrap();
        mgr.dump().unwrap();

        let (arch, _meta, payload) = mgr.lookup("fp1", 200).unwrap();
        assert_eq!(arch, Arch::Cpu);
        assert_eq!(payload, b"payload bytes");
    }

    #[test]
    fn duplicate_fingerprint_in_one_process_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = CacheManager::open(dir.path()).unwrap();
        let config = CompileConfig::default();
        mgr.cache_kernel("fp1", Arch::Cpu, meta(), b"a", 1, &config).unwrap();
        let err = mgr.cache_kernel("fp1", Arch::Cpu, meta(), b"b", 2, &config).unwrap_err();
        assert!(matches!(err, CacheError::DuplicateFingerprint(_)));
    }

    #[test]
    fn reopening_loads_prior_entries_and_sweeps_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let config = CompileConfig::default();
        {
            let mut mgr = CacheManager::open(dir.path()).unwrap();
            mgr.cache_kernel("fp1", Arch::Cpu, meta(), b"a", 1, &config).unwrap();
            mgr.dump().unwrap();
        }
        // an orphan .qdc with no metadata entry
        let orphan_dir = dir.path().join("kernel_compilation_manager");
        std::fs::write(orphan_dir.join("orphan.qdc"), b"junk").unwrap();

        let mgr = CacheManager::open(dir.path()).unwrap();
        assert!(mgr.contains("fp1"));
        assert!(!orphan_dir.join("orphan.qdc").exists());
    }

    #[test]
    fn evict_removes_entries_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = CacheManager::open(dir.path()).unwrap();
        let config = CompileConfig::default();
        let mut m1 = meta();
        m1.last_used_at = 1;
        mgr.cache_kernel("old", Arch::Cpu, m1, b"aaaaaaaaaa", 1, &config).unwrap();
        let mut m2 = meta();
        m2.last_used_at = 2;
        mgr.cache_kernel("new", Arch::Cpu, m2, b"bbbbbbbbbb", 2, &config).unwrap();

        let victims = mgr.evict(&LruEviction, 10).unwrap();
        assert_eq!(victims, vec!["old".to_string()]);
        assert!(!mgr.contains("old"));
        assert!(mgr.contains("new"));
    }

    #[test]
    fn offline_cache_disabled_entry_is_not_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = CacheManager::open(dir.path()).unwrap();
        let mut config = CompileConfig::default();
        config.offline_cache = false;
        mgr.cache_kernel("fp1", Arch::Cpu, meta(), b"payload bytes", 100, &config)
            .unwrap();

        let entry_path = dir.path().join("kernel_compilation_manager").join("fp1.qdc");
        assert!(!entry_path.exists());
        assert!(!mgr.metadata.entries.contains_key("fp1"));

        let (arch, _meta, payload) = mgr.lookup("fp1", 200).unwrap();
        assert_eq!(arch, Arch::Cpu);
        assert_eq!(payload, b"payload bytes");
    }

    #[test]
    fn offline_cache_disabled_entry_does_not_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CompileConfig::default();
        config.offline_cache = false;
        {
            let mut mgr = CacheManager::open(dir.path()).unwrap();
            mgr.cache_kernel("fp1", Arch::Cpu, meta(), b"a", 1, &config).unwrap();
            mgr.dump().unwrap();
            assert!(mgr.contains("fp1"));
        }
        let mgr = CacheManager::open(dir.path()).unwrap();
        assert!(!mgr.contains("fp1"));
    }
}
