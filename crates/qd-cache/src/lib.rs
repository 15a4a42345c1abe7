//! Content-addressed on-disk compilation cache (§4.7): a `.qdc` entry per
//! fingerprint plus an authoritative `qdcache.tcb` metadata map, with
//! pluggable LRU/size-bound eviction. Grounded on `wasmtime-internal-
//! cache`'s dependency stack (`serde`, `sha2`, `zstd`, `directories-next`,
//! `postcard`) and atomic-write discipline.

mod error;
mod eviction;
mod format;
mod manager;
mod metadata;
mod root;

pub use error::CacheError;
pub use eviction::{EvictionPolicy, LruEviction, SizeBoundEviction};
pub use format::{CacheEntry, CacheEntryMetadata, FormatError};
pub use manager::CacheManager;
pub use metadata::{MetadataFile, MetadataVersion, METADATA_FILE_NAME};
pub use root::{default_cache_root, kernel_compilation_manager_dir};
