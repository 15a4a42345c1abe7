use thiserror::Error;

use crate::format::FormatError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache entry is corrupt: {0}")]
    Format(#[from] FormatError),
    /// Caching the same fingerprint twice within one process (§7: "fatal;
    /// indicates caller should have looked up first").
    #[error("fingerprint {0} was already cached this process")]
    DuplicateFingerprint(String),
}
