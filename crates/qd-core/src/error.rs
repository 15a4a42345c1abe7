//! `CompileError`: the fatal-failure categories of §7, modeled the way
//! `wasmtime-jit`/`cranelift-jit` use `thiserror` for their top-level error
//! enums. The cooperative `IRModified`/`Restart` re-entry signal is
//! deliberately *not* a variant here — it is `qd_pass::PassOutcome::Restart`,
//! consumed entirely inside the pipeline's restart loops.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    /// A pass's precondition did not hold even after the bounded number of
    /// sub-pipeline restarts this orchestrator allows — a state the
    /// cooperative restart protocol was supposed to prevent, so continuing
    /// would silently compile against a broken invariant.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A backend rejected a construct it can't lower (§4.6's documented
    /// CPU-backend scope limits: nested control flow inside a task body).
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// A `Device`/`JitSession` call failed; §7 marks this fatal, not
    /// recoverable by retry.
    #[error("device error: {0}")]
    DeviceError(#[from] qd_launcher::LauncherError),

    /// Caching the same fingerprint twice in one process (§7, surfaced
    /// through `qd_cache::CacheError::DuplicateFingerprint`).
    #[error("cache collision: {0}")]
    CacheCollision(String),
}

impl From<qd_codegen::CodegenError> for CompileError {
    fn from(e: qd_codegen::CodegenError) -> Self {
        CompileError::UnsupportedConstruct(e.to_string())
    }
}

impl From<qd_cache::CacheError> for CompileError {
    fn from(e: qd_cache::CacheError) -> Self {
        match e {
            qd_cache::CacheError::DuplicateFingerprint(fp) => CompileError::CacheCollision(fp),
            other => CompileError::InvariantViolation(other.to_string()),
        }
    }
}
