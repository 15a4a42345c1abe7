use thiserror::Error;

/// Device-driver-layer failures are fatal per §7 ("Device driver error
/// (allocate/copy/launch) → fatal"); `qd-core` surfaces them as
/// `CompileError::DeviceError` rather than retrying.
#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("device allocation of {0} bytes failed")]
    AllocationFailed(usize),
    #[error("device copy failed: {0}")]
    CopyFailed(String),
    #[error("module load failed: {0}")]
    ModuleLoadFailed(String),
    #[error("symbol {0} not found in loaded module")]
    SymbolNotFound(String),
    #[error("device stream synchronization failed: {0}")]
    SynchronizationFailed(String),
    #[error("task invocation failed: {0}")]
    InvocationFailed(String),
    #[error("{0} is not supported by this device")]
    Unsupported(&'static str),
}
