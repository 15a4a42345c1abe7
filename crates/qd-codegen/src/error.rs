//! Errors a backend's `compile_task` may report. Distinct from
//! `qd-core::CompileError`: this is the narrower, backend-local failure
//! mode, which `qd-core` wraps into its own `DeviceError`/
//! `UnsupportedConstruct` variants at the facade boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("operand {0} was not yet lowered when its user was reached")]
    UnresolvedOperand(String),
    #[error("construct not supported by this backend: {0}")]
    UnsupportedConstruct(String),
}
