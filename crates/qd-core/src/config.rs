//! Re-exports of the configuration types every stage of the pipeline reads
//! (§3 `CompileConfig`/`DeviceCapabilityConfig`). They live in `qd-ir`
//! because the IR-level passes themselves need them; `qd-core` re-exports
//! them so an embedder only has to depend on this one facade crate.

pub use qd_ir::{Arch, CompileConfig, DeviceCapability, DeviceCapabilityConfig};
