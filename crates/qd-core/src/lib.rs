//! The facade crate an embedder actually depends on: configuration types,
//! `CompileError`, and the two pipeline entry points named in §4.3 —
//! `compile_to_offloads` and `offloaded_tasks_to_executable` — plus a
//! content-hash fingerprint helper for wiring in `qd-cache`. Everything
//! else (`qd-ir`'s data model, `qd-pass`'s individual passes, `qd-offload`'s
//! offloader, `qd-codegen`'s backend trait, `qd-cache`'s on-disk cache,
//! `qd-launcher`'s dispatch) is reached through its own crate; this one
//! only assembles them into the two documented calls.

mod config;
mod error;
mod executable;
mod fingerprint;
mod pipeline;

pub use config::{Arch, CompileConfig, DeviceCapability, DeviceCapabilityConfig};
pub use error::CompileError;
pub use executable::offloaded_tasks_to_executable;
pub use fingerprint::fingerprint_kernel;
pub use pipeline::compile_to_offloads;

pub use qd_cache::{CacheEntryMetadata, CacheManager, EvictionPolicy, LruEviction, SizeBoundEviction};
pub use qd_codegen::{CodegenError, CompiledKernelData, CpuCodeGen, KernelCodeGen};
pub use qd_ir::KernelIr;
pub use qd_launcher::{Device, JitSession, KernelLauncher, LaunchArg, LauncherError, RuntimeContext};
pub use qd_offload::{OffloadedTask, OffloadedTaskKind};
