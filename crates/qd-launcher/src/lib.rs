//! Kernel launcher: turns a compiled kernel's dispatch sequence into device
//! invocations (§4.8). This crate owns argument marshaling, scratch
//! allocation, and the `RuntimeContext` every task body is handed; it never
//! touches a physical device itself — that's the `Device`/`JitSession`
//! traits' job, grounded on `quadrants::program::kernel_launcher.h` and the
//! CUDA-graph-aware subclass in `quadrants::runtime::cuda::kernel_launcher.h`.

mod args;
mod backend;
mod context;
mod device;
mod error;
mod graph;
mod launcher;
mod scratch;

pub use args::{resolve_args, LaunchArg, ScalarValue, ARG_SLOT_SIZE};
pub use backend::default_host_arch;
pub use context::RuntimeContext;
pub use device::{Device, DeviceAddress, DeviceAllocation, JitSession, ModuleHandle, StreamHandle, TaskFnPtr};
pub use error::LauncherError;
pub use graph::{CachedGraph, GraphCache, GraphHandle};
pub use launcher::{Dispatch, KernelLauncher, LaunchOptions};
pub use scratch::allocate_scratch;
