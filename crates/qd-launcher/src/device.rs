//! The `Device`/`JitSession` collaborator traits (§4.8): the seam between
//! `qd-launcher`'s dispatch logic and a physical backend. Grounded on
//! `quadrants::program::kernel_launcher.h`'s `KernelLauncher` abstract class
//! and `llvm::JITModule`'s `lookup`-by-symbol-name interface; no physical
//! driver is implemented here, only the trait boundary a real backend would
//! plug into.

use crate::error::LauncherError;

/// An opaque device-side address. `qd-launcher` treats this as a handle it
/// passes back to the `Device` that produced it — never a pointer it
/// dereferences.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct DeviceAddress(pub u64);

/// A live allocation: the address to use plus the size that was granted, so
/// callers can bounds-check a copy without tracking allocations themselves.
#[derive(Copy, Clone, Debug)]
pub struct DeviceAllocation {
    pub address: DeviceAddress,
    pub size: usize,
}

/// Handle to a module loaded into a [`JitSession`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ModuleHandle(pub u32);

/// Handle to a resolved entry-point symbol, opaque to everything but the
/// `Device` that resolved it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct TaskFnPtr(pub u64);

/// Handle to a device command queue / stream.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct StreamHandle(pub u32);

/// Resolves compiled modules to callable symbols. Both methods are required
/// with no default body: a `JitSession` that can't resolve its own compute
/// stream or symbols isn't usable by the launcher, so there is nothing
/// sensible to default to (mirrors `llvm::JITModule::lookup` and
/// `get_compute_stream`, which this crate's predecessor always implements
/// per-backend rather than inheriting a shared default).
pub trait JitSession {
    /// Loads a backend-compiled module's bytes, returning a handle usable
    /// with `lookup`.
    fn load_module(&mut self, payload: &[u8]) -> Result<ModuleHandle, LauncherError>;

    /// Resolves `symbol` (an `OffloadedTask`'s `CompiledKernelData::entry_symbol`)
    /// within `module` to a callable function pointer.
    fn lookup(&self, module: ModuleHandle, symbol: &str) -> Result<TaskFnPtr, LauncherError>;

    /// The command stream/queue this session dispatches work on.
    fn get_compute_stream(&self) -> Result<StreamHandle, LauncherError>;
}

/// Physical-memory and dispatch operations a backend must provide. No
/// physical driver backs this trait here — it is the seam a CPU, CUDA,
/// Vulkan... implementation plugs into.
pub trait Device {
    /// Handle to backend-global runtime state, threaded into every
    /// [`crate::context::RuntimeContext`] this device builds.
    fn runtime_handle(&self) -> DeviceAddress;

    fn allocate(&self, size: usize) -> Result<DeviceAllocation, LauncherError>;

    fn free(&self, allocation: DeviceAllocation) -> Result<(), LauncherError>;

    fn copy_to_device(&self, dst: DeviceAddress, src: &[u8]) -> Result<(), LauncherError>;

    fn copy_from_device(&self, dst: &mut [u8], src: DeviceAddress) -> Result<(), LauncherError>;

    /// Invokes one compiled task body, whose ABI is
    /// `(runtime_context*, context_storage*, loop_index) -> void` (§4.6).
    /// `loop_index` is `0` for `Serial`/`StructFor`/... tasks and the
    /// current iteration for a `RangeFor` task.
    fn invoke_task(
        &self,
        entry: TaskFnPtr,
        ctx: &crate::context::RuntimeContext,
        context_storage: DeviceAddress,
        loop_index: i32,
    ) -> Result<(), LauncherError>;

    fn synchronize(&self) -> Result<(), LauncherError>;

    /// Whether this device can capture and replay a CUDA-graph-style fast
    /// path (§4.8 "CUDA-graph fast path"). Devices that can't support it
    /// (the default) leave `begin_graph_capture`/`end_graph_capture` to
    /// return `LauncherError::Unsupported`.
    fn supports_graph_capture(&self) -> bool {
        false
    }

    fn begin_graph_capture(&self, _stream: StreamHandle) -> Result<(), LauncherError> {
        Err(LauncherError::Unsupported("graph capture"))
    }

    fn end_graph_capture(&self, _stream: StreamHandle) -> Result<crate::graph::GraphHandle, LauncherError> {
        Err(LauncherError::Unsupported("graph capture"))
    }

    fn launch_graph(&self, _graph: crate::graph::GraphHandle, _stream: StreamHandle) -> Result<(), LauncherError> {
        Err(LauncherError::Unsupported("graph capture"))
    }
}
