//! `KernelLauncher`: the orchestrator that turns one kernel's compiled
//! tasks plus a caller's arguments into device dispatches and a result
//! buffer (§4.8). Grounded on
//! `quadrants::program::kernel_launcher.h`'s
//! `KernelLauncher::launch_kernel(const CompiledKernelData&, LaunchContextBuilder&)`,
//! generalized from "one task" to the task sequence `qd-offload` produces
//! and parameterized over the `Device`/`JitSession` collaborators instead of
//! a concrete CUDA/LLVM backend.

use qd_codegen::CompiledKernelData;
use qd_offload::{OffloadedTask, OffloadedTaskKind};

use crate::args::{resolve_args, LaunchArg, ARG_SLOT_SIZE};
use crate::context::RuntimeContext;
use crate::device::{Device, DeviceAddress, DeviceAllocation, JitSession, ModuleHandle};
use crate::error::LauncherError;
use crate::graph::{CachedGraph, GraphCache};
use crate::scratch::allocate_scratch;

/// One dispatch unit as the launcher needs it: the offloader's task (for
/// loop bounds/kind) paired with its compiled form (for the entry symbol
/// and scratch sizes).
pub struct Dispatch<'a> {
    pub task: &'a OffloadedTask,
    pub compiled: &'a CompiledKernelData,
}

/// Whether a kernel invocation should try the CUDA-graph-style fast path.
/// Off by default: graph replay is only a net win across repeated launches
/// with unchanged dispatch shape, so an explicit opt-in avoids paying
/// capture overhead on a kernel only ever launched once.
#[derive(Copy, Clone, Debug, Default)]
pub struct LaunchOptions {
    pub use_graph: bool,
    /// Identifies this kernel+launch-dimension combination in the graph
    /// cache; required when `use_graph` is set.
    pub graph_key: Option<i32>,
    /// Index into the launch's `args` slice of the int32 continuation flag
    /// for a graph-while loop (§4.8 "graph-while"): the dispatch sequence
    /// re-executes while this flag reads non-zero after a pass, the flag
    /// itself mutated by the kernel body.
    pub graph_while_arg_id: Option<usize>,
}

pub struct KernelLauncher<D, J> {
    device: D,
    jit: J,
    graphs: GraphCache,
}

impl<D: Device, J: JitSession> KernelLauncher<D, J> {
    pub fn new(device: D, jit: J) -> Self {
        KernelLauncher {
            device,
            jit,
            graphs: GraphCache::new(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Runs a kernel's dispatch sequence to completion, returning the
    /// decoded result buffer. `result_buffer_size` is the caller's
    /// expectation of the kernel's return payload size — `qd-core` derives
    /// it from the compiled signature's `rets`, which this crate does not
    /// itself model.
    pub fn launch_kernel(
        &mut self,
        module: ModuleHandle,
        dispatches: &[Dispatch<'_>],
        args: &[LaunchArg],
        result_buffer_size: usize,
    ) -> Result<Vec<u8>, LauncherError> {
        let arg_bytes = resolve_args(args);
        let arg_alloc = self.device.allocate(arg_bytes.len().max(1))?;
        self.device.copy_to_device(arg_alloc.address, &arg_bytes)?;
        let result_alloc = self.device.allocate(result_buffer_size.max(1))?;

        let outcome = self.dispatch_all(module, dispatches, arg_alloc, result_alloc);

        let mut out = vec![0u8; result_buffer_size];
        let copy_result = self.device.copy_from_device(&mut out, result_alloc.address);

        let _ = self.device.free(arg_alloc);
        let _ = self.device.free(result_alloc);

        outcome?;
        copy_result?;
        Ok(out)
    }

    /// Runs `dispatches` to completion the way [`Self::launch_kernel`]
    /// does, but wraps the sequence in a host-side do-while that
    /// re-dispatches it while the flag argument at `graph_while_arg_id`
    /// reads non-zero after a pass (§4.8 "graph-while", non-graph path).
    /// Returns the final result buffer plus the number of passes run.
    pub fn launch_kernel_while(
        &mut self,
        module: ModuleHandle,
        dispatches: &[Dispatch<'_>],
        args: &[LaunchArg],
        result_buffer_size: usize,
        graph_while_arg_id: usize,
    ) -> Result<(Vec<u8>, u32), LauncherError> {
        let arg_bytes = resolve_args(args);
        let arg_alloc = self.device.allocate(arg_bytes.len().max(1))?;
        self.device.copy_to_device(arg_alloc.address, &arg_bytes)?;
        let result_alloc = self.device.allocate(result_buffer_size.max(1))?;
        let flag_addr = flag_address(arg_alloc.address, graph_while_arg_id);

        let outcome = self.run_do_while(module, dispatches, arg_alloc, result_alloc, flag_addr);

        let mut out = vec![0u8; result_buffer_size];
        let copy_result = self.device.copy_from_device(&mut out, result_alloc.address);

        let _ = self.device.free(arg_alloc);
        let _ = self.device.free(result_alloc);

        let iterations = outcome?;
        copy_result?;
        Ok((out, iterations))
    }

    /// One host-side do-while pass loop: dispatches the full sequence at
    /// least once, then keeps re-dispatching while the flag at `flag_addr`
    /// reads non-zero, reading it back from the device after every pass.
    fn run_do_while(
        &self,
        module: ModuleHandle,
        dispatches: &[Dispatch<'_>],
        arg_alloc: DeviceAllocation,
        result_alloc: DeviceAllocation,
        flag_addr: DeviceAddress,
    ) -> Result<u32, LauncherError> {
        let mut iterations = 0u32;
        loop {
            self.dispatch_all(module, dispatches, arg_alloc, result_alloc)?;
            iterations += 1;
            let mut flag_bytes = [0u8; 4];
            self.device.copy_from_device(&mut flag_bytes, flag_addr)?;
            if i32::from_le_bytes(flag_bytes) == 0 {
                break;
            }
        }
        Ok(iterations)
    }

    fn dispatch_all(
        &self,
        module: ModuleHandle,
        dispatches: &[Dispatch<'_>],
        arg_alloc: DeviceAllocation,
        result_alloc: DeviceAllocation,
    ) -> Result<(), LauncherError> {
        for dispatch in dispatches {
            self.dispatch_one(module, dispatch, arg_alloc, result_alloc)?;
        }
        self.device.synchronize()
    }

    fn dispatch_one(
        &self,
        module: ModuleHandle,
        dispatch: &Dispatch<'_>,
        arg_alloc: DeviceAllocation,
        result_alloc: DeviceAllocation,
    ) -> Result<(), LauncherError> {
        let scratch = allocate_scratch(&self.device, dispatch.compiled)?;
        let scratch_addr = scratch.map(|s| s.address).unwrap_or(DeviceAddress(0));
        let ctx = RuntimeContext::new(self.device.runtime_handle(), arg_alloc.address, result_alloc.address, scratch_addr);
        let entry = self.jit.lookup(module, &dispatch.compiled.entry_symbol)?;

        let result = match dispatch.task.kind {
            OffloadedTaskKind::RangeFor => self.dispatch_range_for(entry, &ctx, scratch_addr, dispatch.task),
            _ => self.device.invoke_task(entry, &ctx, scratch_addr, 0),
        };

        if let Some(alloc) = scratch {
            let _ = self.device.free(alloc);
        }
        result
    }

    fn dispatch_range_for(
        &self,
        entry: crate::device::TaskFnPtr,
        ctx: &RuntimeContext,
        scratch_addr: DeviceAddress,
        task: &OffloadedTask,
    ) -> Result<(), LauncherError> {
        let begin = task.begin.unwrap_or(0);
        let end = task.end.unwrap_or(0);
        let indices: Box<dyn Iterator<Item = i64>> = if task.reversed {
            Box::new((begin..end).rev())
        } else {
            Box::new(begin..end)
        };
        for i in indices {
            self.device.invoke_task(entry, ctx, scratch_addr, i as i32)?;
        }
        Ok(())
    }

    /// Launches via the CUDA-graph-style fast path: captures once per
    /// `options.graph_key` and replays thereafter, refreshing only the
    /// persistent argument buffer's contents between replays. Falls back
    /// to [`Self::launch_kernel`] when the device doesn't support capture.
    pub fn launch_kernel_with_graph(
        &mut self,
        module: ModuleHandle,
        dispatches: &[Dispatch<'_>],
        args: &[LaunchArg],
        result_buffer_size: usize,
        options: LaunchOptions,
    ) -> Result<Vec<u8>, LauncherError> {
        if !options.use_graph || !self.device.supports_graph_capture() {
            return self.launch_kernel(module, dispatches, args, result_buffer_size);
        }
        let arg_bytes = resolve_args(args);
        let stream = self.jit.get_compute_stream()?;
        let cached = self.get_or_capture_graph(module, dispatches, options, &arg_bytes, result_buffer_size, stream)?;
        self.replay_graph(&cached, &arg_bytes, result_buffer_size, stream)
    }

    /// Graph-path counterpart to [`Self::launch_kernel_while`]: captures
    /// (or reuses) the graph for `options.graph_key`, then re-executes it
    /// while the flag argument at `graph_while_arg_id` reads non-zero after
    /// a replay (§4.8 "graph-while"). The abstract [`Device`] trait has no
    /// device-side conditional-node primitive, so the re-execution is
    /// host-driven exactly like [`Self::launch_kernel_while`]'s do-while,
    /// just replaying the captured graph instead of re-dispatching each
    /// task individually.
    pub fn launch_kernel_with_graph_while(
        &mut self,
        module: ModuleHandle,
        dispatches: &[Dispatch<'_>],
        args: &[LaunchArg],
        result_buffer_size: usize,
        options: LaunchOptions,
        graph_while_arg_id: usize,
    ) -> Result<(Vec<u8>, u32), LauncherError> {
        if !options.use_graph || !self.device.supports_graph_capture() {
            return self.launch_kernel_while(module, dispatches, args, result_buffer_size, graph_while_arg_id);
        }
        let arg_bytes = resolve_args(args);
        let stream = self.jit.get_compute_stream()?;
        let cached = self.get_or_capture_graph(module, dispatches, options, &arg_bytes, result_buffer_size, stream)?;
        let flag_addr = flag_address(cached.persistent_arg_buffer.address, graph_while_arg_id);

        self.device.copy_to_device(cached.persistent_arg_buffer.address, &arg_bytes)?;
        let mut iterations = 0u32;
        loop {
            self.device.launch_graph(cached.graph, stream)?;
            self.device.synchronize()?;
            iterations += 1;
            let mut flag_bytes = [0u8; 4];
            self.device.copy_from_device(&mut flag_bytes, flag_addr)?;
            if i32::from_le_bytes(flag_bytes) == 0 {
                break;
            }
        }
        let mut out = vec![0u8; result_buffer_size];
        self.device.copy_from_device(&mut out, cached.persistent_result_buffer.address)?;
        Ok((out, iterations))
    }

    fn get_or_capture_graph(
        &mut self,
        module: ModuleHandle,
        dispatches: &[Dispatch<'_>],
        options: LaunchOptions,
        arg_bytes: &[u8],
        result_buffer_size: usize,
        stream: crate::device::StreamHandle,
    ) -> Result<CachedGraph, LauncherError> {
        let key = options.graph_key.ok_or(LauncherError::Unsupported("graph_key required when use_graph is set"))?;
        if let Some(cached) = self.graphs.get(key).copied() {
            return Ok(cached);
        }
        let arg_alloc = self.device.allocate(arg_bytes.len().max(1))?;
        let result_alloc = self.device.allocate(result_buffer_size.max(1))?;
        let device = &self.device;
        let jit = &self.jit;
        self.graphs.capture(device, stream, key, arg_alloc, result_alloc, || {
            for dispatch in dispatches {
                let scratch = allocate_scratch(device, dispatch.compiled)?;
                let scratch_addr = scratch.map(|s| s.address).unwrap_or(DeviceAddress(0));
                let ctx = RuntimeContext::new(device.runtime_handle(), arg_alloc.address, result_alloc.address, scratch_addr);
                let entry = jit.lookup(module, &dispatch.compiled.entry_symbol)?;
                device.invoke_task(entry, &ctx, scratch_addr, 0)?;
            }
            Ok(())
        })
    }

    fn replay_graph(
        &self,
        cached: &CachedGraph,
        arg_bytes: &[u8],
        result_buffer_size: usize,
        stream: crate::device::StreamHandle,
    ) -> Result<Vec<u8>, LauncherError> {
        self.device.copy_to_device(cached.persistent_arg_buffer.address, arg_bytes)?;
        self.device.launch_graph(cached.graph, stream)?;
        self.device.synchronize()?;
        let mut out = vec![0u8; result_buffer_size];
        self.device.copy_from_device(&mut out, cached.persistent_result_buffer.address)?;
        Ok(out)
    }

    pub fn invalidate_graph(&mut self, key: i32) {
        self.graphs.invalidate(key);
    }
}

/// Address of the `arg_id`-th argument slot within an argument buffer
/// based at `arg_buffer` — the graph-while flag lives in one of these
/// fixed-width slots (§4.8 "graph-while", `args.rs`'s `ARG_SLOT_SIZE` layout).
fn flag_address(arg_buffer: DeviceAddress, arg_id: usize) -> DeviceAddress {
    DeviceAddress(arg_buffer.0 + (arg_id * ARG_SLOT_SIZE) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ScalarValue;
    use crate::device::{StreamHandle, TaskFnPtr};
    use crate::graph::GraphHandle;
    use qd_entity::EntityRef;
    use qd_ir::{BlockId, Arch};
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct RecordingDevice {
        invocations: RefCell<Vec<i32>>,
        graph_capable: bool,
        next_addr: AtomicI32,
    }

    impl RecordingDevice {
        fn new(graph_capable: bool) -> Self {
            RecordingDevice {
                invocations: RefCell::new(vec![]),
                graph_capable,
                next_addr: AtomicI32::new(1),
            }
        }
    }

    impl Device for RecordingDevice {
        fn runtime_handle(&self) -> DeviceAddress {
            DeviceAddress(0)
        }
        fn allocate(&self, size: usize) -> Result<DeviceAllocation, LauncherError> {
            let addr = self.next_addr.fetch_add(1, Ordering::SeqCst);
            Ok(DeviceAllocation { address: DeviceAddress(addr as u64), size })
        }
        fn free(&self, _allocation: DeviceAllocation) -> Result<(), LauncherError> {
            Ok(())
        }
        fn copy_to_device(&self, _dst: DeviceAddress, _src: &[u8]) -> Result<(), LauncherError> {
            Ok(())
        }
        fn copy_from_device(&self, dst: &mut [u8], _src: DeviceAddress) -> Result<(), LauncherError> {
            dst.fill(0);
            Ok(())
        }
        fn invoke_task(
            &self,
            _entry: TaskFnPtr,
            _ctx: &RuntimeContext,
            _context_storage: DeviceAddress,
            loop_index: i32,
        ) -> Result<(), LauncherError> {
            self.invocations.borrow_mut().push(loop_index);
            Ok(())
        }
        fn synchronize(&self) -> Result<(), LauncherError> {
            Ok(())
        }
        fn supports_graph_capture(&self) -> bool {
            self.graph_capable
        }
        fn begin_graph_capture(&self, _stream: StreamHandle) -> Result<(), LauncherError> {
            Ok(())
        }
        fn end_graph_capture(&self, _stream: StreamHandle) -> Result<GraphHandle, LauncherError> {
            Ok(GraphHandle(0))
        }
        fn launch_graph(&self, _graph: GraphHandle, _stream: StreamHandle) -> Result<(), LauncherError> {
            Ok(())
        }
    }

    struct FakeJit;
    impl JitSession for FakeJit {
        fn load_module(&mut self, _payload: &[u8]) -> Result<ModuleHandle, LauncherError> {
            Ok(ModuleHandle(0))
        }
        fn lookup(&self, _module: ModuleHandle, _symbol: &str) -> Result<TaskFnPtr, LauncherError> {
            Ok(TaskFnPtr(0))
        }
        fn get_compute_stream(&self) -> Result<StreamHandle, LauncherError> {
            Ok(StreamHandle(0))
        }
    }

    fn compiled(entry: &str) -> CompiledKernelData {
        CompiledKernelData {
            entry_symbol: entry.to_string(),
            arch: Arch::Cpu,
            task_kind: OffloadedTaskKind::Serial,
            lir: qd_codegen::LirFunction::new(),
            tls_size: 0,
            bls_size: 0,
        }
    }

    #[test]
    fn serial_task_is_invoked_once_with_loop_index_zero() {
        let mut launcher = KernelLauncher::new(RecordingDevice::new(false), FakeJit);
        let task = OffloadedTask::new(OffloadedTaskKind::Serial, BlockId::new(0));
        let compiled = compiled("qd_task_0");
        let dispatch = Dispatch { task: &task, compiled: &compiled };

        let out = launcher
            .launch_kernel(ModuleHandle(0), &[dispatch], &[LaunchArg::Scalar(ScalarValue::I64(1))], 8)
            .unwrap();
        assert_eq!(out.len(), 8);
        assert_eq!(*launcher.device().invocations.borrow(), vec![0]);
    }

    #[test]
    fn range_for_task_is_invoked_once_per_iteration() {
        let mut launcher = KernelLauncher::new(RecordingDevice::new(false), FakeJit);
        let mut task = OffloadedTask::new(OffloadedTaskKind::RangeFor, BlockId::new(0));
        task.begin = Some(2);
        task.end = Some(5);
        let compiled = compiled("qd_task_0");
        let dispatch = Dispatch { task: &task, compiled: &compiled };

        launcher.launch_kernel(ModuleHandle(0), &[dispatch], &[], 0).unwrap();
        assert_eq!(*launcher.device().invocations.borrow(), vec![2, 3, 4]);
    }

    #[test]
    fn reversed_range_for_iterates_backwards() {
        let mut launcher = KernelLauncher::new(RecordingDevice::new(false), FakeJit);
        let mut task = OffloadedTask::new(OffloadedTaskKind::RangeFor, BlockId::new(0));
        task.begin = Some(0);
        task.end = Some(3);
        task.reversed = true;
        let compiled = compiled("qd_task_0");
        let dispatch = Dispatch { task: &task, compiled: &compiled };

        launcher.launch_kernel(ModuleHandle(0), &[dispatch], &[], 0).unwrap();
        assert_eq!(*launcher.device().invocations.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn graph_fast_path_falls_back_without_capture_support() {
        let mut launcher = KernelLauncher::new(RecordingDevice::new(false), FakeJit);
        let task = OffloadedTask::new(OffloadedTaskKind::Serial, BlockId::new(0));
        let compiled = compiled("qd_task_0");
        let dispatch = Dispatch { task: &task, compiled: &compiled };

        let options = LaunchOptions { use_graph: true, graph_key: Some(1), ..LaunchOptions::default() };
        let out = launcher
            .launch_kernel_with_graph(ModuleHandle(0), &[dispatch], &[], 4, options)
            .unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(*launcher.device().invocations.borrow(), vec![0]);
    }

    #[test]
    fn graph_fast_path_captures_once_then_replays() {
        let mut launcher = KernelLauncher::new(RecordingDevice::new(true), FakeJit);
        let task = OffloadedTask::new(OffloadedTaskKind::Serial, BlockId::new(0));
        let compiled = compiled("qd_task_0");
        let dispatch = Dispatch { task: &task, compiled: &compiled };
        let options = LaunchOptions { use_graph: true, graph_key: Some(7), ..LaunchOptions::default() };

        launcher
            .launch_kernel_with_graph(ModuleHandle(0), &[dispatch], &[], 4, options)
            .unwrap();
        // capture recorded one invocation
        assert_eq!(*launcher.device().invocations.borrow(), vec![0]);

        launcher
            .launch_kernel_with_graph(ModuleHandle(0), &[dispatch], &[], 4, options)
            .unwrap();
        // the replay goes through `launch_graph`, not another `invoke_task`
        assert_eq!(*launcher.device().invocations.borrow(), vec![0]);
        assert!(launcher.graphs.get(7).is_some());
    }

    /// A `Device` with real address-indexed memory, whose `invoke_task`
    /// decrements the first 4 bytes of the argument buffer by one — a
    /// stand-in for a compiled body that decrements a loop-continuation
    /// flag each pass, needed to exercise the graph-while host do-while.
    struct FlagDecrementingDevice {
        memory: RefCell<std::collections::HashMap<u64, Vec<u8>>>,
        graph_capable: bool,
        next_addr: AtomicI32,
        invocation_count: RefCell<u32>,
        /// The argument-buffer address last seen by `invoke_task`, i.e. the
        /// one baked into the graph at capture time; `launch_graph` replays
        /// against this address since a captured graph's commands already
        /// point at it.
        captured_arg_buffer: RefCell<Option<DeviceAddress>>,
    }

    impl FlagDecrementingDevice {
        fn new(graph_capable: bool) -> Self {
            FlagDecrementingDevice {
                memory: RefCell::new(std::collections::HashMap::new()),
                graph_capable,
                next_addr: AtomicI32::new(1),
                invocation_count: RefCell::new(0),
                captured_arg_buffer: RefCell::new(None),
            }
        }
    }

    impl Device for FlagDecrementingDevice {
        fn runtime_handle(&self) -> DeviceAddress {
            DeviceAddress(0)
        }
        fn allocate(&self, size: usize) -> Result<DeviceAllocation, LauncherError> {
            let addr = self.next_addr.fetch_add(1, Ordering::SeqCst) as u64;
            self.memory.borrow_mut().insert(addr, vec![0u8; size]);
            Ok(DeviceAllocation { address: DeviceAddress(addr), size })
        }
        fn free(&self, allocation: DeviceAllocation) -> Result<(), LauncherError> {
            self.memory.borrow_mut().remove(&allocation.address.0);
            Ok(())
        }
        fn copy_to_device(&self, dst: DeviceAddress, src: &[u8]) -> Result<(), LauncherError> {
            self.memory.borrow_mut().insert(dst.0, src.to_vec());
            Ok(())
        }
        fn copy_from_device(&self, dst: &mut [u8], src: DeviceAddress) -> Result<(), LauncherError> {
            let mem = self.memory.borrow();
            let bytes = mem.get(&src.0).expect("read from unallocated address");
            dst.copy_from_slice(&bytes[..dst.len()]);
            Ok(())
        }
        fn invoke_task(
            &self,
            _entry: TaskFnPtr,
            ctx: &RuntimeContext,
            _context_storage: DeviceAddress,
            _loop_index: i32,
        ) -> Result<(), LauncherError> {
            *self.invocation_count.borrow_mut() += 1;
            *self.captured_arg_buffer.borrow_mut() = Some(ctx.arg_buffer);
            let mut mem = self.memory.borrow_mut();
            let arg_buf = mem.get_mut(&ctx.arg_buffer.0).expect("arg buffer not allocated");
            let flag = i32::from_le_bytes(arg_buf[0..4].try_into().unwrap());
            let decremented = if flag > 0 { flag - 1 } else { 0 };
            arg_buf[0..4].copy_from_slice(&decremented.to_le_bytes());
            Ok(())
        }
        fn synchronize(&self) -> Result<(), LauncherError> {
            Ok(())
        }
        fn supports_graph_capture(&self) -> bool {
            self.graph_capable
        }
        fn begin_graph_capture(&self, _stream: StreamHandle) -> Result<(), LauncherError> {
            Ok(())
        }
        fn end_graph_capture(&self, _stream: StreamHandle) -> Result<GraphHandle, LauncherError> {
            Ok(GraphHandle(0))
        }
        fn launch_graph(&self, graph: GraphHandle, stream: StreamHandle) -> Result<(), LauncherError> {
            let _ = (graph, stream);
            let arg_buffer = self.captured_arg_buffer.borrow().expect("graph replayed before capture");
            self.invoke_task(TaskFnPtr(0), &RuntimeContext::new(DeviceAddress(0), arg_buffer, DeviceAddress(0), DeviceAddress(0)), DeviceAddress(0), 0)
        }
    }

    #[test]
    fn host_do_while_runs_once_per_initial_flag_value() {
        let mut launcher = KernelLauncher::new(FlagDecrementingDevice::new(false), FakeJit);
        let task = OffloadedTask::new(OffloadedTaskKind::Serial, BlockId::new(0));
        let compiled = compiled("qd_task_0");
        let dispatch = Dispatch { task: &task, compiled: &compiled };

        let (out, iterations) = launcher
            .launch_kernel_while(ModuleHandle(0), &[dispatch], &[LaunchArg::Scalar(ScalarValue::I32(4))], 4, 0)
            .unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(iterations, 4);
    }

    #[test]
    fn host_do_while_runs_at_least_once_when_flag_starts_at_zero() {
        let mut launcher = KernelLauncher::new(FlagDecrementingDevice::new(false), FakeJit);
        let task = OffloadedTask::new(OffloadedTaskKind::Serial, BlockId::new(0));
        let compiled = compiled("qd_task_0");
        let dispatch = Dispatch { task: &task, compiled: &compiled };

        // a do-while always runs its body once before checking the flag,
        // so a flag that starts at 0 and is decremented to -1 still counts
        // as one pass here (matching do-while semantics, not while semantics).
        let (_out, iterations) = launcher
            .launch_kernel_while(ModuleHandle(0), &[dispatch], &[LaunchArg::Scalar(ScalarValue::I32(0))], 4, 0)
            .unwrap();
        assert_eq!(iterations, 1);
    }

    #[test]
    fn graph_while_replays_until_flag_zero_matching_initial_value() {
        let mut launcher = KernelLauncher::new(FlagDecrementingDevice::new(true), FakeJit);
        let task = OffloadedTask::new(OffloadedTaskKind::Serial, BlockId::new(0));
        let compiled = compiled("qd_task_0");
        let dispatch = Dispatch { task: &task, compiled: &compiled };
        let options = LaunchOptions { use_graph: true, graph_key: Some(42), ..LaunchOptions::default() };

        let (out, iterations) = launcher
            .launch_kernel_with_graph_while(
                ModuleHandle(0),
                &[dispatch],
                &[LaunchArg::Scalar(ScalarValue::I32(3))],
                4,
                options,
                0,
            )
            .unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(iterations, 3);
    }

    #[test]
    fn graph_while_falls_back_to_host_do_while_without_capture_support() {
        let mut launcher = KernelLauncher::new(FlagDecrementingDevice::new(false), FakeJit);
        let task = OffloadedTask::new(OffloadedTaskKind::Serial, BlockId::new(0));
        let compiled = compiled("qd_task_0");
        let dispatch = Dispatch { task: &task, compiled: &compiled };
        let options = LaunchOptions { use_graph: true, graph_key: Some(42), ..LaunchOptions::default() };

        let (_out, iterations) = launcher
            .launch_kernel_with_graph_while(
                ModuleHandle(0),
                &[dispatch],
                &[LaunchArg::Scalar(ScalarValue::I32(2))],
                4,
                options,
                0,
            )
            .unwrap();
        assert_eq!(iterations, 2);
    }
}
