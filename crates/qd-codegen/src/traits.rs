//! The backend trait boundary (§4.6 `KernelCodeGen`/§1 scope boundary):
//! `qd-core` drives compilation through this trait without knowing which
//! concrete backend it holds, exactly the shape
//! `original_source/quadrants/codegen/kernel_compiler.h`'s `KernelCompiler`
//! interface takes (one `compile(offloaded, ...)` entry point per backend).

use qd_ir::KernelIr;
use qd_offload::OffloadedTask;

use crate::error::CodegenError;
use crate::CompiledKernelData;

/// A backend capable of lowering one offloaded task into dispatchable
/// compiled data. `task_index` is the task's position in the kernel's
/// task list, used only to derive a stable entry-point symbol name.
pub trait KernelCodeGen {
    fn compile_task(
        &self,
        ir: &KernelIr,
        task: &OffloadedTask,
        task_index: u32,
    ) -> Result<CompiledKernelData, CodegenError>;
}
