//! `offloaded_tasks_to_executable`: drives a [`KernelCodeGen`] backend over
//! every task `compile_to_offloads` produced, in emission order (§5
//! ordering guarantee (b): "OffloadedTasks within a kernel are executed in
//! emission order").

use qd_codegen::{CompiledKernelData, KernelCodeGen};
use qd_ir::KernelIr;
use qd_offload::OffloadedTask;

use crate::error::CompileError;

/// Compiles `tasks` in order against `ir` using `codegen`. A backend
/// rejecting one task (e.g. nested control flow `CpuCodeGen` can't lower)
/// aborts the whole kernel rather than emitting a partially-compiled
/// dispatch sequence.
pub fn offloaded_tasks_to_executable(
    ir: &KernelIr,
    tasks: &[OffloadedTask],
    codegen: &dyn KernelCodeGen,
) -> Result<Vec<CompiledKernelData>, CompileError> {
    let mut compiled = Vec::with_capacity(tasks.len());
    for (index, task) in tasks.iter().enumerate() {
        let data = codegen.compile_task(ir, task, index as u32)?;
        compiled.push(data);
    }
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::compile_to_offloads;
    use qd_codegen::CpuCodeGen;
    use qd_ir::{BinaryOp, CompileConfig, SNodeTree, StmtKind};

    #[test]
    fn serial_kernel_compiles_through_both_entry_points() {
        let mut ir = KernelIr::new();
        let a = ir.push_stmt(ir.root_block, StmtKind::ConstI64(2));
        let b = ir.push_stmt(ir.root_block, StmtKind::ConstI64(3));
        ir.push_stmt(ir.root_block, StmtKind::BinaryOp { op: BinaryOp::Add, lhs: a, rhs: b });
        let tree = SNodeTree::new(0);
        let config = CompileConfig::default();

        let tasks = compile_to_offloads(&mut ir, &tree, &config).unwrap();
        let compiled = offloaded_tasks_to_executable(&ir, &tasks, &CpuCodeGen::default()).unwrap();
        assert_eq!(compiled.len(), tasks.len());
        assert_eq!(compiled[0].entry_symbol, "qd_task_0");
    }
}
