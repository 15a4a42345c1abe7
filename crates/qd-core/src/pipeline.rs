//! `compile_to_offloads`: the canonical six-stage pipeline of §4.3,
//! assembled from `qd-pass`'s individual passes and `qd-offload`'s
//! offloader/BLS pass. Grounded on `cranelift-codegen::Context`'s role as
//! the struct that owns a `Function` and drives its passes in a fixed
//! order, generalized here to the cooperative `PassOutcome::Restart`
//! re-entry protocol instead of `cranelift`'s short-circuiting
//! `CodegenResult`.

use qd_ir::{CompileConfig, KernelIr, SNodeTree};
use qd_offload::OffloadedTask;
use qd_pass::{
    cfg_optimization, check_out_of_bound, constant_fold, die, lower_access, remove_loop_unique,
    remove_range_assumption, simplify, PassOutcome,
};

use crate::error::CompileError;

/// Bounds the cooperative restart loop within one sub-pipeline stage. The
/// protocol in §4.3/§7 names no limit, but an orchestrator that restarts
/// forever on a pass pair that keeps invalidating each other's
/// preconditions is a bug, not a valid run — `InvariantViolation` surfaces
/// that instead of hanging.
const MAX_STAGE_RESTARTS: u32 = 16;

/// Runs `steps` in order; if one reports `Restart`, reruns the whole
/// sequence from the top, up to [`MAX_STAGE_RESTARTS`] times. Returns
/// whether anything in the stage ever reported `Modified`/`Restart`.
fn run_stage(stage_name: &str, ir: &mut KernelIr, steps: &[fn(&mut KernelIr) -> PassOutcome]) -> Result<bool, CompileError> {
    let mut ever_modified = false;
    for attempt in 0..=MAX_STAGE_RESTARTS {
        let mut restarted = false;
        for step in steps {
            match step(ir) {
                PassOutcome::Unchanged => {}
                PassOutcome::Modified => ever_modified = true,
                PassOutcome::Restart => {
                    ever_modified = true;
                    restarted = true;
                    break;
                }
            }
        }
        if !restarted {
            return Ok(ever_modified);
        }
        log::debug!("{stage_name} restarting sub-pipeline (attempt {attempt})");
    }
    Err(CompileError::InvariantViolation(format!(
        "{stage_name} did not converge after {MAX_STAGE_RESTARTS} restarts"
    )))
}

/// Stage 1: `simplify → constant_fold → remove_loop_unique →
/// remove_range_assumption → simplify`.
fn stage1_normalize(ir: &mut KernelIr) -> Result<(), CompileError> {
    let steps: [fn(&mut KernelIr) -> PassOutcome; 5] =
        [simplify, constant_fold, remove_loop_unique, remove_range_assumption, simplify];
    run_stage("stage 1 (normalize)", ir, &steps)?;
    Ok(())
}

/// Stage 2: `die → offload (exactly once) → simplify`. `offload` is not
/// itself restartable (§4.4 "runs exactly once"); only the `die` and
/// trailing `simplify` calls participate in the restart protocol.
fn stage2_offload(ir: &mut KernelIr, tree: &SNodeTree) -> Result<Vec<OffloadedTask>, CompileError> {
    run_stage("stage 2 (pre-offload die)", ir, &[die])?;
    let tasks = qd_offload::offload(ir, tree);
    run_stage("stage 2 (post-offload simplify)", ir, &[simplify])?;
    Ok(tasks)
}

/// Stage 3: `cfg_optimization` (pre-`lower_access`).
fn stage3_cfg_pre(ir: &mut KernelIr, config: &CompileConfig) -> Result<(), CompileError> {
    for attempt in 0..=MAX_STAGE_RESTARTS {
        match cfg_optimization(ir, config, "pre_lower_access") {
            PassOutcome::Restart => {
                log::debug!("stage 3 (cfg pre-lower_access) restarting (attempt {attempt})");
                continue;
            }
            _ => return Ok(()),
        }
    }
    Err(CompileError::InvariantViolation(
        "stage 3 (cfg pre-lower_access) did not converge".to_string(),
    ))
}

/// Runs the debug-only bounds-check insertion. Not one of the six numbered
/// stages, but the table's ordering note ("must run before `lower_access`
/// flattens the per-axis indices away") pins it between stage 3 and 4.
fn stage3b_check_out_of_bound(ir: &mut KernelIr, tree: &SNodeTree, config: &CompileConfig) -> Result<(), CompileError> {
    for attempt in 0..=MAX_STAGE_RESTARTS {
        match check_out_of_bound(ir, config, tree) {
            PassOutcome::Restart => {
                log::debug!("check_out_of_bound restarting (attempt {attempt})");
                continue;
            }
            _ => return Ok(()),
        }
    }
    Err(CompileError::InvariantViolation("check_out_of_bound did not converge".to_string()))
}

/// Stage 4: `lower_access → simplify → cfg_optimization` (post-`lower_access`).
fn stage4_lower_access(ir: &mut KernelIr, tree: &SNodeTree, config: &CompileConfig) -> Result<(), CompileError> {
    for attempt in 0..=MAX_STAGE_RESTARTS {
        let mut restarted = false;
        if lower_access(ir, tree) == PassOutcome::Restart {
            restarted = true;
        }
        if !restarted && simplify(ir) == PassOutcome::Restart {
            restarted = true;
        }
        if !restarted && cfg_optimization(ir, config, "post_lower_access") == PassOutcome::Restart {
            restarted = true;
        }
        if !restarted {
            return Ok(());
        }
        log::debug!("stage 4 (lower_access) restarting sub-pipeline (attempt {attempt})");
    }
    Err(CompileError::InvariantViolation("stage 4 (lower_access) did not converge".to_string()))
}

/// Stage 5: `make_block_local / make_mesh_thread_local → simplify`.
///
/// `insert_scratch_pad` (§4.3's "creates block-local scratch pads required
/// by `make_block_local`") is not a separate call here: `qd_offload::
/// make_block_local` already performs the scratch-pad layout and
/// prologue/epilogue insertion inline (its `BLSAnalyzer`-equivalent
/// window analysis and the buffer allocation are one pass in this
/// architecture, not two cooperating ones).
fn stage5_block_local(ir: &mut KernelIr, tree: &SNodeTree, tasks: &mut [OffloadedTask]) -> Result<(), CompileError> {
    qd_offload::make_block_local(ir, tree, tasks);
    qd_offload::make_mesh_thread_local(ir, tasks);
    run_stage("stage 5 (post-block-local simplify)", ir, &[simplify])?;
    Ok(())
}

/// Stage 6: final `die` sweep.
fn stage6_die(ir: &mut KernelIr) -> Result<(), CompileError> {
    run_stage("stage 6 (die)", ir, &[die])?;
    Ok(())
}

/// Runs the canonical six-stage pipeline over `ir`, producing the flat
/// `OffloadedTask` sequence `offloaded_tasks_to_executable` consumes.
/// `check_out_of_bound` (debug-only) runs once, ahead of `lower_access`,
/// per §4.3's ordering note ("must run before lower_access flattens the
/// per-axis indices away").
pub fn compile_to_offloads(ir: &mut KernelIr, tree: &SNodeTree, config: &CompileConfig) -> Result<Vec<OffloadedTask>, CompileError> {
    stage1_normalize(ir)?;
    let mut tasks = stage2_offload(ir, tree)?;
    stage3_cfg_pre(ir, config)?;
    stage3b_check_out_of_bound(ir, tree, config)?;
    stage4_lower_access(ir, tree, config)?;
    stage5_block_local(ir, tree, &mut tasks)?;
    stage6_die(ir)?;
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_ir::{BinaryOp, StmtKind};

    fn const_kernel() -> (KernelIr, SNodeTree) {
        let mut ir = KernelIr::new();
        let a = ir.push_stmt(ir.root_block, StmtKind::ConstI64(2));
        let b = ir.push_stmt(ir.root_block, StmtKind::ConstI64(3));
        ir.push_stmt(
            ir.root_block,
            StmtKind::BinaryOp { op: BinaryOp::Add, lhs: a, rhs: b },
        );
        (ir, SNodeTree::new(0))
    }

    #[test]
    fn empty_kernel_becomes_a_single_serial_task() {
        let (mut ir, tree) = const_kernel();
        let config = CompileConfig::default();
        let tasks = compile_to_offloads(&mut ir, &tree, &config).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, qd_offload::OffloadedTaskKind::Serial);
    }

    #[test]
    fn constant_fold_runs_inside_stage1() {
        let (mut ir, tree) = const_kernel();
        let config = CompileConfig::default();
        compile_to_offloads(&mut ir, &tree, &config).unwrap();
        // the BinaryOp's operands were both constants; constant_fold in
        // stage 1 should have reduced it to a single ConstI64(5).
        let has_binary_op = ir
            .stmt_ids()
            .any(|s| matches!(ir.stmt(s).kind, StmtKind::BinaryOp { .. }));
        assert!(!has_binary_op);
    }

    #[test]
    fn debug_config_runs_check_out_of_bound_without_erroring() {
        let (mut ir, tree) = const_kernel();
        let mut config = CompileConfig::default();
        config.debug = true;
        assert!(compile_to_offloads(&mut ir, &tree, &config).is_ok());
    }
}
