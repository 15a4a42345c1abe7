//! Dead-instruction elimination: removes statements with no users and no
//! side effects. Runs at the end of each sub-pipeline stage (§4.3).

use qd_ir::{DelayedIRModifier, KernelIr};

use crate::outcome::PassOutcome;

/// Remove every statement that (a) has no remaining users and (b) has no
/// side effect, repeating until a fixpoint (erasing one dead statement can
/// make its operands dead in turn).
pub fn die(ir: &mut KernelIr) -> PassOutcome {
    let mut any_modified = false;
    loop {
        let mut modifier = DelayedIRModifier::new();
        for stmt in ir.stmt_ids() {
            let kind = &ir.stmt(stmt).kind;
            if kind.has_side_effect() {
                continue;
            }
            if kind.is_container() {
                // Containers are only dead if unreachable; that is handled
                // by cfg_optimization, not this local sweep.
                continue;
            }
            if ir.users_of(stmt).is_empty() {
                modifier.erase(stmt);
            }
        }
        if modifier.is_empty() {
            break;
        }
        let changed = modifier.apply(ir);
        any_modified |= changed;
        if !changed {
            break;
        }
    }
    PassOutcome::modified(any_modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_ir::{BinaryOp, StmtKind};

    #[test]
    fn removes_unused_pure_statement() {
        let mut ir = KernelIr::new();
        let a = ir.push_stmt(ir.root_block, StmtKind::ConstI64(1));
        let b = ir.push_stmt(ir.root_block, StmtKind::ConstI64(2));
        // Unused: nothing reads the sum.
        ir.push_stmt(
            ir.root_block,
            StmtKind::BinaryOp {
                op: BinaryOp::Add,
                lhs: a,
                rhs: b,
            },
        );
        let outcome = die(&mut ir);
        assert_eq!(outcome, PassOutcome::Modified);
        assert_eq!(ir.block(ir.root_block).len(), 0);
    }

    #[test]
    fn keeps_side_effecting_store() {
        let mut ir = KernelIr::new();
        let ptr = ir.push_stmt(
            ir.root_block,
            StmtKind::AllocaLocal {
                ty: qd_ir::DataType::I64,
            },
        );
        let v = ir.push_stmt(ir.root_block, StmtKind::ConstI64(5));
        ir.push_stmt(
            ir.root_block,
            StmtKind::LocalStore {
                alloca: ptr,
                value: v,
            },
        );
        let outcome = die(&mut ir);
        assert_eq!(outcome, PassOutcome::Unchanged);
        assert_eq!(ir.block(ir.root_block).len(), 3);
    }
}
