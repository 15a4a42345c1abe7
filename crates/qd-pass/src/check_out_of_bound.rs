//! `check_out_of_bound`: inserts a runtime bounds-check call in front of
//! every SNode field access, active only when `config.debug` is set (§4.3).
//! Must run before `lower_access` flattens the per-axis indices away.
//!
//! Grounded on the reference `CheckOutOfBoundPass`, which inserts a runtime
//! assertion call ahead of a `GlobalPtrStmt`/`ExternalPtrStmt` carrying the
//! offending index and the node's declared shape.

use qd_ir::{CompileConfig, KernelIr, SNodeTree, StmtId, StmtKind};
use smallvec::SmallVec;

use crate::outcome::PassOutcome;

const BOUNDS_CHECK_SYMBOL: &str = "quadrants_runtime_check_out_of_bound";

/// No-op unless `config.debug`. Otherwise, for every `GlobalPtr` whose
/// target is a leaf of `tree`, insert an `ExternalCall` to the runtime
/// bounds-check symbol ahead of it, carrying each index plus the
/// corresponding shape bound.
pub fn check_out_of_bound(ir: &mut KernelIr, config: &CompileConfig, tree: &SNodeTree) -> PassOutcome {
    if !config.debug {
        return PassOutcome::Unchanged;
    }
    let mut changed = false;
    let candidates: Vec<StmtId> = ir
        .stmt_ids()
        .filter(|&s| matches!(ir.stmt(s).kind, StmtKind::GlobalPtr { .. }))
        .collect();

    for stmt in candidates {
        let (snode, indices) = match &ir.stmt(stmt).kind {
            StmtKind::GlobalPtr { snode, indices } => (*snode, indices.clone()),
            _ => unreachable!(),
        };
        if indices.is_empty() {
            continue;
        }
        let Some(node) = tree.nodes.get(snode) else {
            continue;
        };
        if node.shape.len() != indices.len() {
            continue;
        }

        let mut args: SmallVec<[StmtId; 4]> = SmallVec::new();
        for (index, bound) in indices.iter().zip(node.shape.iter()) {
            args.push(*index);
            let bound_const = ir.insert_before(stmt, StmtKind::ConstI64(*bound as i64));
            args.push(bound_const);
        }
        ir.insert_before(
            stmt,
            StmtKind::ExternalCall {
                symbol: BOUNDS_CHECK_SYMBOL.to_string(),
                args,
                has_result: false,
            },
        );
        changed = true;
    }

    PassOutcome::modified(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_ir::{Arch, DataType, SNode, SNodeTag};

    fn one_d_tree() -> (SNodeTree, qd_ir::SNodeId) {
        let mut tree = SNodeTree::new(0);
        let root = tree.root.unwrap();
        let leaf = tree.push_child(
            root,
            SNode {
                tag: SNodeTag::Place,
                parent: Some(root),
                children: Vec::new(),
                extractors: Vec::new(),
                data_type: Some(DataType::I32),
                tree_id: 0,
                is_path_all_dense: true,
                num_active_indices: 1,
                shape: vec![16],
                block_local_annotated: false,
            },
        );
        (tree, leaf)
    }

    #[test]
    fn inserts_call_only_in_debug_mode() {
        let (tree, leaf) = one_d_tree();
        let mut ir = KernelIr::new();
        let i = ir.push_stmt(ir.root_block, StmtKind::ConstI64(3));
        ir.push_stmt(
            ir.root_block,
            StmtKind::GlobalPtr {
                snode: leaf,
                indices: smallvec::smallvec![i],
            },
        );
        let release_config = CompileConfig {
            arch: Arch::Cpu,
            debug: false,
            ..Default::default()
        };
        assert_eq!(
            check_out_of_bound(&mut ir, &release_config, &tree),
            PassOutcome::Unchanged
        );

        let debug_config = CompileConfig {
            debug: true,
            ..release_config
        };
        let outcome = check_out_of_bound(&mut ir, &debug_config, &tree);
        assert_eq!(outcome, PassOutcome::Modified);
        assert!(ir.stmt_ids().any(|s| matches!(
            &ir.stmt(s).kind,
            StmtKind::ExternalCall { symbol, .. } if symbol == BOUNDS_CHECK_SYMBOL
        )));
    }
}
