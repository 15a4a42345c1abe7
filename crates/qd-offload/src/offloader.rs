//! Splits one kernel body into an ordered list of [`OffloadedTask`]s (§4.4),
//! grounded on the reference `Offloader`/`compile_to_offloads` pass that
//! turns a kernel's top-level statement list into `OffloadedStmt`s.
//!
//! A run of ordinary (non-container) top-level statements becomes a single
//! `serial` task. A top-level `RangeFor` with constant bounds becomes a
//! `range_for` task whose body is the loop body (the loop itself is
//! consumed). A top-level `StructFor` over a node that
//! `requires_list_gen()` is preceded by a `list_gen` task and, if the node
//! `is_gc_eligible()`, followed by a trailing `gc` task — the same
//! prologue/epilogue shape `compile_quadrants_functions.cpp` drives around
//! `irpass::offload`.

use qd_ir::{KernelIr, SNodeId, SNodeTree, StmtId, StmtKind};
use rustc_hash::FxHashMap;

use crate::task::{OffloadedTask, OffloadedTaskKind};

/// Default dispatch width before clamping to a target SNode's element
/// count; matches the reference compiler's default CUDA block size.
const DEFAULT_BLOCK_DIM: u32 = 256;

fn clamp_block_dim(tree: &SNodeTree, snode: SNodeId) -> u32 {
    tree.nodes
        .get(snode)
        .map(|n| DEFAULT_BLOCK_DIM.min(n.max_num_elements()))
        .unwrap_or(DEFAULT_BLOCK_DIM)
}

/// A top-level statement with constant bounds is a candidate for
/// `range_for`; this extracts `(begin, end)` only when both bound
/// statements are literal `ConstI64`s so the task can carry them directly
/// rather than needing a dynamic-bounds relay.
fn const_range_bounds(ir: &KernelIr, begin: StmtId, end: StmtId) -> Option<(i64, i64)> {
    let b = match &ir.stmt(begin).kind {
        StmtKind::ConstI64(v) => *v,
        _ => return None,
    };
    let e = match &ir.stmt(end).kind {
        StmtKind::ConstI64(v) => *v,
        _ => return None,
    };
    Some((b, e))
}

/// Splits `ir`'s root block into offloaded tasks. Leaves every task's body
/// referencing statements still owned by `ir` — no statements are copied,
/// only reparented (existing `BlockId`s are adopted as task bodies
/// directly).
///
/// An empty kernel (no top-level statements at all) produces a single
/// empty `serial` task rather than zero tasks, so every compiled kernel
/// dispatches at least one unit of work.
pub fn offload(ir: &mut KernelIr, tree: &SNodeTree) -> Vec<OffloadedTask> {
    let mut tasks = Vec::new();
    let top_level: Vec<StmtId> = ir.block(ir.root_block).stmts.clone();

    if top_level.is_empty() {
        let empty_body = ir.new_block(None);
        tasks.push(OffloadedTask::new(OffloadedTaskKind::Serial, empty_body));
        relay_cross_task_values(ir, &mut tasks);
        return tasks;
    }

    let mut serial_run: Vec<StmtId> = Vec::new();
    let flush_serial = |ir: &mut KernelIr, run: &mut Vec<StmtId>, tasks: &mut Vec<OffloadedTask>| {
        if run.is_empty() {
            return;
        }
        let body = ir.new_block(None);
        for &s in run.iter() {
            ir.block_mut(body).stmts.push(s);
            ir.stmt_mut(s).parent = Some(body);
        }
        tasks.push(OffloadedTask::new(OffloadedTaskKind::Serial, body));
        run.clear();
    };

    for stmt in top_level {
        match ir.stmt(stmt).kind.clone() {
            StmtKind::RangeFor {
                begin,
                end,
                reversed,
                body,
            } => {
                flush_serial(ir, &mut serial_run, &mut tasks);
                let mut task = OffloadedTask::new(OffloadedTaskKind::RangeFor, body);
                if let Some((b, e)) = const_range_bounds(ir, begin, end) {
                    task.begin = Some(b);
                    task.end = Some(e);
                }
                task.reversed = reversed;
                tasks.push(task);
            }
            StmtKind::StructFor { snode, body } => {
                flush_serial(ir, &mut serial_run, &mut tasks);
                let requires_list_gen = tree
                    .nodes
                    .get(snode)
                    .map(|n| n.tag.requires_list_gen())
                    .unwrap_or(false);
                if requires_list_gen {
                    let list_gen_body = ir.new_block(None);
                    let mut list_gen = OffloadedTask::new(OffloadedTaskKind::ListGen, list_gen_body);
                    list_gen.target_snode = Some(snode);
                    tasks.push(list_gen);
                }
                let mut task = OffloadedTask::new(OffloadedTaskKind::StructFor, body);
                task.target_snode = Some(snode);
                task.block_dim = clamp_block_dim(tree, snode);
                tasks.push(task);

                let gc_eligible = tree
                    .nodes
                    .get(snode)
                    .map(|n| n.tag.is_gc_eligible())
                    .unwrap_or(false);
                if gc_eligible {
                    let gc_body = ir.new_block(None);
                    let mut gc = OffloadedTask::new(OffloadedTaskKind::Gc, gc_body);
                    gc.target_snode = Some(snode);
                    tasks.push(gc);
                }
            }
            _ => serial_run.push(stmt),
        }
    }
    flush_serial(ir, &mut serial_run, &mut tasks);

    relay_cross_task_values(ir, &mut tasks);
    tasks
}

/// Is `kind` cheap and side-effect-free enough to clone at the point of
/// use instead of threading through a real thread-local-storage slot?
fn is_rematerializable(kind: &StmtKind) -> bool {
    matches!(
        kind,
        StmtKind::ConstI64(_)
            | StmtKind::ConstF64(_)
            | StmtKind::BinaryOp { .. }
            | StmtKind::UnaryOp { .. }
            | StmtKind::Cast { .. }
    )
}

/// Gives each task its own local copy of any pure value it reads that was
/// originally defined by an earlier task's statement list, instead of
/// leaving a cross-block reference into another task's body. This is a
/// narrower substitute for the reference runtime's thread-local-storage
/// staging buffer: it covers constant/arithmetic expressions (the common
/// case once loop bounds are already lifted into task fields), not an
/// arbitrary value produced by a `GlobalLoad` in one task and consumed by
/// another, which would need a real cross-task memory relay this IR does
/// not model.
fn relay_cross_task_values(ir: &mut KernelIr, tasks: &mut [OffloadedTask]) {
    for task in tasks.iter_mut() {
        let mut local: std::collections::HashSet<StmtId> = std::collections::HashSet::new();
        let mut preorder = Vec::new();
        ir.walk_preorder(task.body, &mut preorder);
        local.extend(preorder.iter().copied());
        // Fixed once per task: every rematerialized clone is inserted
        // immediately before this statement, so clones accumulate in
        // dependency order ahead of the task's original first statement.
        let anchor = preorder.first().copied();

        let mut cache: FxHashMap<StmtId, StmtId> = FxHashMap::default();
        for &stmt in &preorder {
            let operands = ir.stmt(stmt).kind.operands();
            for operand in operands {
                if local.contains(&operand) {
                    continue;
                }
                if let Some(clone) = rematerialize(ir, task.body, anchor, operand, &mut cache) {
                    ir.replace_operand_in_stmt(stmt, operand, clone);
                }
            }
        }
    }
}

/// Clones `original` (and, recursively, any of its own external operands)
/// immediately before `anchor` (or appends to `block` if it has none yet),
/// memoizing in `cache`. Returns `None` if `original`'s kind cannot be
/// safely rematerialized, in which case the caller leaves the cross-block
/// reference as-is.
fn rematerialize(
    ir: &mut KernelIr,
    block: qd_ir::BlockId,
    anchor: Option<StmtId>,
    original: StmtId,
    cache: &mut FxHashMap<StmtId, StmtId>,
) -> Option<StmtId> {
    if let Some(&clone) = cache.get(&original) {
        return Some(clone);
    }
    let kind = ir.stmt(original).kind.clone();
    if !is_rematerializable(&kind) {
        return None;
    }

    let mut new_kind = kind.clone();
    for operand in kind.operands() {
        let replacement = rematerialize(ir, block, anchor, operand, cache)?;
        new_kind.replace_operand(operand, replacement);
    }

    let clone_id = match anchor {
        Some(a) => ir.insert_before(a, new_kind),
        None => ir.push_stmt(block, new_kind),
    };
    cache.insert(original, clone_id);
    Some(clone_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_ir::{BinaryOp, DataType, SNode, SNodeTag};

    fn dense_leaf_tree() -> (SNodeTree, SNodeId) {
        let mut tree = SNodeTree::new(0);
        let root = tree.root.unwrap();
        let leaf = tree.push_child(
            root,
            SNode {
                tag: SNodeTag::Place,
                parent: Some(root),
                children: Vec::new(),
                extractors: Vec::new(),
                data_type: Some(DataType::F32),
                tree_id: 0,
                is_path_all_dense: true,
                num_active_indices: 1,
                shape: vec![64],
                block_local_annotated: false,
            },
        );
        (tree, leaf)
    }

    #[test]
    fn empty_kernel_yields_single_serial_task() {
        let (tree, _) = dense_leaf_tree();
        let mut ir = KernelIr::new();
        let tasks = offload(&mut ir, &tree);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, OffloadedTaskKind::Serial);
        assert!(ir.block(tasks[0].body).is_empty());
    }

    #[test]
    fn range_for_with_const_bounds_becomes_one_task() {
        let (tree, _) = dense_leaf_tree();
        let mut ir = KernelIr::new();
        let begin = ir.push_stmt(ir.root_block, StmtKind::ConstI64(0));
        let end = ir.push_stmt(ir.root_block, StmtKind::ConstI64(16));
        let body = ir.new_block(None);
        ir.push_stmt(body, StmtKind::ConstI64(1));
        ir.push_stmt(
            ir.root_block,
            StmtKind::RangeFor {
                begin,
                end,
                reversed: false,
                body,
            },
        );
        let tasks = offload(&mut ir, &tree);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, OffloadedTaskKind::RangeFor);
        assert_eq!(tasks[0].begin, Some(0));
        assert_eq!(tasks[0].end, Some(16));
    }

    #[test]
    fn dynamic_struct_for_gets_list_gen_and_gc_tasks() {
        let mut tree = SNodeTree::new(0);
        let root = tree.root.unwrap();
        let dynamic = tree.push_child(
            root,
            SNode {
                tag: SNodeTag::Dynamic,
                parent: Some(root),
                children: Vec::new(),
                extractors: Vec::new(),
                data_type: None,
                tree_id: 0,
                is_path_all_dense: false,
                num_active_indices: 1,
                shape: vec![128],
                block_local_annotated: false,
            },
        );
        let mut ir = KernelIr::new();
        let body = ir.new_block(None);
        ir.push_stmt(
            ir.root_block,
            StmtKind::StructFor {
                snode: dynamic,
                body,
            },
        );
        let tasks = offload(&mut ir, &tree);
        assert_eq!(
            tasks.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                OffloadedTaskKind::ListGen,
                OffloadedTaskKind::StructFor,
                OffloadedTaskKind::Gc,
            ]
        );
        assert_eq!(tasks[1].block_dim, 128);
    }

    #[test]
    fn serial_run_is_split_out_around_loops() {
        let (tree, _) = dense_leaf_tree();
        let mut ir = KernelIr::new();
        ir.push_stmt(ir.root_block, StmtKind::ConstI64(1));
        let begin = ir.push_stmt(ir.root_block, StmtKind::ConstI64(0));
        let end = ir.push_stmt(ir.root_block, StmtKind::ConstI64(4));
        let body = ir.new_block(None);
        ir.push_stmt(
            ir.root_block,
            StmtKind::RangeFor {
                begin,
                end,
                reversed: false,
                body,
            },
        );
        ir.push_stmt(ir.root_block, StmtKind::ConstI64(2));

        let tasks = offload(&mut ir, &tree);
        assert_eq!(
            tasks.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                OffloadedTaskKind::Serial,
                OffloadedTaskKind::RangeFor,
                OffloadedTaskKind::Serial,
            ]
        );
    }

    #[test]
    fn cross_task_pure_value_is_rematerialized_not_shared() {
        let (tree, _) = dense_leaf_tree();
        let mut ir = KernelIr::new();
        let bound_src = ir.push_stmt(ir.root_block, StmtKind::ConstI64(10));
        let scale = ir.push_stmt(
            ir.root_block,
            StmtKind::BinaryOp {
                op: BinaryOp::Mul,
                lhs: bound_src,
                rhs: bound_src,
            },
        );
        // A dynamic range (non-const end) so the RangeFor body keeps a
        // real external reference to `scale` for the relay pass to cover.
        let dyn_begin = ir.push_stmt(ir.root_block, StmtKind::ConstI64(0));
        let body = ir.new_block(None);
        ir.push_stmt(
            body,
            StmtKind::BinaryOp {
                op: BinaryOp::Add,
                lhs: scale,
                rhs: scale,
            },
        );
        ir.push_stmt(
            ir.root_block,
            StmtKind::RangeFor {
                begin: dyn_begin,
                end: scale,
                reversed: false,
                body,
            },
        );
        let tasks = offload(&mut ir, &tree);
        let range_task = tasks
            .iter()
            .find(|t| t.kind == OffloadedTaskKind::RangeFor)
            .unwrap();
        let mut preorder = Vec::new();
        ir.walk_preorder(range_task.body, &mut preorder);
        // the add no longer reaches across into the root block's `scale`
        for stmt in &preorder {
            for operand in ir.stmt(*stmt).kind.operands() {
                assert!(
                    preorder.contains(&operand),
                    "operand {operand:?} of {stmt:?} still points outside the task body"
                );
            }
        }
    }
}
