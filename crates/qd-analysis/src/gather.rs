//! Pure gather-family queries over a `KernelIr`. None of these mutate the
//! tree; each is a plain function `IR -> Result`.

use qd_ir::{KernelIr, SNodeId, StmtId, StmtKind};
use rustc_hash::{FxHashMap, FxHashSet};

/// Total statement count including container statements themselves (but
/// not double-counting a container's body, which `walk_preorder` already
/// descends into once).
pub fn count_statements(ir: &KernelIr) -> usize {
    let mut out = Vec::new();
    ir.walk_preorder(ir.root_block, &mut out);
    out.len()
}

/// Returns every statement satisfying `pred`, stopping descent into a
/// container the first time `pred` returns `true` for it — the exact
/// semantics the transform passes rely on (e.g. "find range_for loops, but
/// don't look inside nested ones that already matched").
pub fn gather_statements(ir: &KernelIr, pred: impl Fn(&KernelIr, StmtId) -> bool) -> Vec<StmtId> {
    let mut out = Vec::new();
    gather_rec(ir, ir.root_block, &pred, &mut out);
    out
}

fn gather_rec(
    ir: &KernelIr,
    block: qd_ir::BlockId,
    pred: &impl Fn(&KernelIr, StmtId) -> bool,
    out: &mut Vec<StmtId>,
) {
    for &stmt in &ir.block(block).stmts.clone() {
        let matched = pred(ir, stmt);
        if matched {
            out.push(stmt);
            continue;
        }
        match &ir.stmt(stmt).kind {
            StmtKind::RangeFor { body, .. } | StmtKind::StructFor { body, .. } => {
                gather_rec(ir, *body, pred, out)
            }
            StmtKind::WhileLoop { body } => gather_rec(ir, *body, pred, out),
            StmtKind::IfStmt {
                then_block,
                else_block,
                ..
            } => {
                gather_rec(ir, *then_block, pred, out);
                if let Some(e) = else_block {
                    gather_rec(ir, *e, pred, out);
                }
            }
            _ => {}
        }
    }
}

/// The set of SNodes referenced by any `Deactivate` SNode operation.
pub fn gather_deactivations(ir: &KernelIr) -> FxHashSet<SNodeId> {
    let mut out = FxHashSet::default();
    for stmt in gather_statements(ir, |ir, s| {
        matches!(
            ir.stmt(s).kind,
            StmtKind::SNodeOp {
                kind: qd_ir::SNodeOpKind::Deactivate,
                ..
            }
        )
    }) {
        if let StmtKind::SNodeOp { snode, .. } = &ir.stmt(stmt).kind {
            out.insert(*snode);
        }
    }
    out
}

/// Inspects every global load/store/atomic, chasing the pointer-derivation
/// chain back to the originating SNode, and partitions the referenced
/// SNodes into reads and writes.
pub fn gather_snode_read_writes(ir: &KernelIr) -> (FxHashSet<SNodeId>, FxHashSet<SNodeId>) {
    let mut reads = FxHashSet::default();
    let mut writes = FxHashSet::default();

    let origin = |ir: &KernelIr, mut ptr: StmtId| -> Option<SNodeId> {
        loop {
            match &ir.stmt(ptr).kind {
                StmtKind::GlobalPtr { snode, .. } => return Some(*snode),
                StmtKind::PtrOffset { base, .. } => ptr = *base,
                _ => return None,
            }
        }
    };

    for stmt in gather_statements(ir, |_, _| true) {
        match &ir.stmt(stmt).kind {
            StmtKind::GlobalLoad { ptr } => {
                if let Some(sn) = origin(ir, *ptr) {
                    reads.insert(sn);
                }
            }
            StmtKind::GlobalStore { ptr, .. } => {
                if let Some(sn) = origin(ir, *ptr) {
                    writes.insert(sn);
                }
            }
            StmtKind::AtomicRmw { ptr, .. } => {
                if let Some(sn) = origin(ir, *ptr) {
                    reads.insert(sn);
                    writes.insert(sn);
                }
            }
            _ => {}
        }
    }
    (reads, writes)
}

/// Per offloaded task, a mapping from bit-struct SNode to the single
/// `GlobalPtr` statement that accesses it, when that access is unique
/// within the task. Absent for any SNode accessed through more than one
/// distinct `GlobalPtr`. Used to decide whether a bit-field packing
/// optimization is sound.
///
/// `task_bodies` gives, for each task index, the root block of its body —
/// the offloader (`qd-offload`) is the producer of that mapping; this
/// analysis is deliberately offload-agnostic and just takes block roots.
pub fn gather_uniquely_accessed_pointers(
    ir: &KernelIr,
    task_bodies: &[(u32, qd_ir::BlockId)],
) -> FxHashMap<u32, FxHashMap<SNodeId, StmtId>> {
    let mut result = FxHashMap::default();
    for &(task_id, body) in task_bodies {
        let mut per_snode: FxHashMap<SNodeId, Vec<StmtId>> = FxHashMap::default();
        let mut ptrs = Vec::new();
        gather_rec(
            ir,
            body,
            &|ir, s| matches!(ir.stmt(s).kind, StmtKind::GlobalPtr { .. }),
            &mut ptrs,
        );
        for ptr in ptrs {
            if let StmtKind::GlobalPtr { snode, .. } = &ir.stmt(ptr).kind {
                per_snode.entry(*snode).or_default().push(ptr);
            }
        }
        let unique: FxHashMap<SNodeId, StmtId> = per_snode
            .into_iter()
            .filter_map(|(sn, ptrs)| {
                if ptrs.len() == 1 {
                    Some((sn, ptrs[0]))
                } else {
                    None
                }
            })
            .collect();
        result.insert(task_id, unique);
    }
    result
}
