//! `lower_access`: rewrites a high-level, multi-index `GlobalPtr` field
//! access into explicit pointer arithmetic — a zero-index base pointer to
//! the SNode plus a `PtrOffset` computed from the per-axis extractor
//! strides, the way the reference compiler's `LowerAccess` pass turns a
//! `GlobalPtrStmt` into a chain of `SNodeLookupStmt`/`GetChStmt` address
//! computations. Runs after struct-for fusion (§4.3), so by the time it
//! sees a `StructFor` all task-splitting decisions are already frozen.

use qd_ir::{BinaryOp, KernelIr, SNodeTree, StmtId, StmtKind};

use crate::outcome::PassOutcome;

/// Per-axis strides (row-major) for a leaf SNode's `shape`, outermost axis
/// first — `shape[i]`'s stride is the product of every `shape[j]` with
/// `j > i`.
fn strides(shape: &[u32]) -> Vec<i64> {
    let mut out = vec![1i64; shape.len()];
    let mut acc = 1i64;
    for i in (0..shape.len()).rev() {
        out[i] = acc;
        acc *= shape[i] as i64;
    }
    out
}

/// Lowers every multi-index `GlobalPtr` in `ir` that addresses a leaf of
/// `tree` into `PtrOffset(base, offset)` against a zero-index base pointer.
/// A `GlobalPtr` with zero or one index, or whose index count does not
/// match the target SNode's shape, is left untouched (nothing to flatten).
pub fn lower_access(ir: &mut KernelIr, tree: &SNodeTree) -> PassOutcome {
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
        if indices.len() <= 1 {
            continue;
        }
        let Some(node) = tree.nodes.get(snode) else {
            continue;
        };
        if node.shape.len() != indices.len() {
            continue;
        }
        let strides = strides(&node.shape);

        let base = ir.insert_before(
            stmt,
            StmtKind::GlobalPtr {
                snode,
                indices: Default::default(),
            },
        );

        let mut offset: Option<StmtId> = None;
        for (index, stride) in indices.iter().zip(strides.iter()) {
            let term = if *stride == 1 {
                *index
            } else {
                let stride_const = ir.insert_before(stmt, StmtKind::ConstI64(*stride));
                ir.insert_before(
                    stmt,
                    StmtKind::BinaryOp {
                        op: BinaryOp::Mul,
                        lhs: *index,
                        rhs: stride_const,
                    },
                )
            };
            offset = Some(match offset {
                None => term,
                Some(prev) => ir.insert_before(
                    stmt,
                    StmtKind::BinaryOp {
                        op: BinaryOp::Add,
                        lhs: prev,
                        rhs: term,
                    },
                ),
            });
        }
        let offset = offset.expect("at least one index present");

        let replacement = ir.insert_before(stmt, StmtKind::PtrOffset { base, offset });
        ir.replace_usages_with(stmt, replacement);
        ir.erase(stmt);
        changed = true;
    }

    PassOutcome::modified(changed)
}
