//! Delayed IR modification: a transaction log of structural edits applied
//! in a single post-walk step, so passes can accumulate edits while
//! traversing the tree without violating the no-mutation-behind-the-
//! iterator invariant the visitor relies on.

use crate::entities::{BlockId, StmtId};
use crate::function::KernelIr;
use crate::stmt::StmtKind;

enum Op {
    Erase(StmtId),
    ReplaceUses { old: StmtId, new: StmtId },
    InsertBefore { before: StmtId, kind: StmtKind },
    InsertAfter { after: StmtId, kind: StmtKind },
    /// Replace the statements in `[start, end)` of `block` with `replacement`.
    Splice {
        block: BlockId,
        start: usize,
        end: usize,
        replacement: Vec<StmtKind>,
    },
}

/// Accumulates `erase`/`replace-uses`/`insert-before`/`insert-after`/
/// `splice` commands during a traversal, then applies them atomically.
#[derive(Default)]
pub struct DelayedIRModifier {
    ops: Vec<Op>,
}

impl DelayedIRModifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn erase(&mut self, stmt: StmtId) {
        self.ops.push(Op::Erase(stmt));
    }

    pub fn replace_usages_with(&mut self, old: StmtId, new: StmtId) {
        self.ops.push(Op::ReplaceUses { old, new });
    }

    pub fn insert_before(&mut self, before: StmtId, kind: StmtKind) {
        self.ops.push(Op::InsertBefore { before, kind });
    }

    pub fn insert_after(&mut self, after: StmtId, kind: StmtKind) {
        self.ops.push(Op::InsertAfter { after, kind });
    }

    pub fn splice(&mut self, block: BlockId, start: usize, end: usize, replacement: Vec<StmtKind>) {
        self.ops.push(Op::Splice {
            block,
            start,
            end,
            replacement,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every accumulated op to `ir`, in the order they were recorded.
    /// Returns whether any op actually ran (the "was modified" signal every
    /// pass reports back to the orchestrator).
    pub fn apply(self, ir: &mut KernelIr) -> bool {
        let modified = !self.ops.is_empty();
        for op in self.ops {
            match op {
                Op::Erase(stmt) => ir.erase(stmt),
                Op::ReplaceUses { old, new } => ir.replace_usages_with(old, new),
                Op::InsertBefore { before, kind } => {
                    ir.insert_before(before, kind);
                }
                Op::InsertAfter { after, kind } => {
                    let block = ir.stmt(after).parent.expect("dangling statement");
                    let pos = ir
                        .block(block)
                        .position_of(after)
                        .expect("after-stmt missing from its block");
                    let new_id = ir.push_stmt(block, kind);
                    // push_stmt appended to the tail; move it to just after `after`.
                    let tail = ir.block_mut(block).stmts.pop().unwrap();
                    debug_assert_eq!(tail, new_id);
                    ir.block_mut(block).stmts.insert(pos + 1, new_id);
                }
                Op::Splice {
                    block,
                    start,
                    end,
                    replacement,
                } => {
                    let new_ids: Vec<StmtId> = replacement
                        .into_iter()
                        .map(|kind| ir.push_stmt(block, kind))
                        .collect();
                    let tail_len = new_ids.len();
                    let blk = ir.block_mut(block);
                    for _ in 0..tail_len {
                        blk.stmts.pop();
                    }
                    blk.stmts.splice(start..end, new_ids);
                }
            }
        }
        modified
    }
}
