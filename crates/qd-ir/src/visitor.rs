//! The visitor protocol: a record of per-tag callbacks invoked during a tree
//! walk, generalizing the reference compiler's virtual-dispatch visitor to a
//! closed-enum match plus an escape hatch for analyses that don't care about
//! the concrete tag.

use crate::entities::{BlockId, StmtId};
use crate::function::KernelIr;
use crate::stmt::StmtKind;

/// Per-category callbacks for a read-only traversal, grouped the way the
/// tag categories in the data model are grouped (arithmetic, load/store,
/// atomic, SNode op, container, ...) rather than one method per concrete
/// opcode. Every method has a default no-op body.
///
/// Normal dispatch invokes the callback matching a statement's category.
/// When `invoke_default_visitor()` returns `true`, every statement instead
/// goes through `visit_default`, regardless of category — the "generic
/// escape hatch" analyses that don't care about the tag use.
pub trait StmtVisitor {
    fn preprocess_container_stmt(&mut self, _ir: &KernelIr, _stmt: StmtId) -> bool {
        true
    }

    fn invoke_default_visitor(&self) -> bool {
        false
    }

    /// Fallback invoked for every statement when `invoke_default_visitor`
    /// returns `true`, and for any category without an override below.
    fn visit_default(&mut self, _ir: &KernelIr, _stmt: StmtId) {}

    fn visit_arithmetic(&mut self, ir: &KernelIr, stmt: StmtId) {
        self.visit_default(ir, stmt);
    }
    fn visit_load(&mut self, ir: &KernelIr, stmt: StmtId) {
        self.visit_default(ir, stmt);
    }
    fn visit_store(&mut self, ir: &KernelIr, stmt: StmtId) {
        self.visit_default(ir, stmt);
    }
    fn visit_atomic(&mut self, ir: &KernelIr, stmt: StmtId) {
        self.visit_default(ir, stmt);
    }
    fn visit_pointer(&mut self, ir: &KernelIr, stmt: StmtId) {
        self.visit_default(ir, stmt);
    }
    fn visit_snode_op(&mut self, ir: &KernelIr, stmt: StmtId) {
        self.visit_default(ir, stmt);
    }
    fn visit_container(&mut self, ir: &KernelIr, stmt: StmtId) {
        self.visit_default(ir, stmt);
    }
    fn visit_marker(&mut self, ir: &KernelIr, stmt: StmtId) {
        self.visit_default(ir, stmt);
    }
}

fn dispatch<V: StmtVisitor + ?Sized>(ir: &KernelIr, stmt: StmtId, visitor: &mut V) {
    if visitor.invoke_default_visitor() {
        visitor.visit_default(ir, stmt);
        return;
    }
    match &ir.stmt(stmt).kind {
        StmtKind::BinaryOp { .. } | StmtKind::UnaryOp { .. } | StmtKind::ConstI64(_)
        | StmtKind::ConstF64(_) | StmtKind::Cast { .. } => visitor.visit_arithmetic(ir, stmt),
        StmtKind::GlobalLoad { .. } | StmtKind::LocalLoad { .. } => visitor.visit_load(ir, stmt),
        StmtKind::GlobalStore { .. } | StmtKind::LocalStore { .. } => {
            visitor.visit_store(ir, stmt)
        }
        StmtKind::AtomicRmw { .. } => visitor.visit_atomic(ir, stmt),
        StmtKind::GlobalPtr { .. } | StmtKind::PtrOffset { .. } | StmtKind::AllocaLocal { .. } => {
            visitor.visit_pointer(ir, stmt)
        }
        StmtKind::SNodeOp { .. } => visitor.visit_snode_op(ir, stmt),
        StmtKind::RangeFor { .. }
        | StmtKind::StructFor { .. }
        | StmtKind::WhileLoop { .. }
        | StmtKind::IfStmt { .. } => visitor.visit_container(ir, stmt),
        StmtKind::RangeAssumption { .. }
        | StmtKind::LoopUnique { .. }
        | StmtKind::OffloadedMarker { .. } => visitor.visit_marker(ir, stmt),
        StmtKind::ExternalCall { .. }
        | StmtKind::KernelArg { .. }
        | StmtKind::KernelReturn { .. } => visitor.visit_default(ir, stmt),
    }
}

/// Walk `block`'s statements in order, dispatching each to `visitor` and
/// descending into container bodies unless `preprocess_container_stmt`
/// vetoes the descent.
pub fn walk_block<V: StmtVisitor + ?Sized>(ir: &KernelIr, block: BlockId, visitor: &mut V) {
    let stmt_ids: Vec<StmtId> = ir.block(block).stmts.clone();
    for stmt in stmt_ids {
        let is_container = ir.stmt(stmt).kind.is_container();
        if is_container {
            let descend = visitor.preprocess_container_stmt(ir, stmt);
            dispatch(ir, stmt, visitor);
            if descend {
                for body in container_bodies(ir, stmt) {
                    walk_block(ir, body, visitor);
                }
            }
        } else {
            dispatch(ir, stmt, visitor);
        }
    }
}

fn container_bodies(ir: &KernelIr, stmt: StmtId) -> Vec<BlockId> {
    match &ir.stmt(stmt).kind {
        StmtKind::RangeFor { body, .. } | StmtKind::StructFor { body, .. } => vec![*body],
        StmtKind::WhileLoop { body } => vec![*body],
        StmtKind::IfStmt {
            then_block,
            else_block,
            ..
        } => {
            let mut v = vec![*then_block];
            if let Some(e) = else_block {
                v.push(*e);
            }
            v
        }
        _ => vec![],
    }
}
