//! `KernelIr`: the owning arena for one kernel body's statements and blocks.
//!
//! Playing the role `Function` plays in a conventional SSA-based compiler:
//! the single allocator for `StmtId`/`BlockId`, and the home of the use-def
//! index that `replace_usages_with` keeps consistent.

use crate::entities::{BlockId, StmtId};
use crate::stmt::{Stmt, StmtKind};
use crate::Block;
use qd_entity::{EntityRef, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

/// The per-kernel IR arena: every `Stmt` and `Block` referenced while
/// compiling one kernel lives here.
#[derive(Clone, Debug, Default)]
pub struct KernelIr {
    stmts: PrimaryMap<StmtId, Stmt>,
    blocks: PrimaryMap<BlockId, Block>,
    /// Reverse index: for each statement, the statements that use it as an
    /// operand. Kept in sync by `push_stmt`/`replace_usages_with`/`erase`.
    uses: SecondaryMap<StmtId, SmallVec<[StmtId; 4]>>,
    pub root_block: BlockId,
}

impl KernelIr {
    /// Create an arena with one empty root block.
    pub fn new() -> Self {
        let mut blocks = PrimaryMap::new();
        let root_block = blocks.push(Block::new(None));
        KernelIr {
            stmts: PrimaryMap::new(),
            blocks,
            uses: SecondaryMap::new(),
            root_block,
        }
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id]
    }

    pub fn num_stmts(&self) -> usize {
        self.stmts.len()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn stmt_ids(&self) -> impl Iterator<Item = StmtId> + '_ {
        (0..self.stmts.len()).map(StmtId::new)
    }

    pub fn users_of(&self, id: StmtId) -> &[StmtId] {
        self.uses.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Allocate a fresh block, owned by `parent_stmt` if given.
    pub fn new_block(&mut self, parent_stmt: Option<StmtId>) -> BlockId {
        self.blocks.push(Block::new(parent_stmt))
    }

    /// Append `kind` to the end of `block`, registering its operands in the
    /// use-def index.
    pub fn push_stmt(&mut self, block: BlockId, kind: StmtKind) -> StmtId {
        let id = self.stmts.push(Stmt::new(kind, block));
        for operand in self.stmts[id].kind.operands() {
            self.uses[operand].push(id);
        }
        self.blocks[block].stmts.push(id);
        id
    }

    /// Insert `kind` immediately before `before` in `before`'s parent block.
    /// Returns the new statement's id. Used by passes that have already
    /// committed to a single, non-delayed structural edit (most transforms
    /// go through `DelayedIRModifier` instead, see `modifier.rs`).
    pub fn insert_before(&mut self, before: StmtId, kind: StmtKind) -> StmtId {
        let block = self.stmts[before].parent.expect("statement has no parent");
        let id = self.stmts.push(Stmt::new(kind, block));
        for operand in self.stmts[id].kind.operands() {
            self.uses[operand].push(id);
        }
        let pos = self.blocks[block]
            .position_of(before)
            .expect("before-stmt not found in its own parent block");
        self.blocks[block].stmts.insert(pos, id);
        id
    }

    /// Atomically rewrite every use of `old` to refer to `new_stmt` instead,
    /// updating both the operand lists of users and the use-def index.
    pub fn replace_usages_with(&mut self, old: StmtId, new_stmt: StmtId) {
        let users: SmallVec<[StmtId; 4]> = self.uses.get(old).cloned().unwrap_or_default();
        for &user in &users {
            self.stmts[user].kind.replace_operand(old, new_stmt);
            self.uses[new_stmt].push(user);
        }
        self.uses[old].clear();
    }

    /// Rewrite a single user's reference to `old`, leaving every other user
    /// of `old` untouched. Unlike `replace_usages_with`, this is scoped to
    /// one statement; the offloader needs it to give each task its own
    /// locally-materialized copy of a value computed by an earlier task
    /// without rewiring every other task that also reads the original.
    pub fn replace_operand_in_stmt(&mut self, user: StmtId, old: StmtId, new_stmt: StmtId) {
        self.stmts[user].kind.replace_operand(old, new_stmt);
        if let Some(users) = self.uses.get(old).cloned() {
            let filtered: SmallVec<[StmtId; 4]> =
                users.into_iter().filter(|&u| u != user).collect();
            self.uses[old] = filtered;
        }
        self.uses[new_stmt].push(user);
    }

    /// Remove `stmt` from its parent block and drop it from the use-def
    /// index. Callers must ensure it has no remaining users (DCE's
    /// precondition); violating this leaves a dangling reference, which is
    /// an invariant violation the verifier would catch.
    pub fn erase(&mut self, stmt: StmtId) {
        let block = self.stmts[stmt].parent.expect("statement has no parent");
        if let Some(pos) = self.blocks[block].position_of(stmt) {
            self.blocks[block].stmts.remove(pos);
        }
        for operand in self.stmts[stmt].kind.operands() {
            if let Some(users) = self.uses.get(operand).cloned() {
                let filtered: SmallVec<[StmtId; 4]> =
                    users.into_iter().filter(|&u| u != stmt).collect();
                self.uses[operand] = filtered;
            }
        }
    }

    /// In-order traversal of every statement reachable from `block`,
    /// descending into container bodies. This is the canonical definition
    /// `count_statements` relies on.
    pub fn walk_preorder(&self, block: BlockId, out: &mut Vec<StmtId>) {
        for &id in &self.blocks[block].stmts {
            out.push(id);
            match &self.stmts[id].kind {
                StmtKind::RangeFor { body, .. } | StmtKind::StructFor { body, .. } => {
                    self.walk_preorder(*body, out);
                }
                StmtKind::WhileLoop { body } => self.walk_preorder(*body, out),
                StmtKind::IfStmt {
                    then_block,
                    else_block,
                    ..
                } => {
                    self.walk_preorder(*then_block, out);
                    if let Some(else_block) = else_block {
                        self.walk_preorder(*else_block, out);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::BinaryOp;

    #[test]
    fn push_and_walk() {
        let mut ir = KernelIr::new();
        let a = ir.push_stmt(ir.root_block, StmtKind::ConstI64(1));
        let b = ir.push_stmt(ir.root_block, StmtKind::ConstI64(2));
        let c = ir.push_stmt(
            ir.root_block,
            StmtKind::BinaryOp {
                op: BinaryOp::Add,
                lhs: a,
                rhs: b,
            },
        );
        assert_eq!(ir.users_of(a), &[c]);
        assert_eq!(ir.users_of(b), &[c]);
        let mut out = Vec::new();
        ir.walk_preorder(ir.root_block, &mut out);
        assert_eq!(out, vec![a, b, c]);
    }

    #[test]
    fn replace_usages_rewires_users() {
        let mut ir = KernelIr::new();
        let a = ir.push_stmt(ir.root_block, StmtKind::ConstI64(1));
        let b = ir.push_stmt(ir.root_block, StmtKind::ConstI64(2));
        let c = ir.push_stmt(
            ir.root_block,
            StmtKind::BinaryOp {
                op: BinaryOp::Add,
                lhs: a,
                rhs: b,
            },
        );
        ir.replace_usages_with(a, b);
        match &ir.stmt(c).kind {
            StmtKind::BinaryOp { lhs, rhs, .. } => {
                assert_eq!(*lhs, b);
                assert_eq!(*rhs, b);
            }
            _ => panic!("expected BinaryOp"),
        }
        assert!(ir.users_of(a).is_empty());
    }

    #[test]
    fn replace_operand_in_stmt_is_scoped_to_one_user() {
        let mut ir = KernelIr::new();
        let a = ir.push_stmt(ir.root_block, StmtKind::ConstI64(1));
        let b = ir.push_stmt(ir.root_block, StmtKind::ConstI64(2));
        let user1 = ir.push_stmt(
            ir.root_block,
            StmtKind::BinaryOp {
                op: BinaryOp::Add,
                lhs: a,
                rhs: a,
            },
        );
        let user2 = ir.push_stmt(
            ir.root_block,
            StmtKind::BinaryOp {
                op: BinaryOp::Sub,
                lhs: a,
                rhs: a,
            },
        );
        ir.replace_operand_in_stmt(user1, a, b);
        match &ir.stmt(user1).kind {
            StmtKind::BinaryOp { lhs, rhs, .. } => {
                assert_eq!(*lhs, b);
                assert_eq!(*rhs, b);
            }
            _ => panic!("expected BinaryOp"),
        }
        match &ir.stmt(user2).kind {
            StmtKind::BinaryOp { lhs, rhs, .. } => {
                assert_eq!(*lhs, a);
                assert_eq!(*rhs, a);
            }
            _ => panic!("expected BinaryOp"),
        }
        assert_eq!(ir.users_of(a), &[user2]);
        assert!(ir.users_of(b).contains(&user1));
    }
}
