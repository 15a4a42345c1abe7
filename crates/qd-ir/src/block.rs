//! An ordered sequence of statements.

use crate::entities::StmtId;

/// A `Block` is an ordered list of statement references plus a back-pointer
/// to the statement that owns it (a loop body, an if-branch, an offloaded
/// task body, ...). Insertion order is significant. The root block of a
/// kernel has no parent statement.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    pub stmts: Vec<StmtId>,
    pub parent_stmt: Option<StmtId>,
}

impl Block {
    pub fn new(parent_stmt: Option<StmtId>) -> Self {
        Block {
            stmts: Vec::new(),
            parent_stmt,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    /// Position of `stmt` within this block, if present.
    pub fn position_of(&self, stmt: StmtId) -> Option<usize> {
        self.stmts.iter().position(|&s| s == stmt)
    }
}
