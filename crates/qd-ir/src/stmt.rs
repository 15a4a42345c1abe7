//! The statement model: a closed sum of classification tags, each with its
//! own operand layout. This stands in for the ~80-tag hierarchy described by
//! the data model; it implements one representative tag per named category
//! (arithmetic, load, store, atomic, cast, pointer derivation, loop, branch,
//! offloaded task, SNode operation, range assumption, loop-unique, external
//! call, allocation) plus the handful of concrete opcodes the transform
//! passes and offloader need to do real work.

use crate::entities::{BlockId, SNodeId, StmtId};
use crate::types::ResultType;
use smallvec::SmallVec;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A binary arithmetic operator.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// A unary arithmetic operator.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

/// An atomic read-modify-write operator.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum AtomicOp {
    Add,
    Sub,
    Max,
    Min,
    BitAnd,
    BitOr,
    BitXor,
}

/// An SNode structural operation (as opposed to a read/write through a
/// `GlobalLoad`/`GlobalStore`/`AtomicOp` on a place leaf).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum SNodeOpKind {
    Activate,
    Deactivate,
    IsActive,
    Append,
    Length,
    GetAddr,
}

/// One classified IR node. The tag determines which operand slots below are
/// meaningful, exactly as the data model requires: "the tag determines
/// which operands are meaningful and which visitor method applies".
#[derive(Clone, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum StmtKind {
    // -- arithmetic --
    BinaryOp {
        op: BinaryOp,
        lhs: StmtId,
        rhs: StmtId,
    },
    UnaryOp {
        op: UnaryOp,
        operand: StmtId,
    },
    ConstI64(i64),
    ConstF64(f64),

    // -- cast --
    Cast {
        operand: StmtId,
        to: crate::types::DataType,
    },

    // -- pointer derivation --
    /// Derives a pointer to a `place` SNode at the given per-axis indices.
    GlobalPtr {
        snode: SNodeId,
        indices: SmallVec<[StmtId; 4]>,
    },
    /// Pointer arithmetic over an already-derived pointer (produced by
    /// `lower_access`); offsets an existing pointer by a constant stride.
    PtrOffset {
        base: StmtId,
        offset: StmtId,
    },

    // -- load / store / atomic --
    GlobalLoad {
        ptr: StmtId,
    },
    GlobalStore {
        ptr: StmtId,
        value: StmtId,
    },
    AtomicRmw {
        op: AtomicOp,
        ptr: StmtId,
        value: StmtId,
    },

    // -- SNode operation --
    SNodeOp {
        kind: SNodeOpKind,
        snode: SNodeId,
        indices: SmallVec<[StmtId; 4]>,
        value: Option<StmtId>,
    },

    // -- allocation --
    /// A kernel-local scalar slot (the `alloca` of this IR); written via
    /// `LocalStore`/read via `LocalLoad`.
    AllocaLocal {
        ty: crate::types::DataType,
    },
    LocalLoad {
        alloca: StmtId,
    },
    LocalStore {
        alloca: StmtId,
        value: StmtId,
    },

    // -- loop / branch (containers) --
    RangeFor {
        begin: StmtId,
        end: StmtId,
        reversed: bool,
        body: BlockId,
    },
    StructFor {
        snode: SNodeId,
        body: BlockId,
    },
    WhileLoop {
        body: BlockId,
    },
    IfStmt {
        cond: StmtId,
        then_block: BlockId,
        else_block: Option<BlockId>,
    },

    // -- analysis-only markers, removed before codegen --
    RangeAssumption {
        input: StmtId,
        low: i64,
        high: i64,
    },
    LoopUnique {
        input: StmtId,
    },

    // -- external call --
    ExternalCall {
        symbol: String,
        args: SmallVec<[StmtId; 4]>,
        has_result: bool,
    },

    // -- offloaded task marker --
    /// Present only after `offload`; the body of the surrounding block is
    /// an opaque dispatch unit from this point on (see `qd-offload`).
    OffloadedMarker {
        task_index: u32,
    },

    // -- kernel arguments / return --
    KernelArg {
        index: u32,
        ty: crate::types::DataType,
    },
    KernelReturn {
        value: StmtId,
    },
}

impl StmtKind {
    /// The result type this tag produces, or `None` for pure side-effect
    /// tags (stores, SNode mutation, control flow, ...).
    pub fn result_type(&self, operand_types: impl Fn(StmtId) -> ResultType) -> ResultType {
        use ResultType::*;
        match self {
            StmtKind::BinaryOp { lhs, .. } => operand_types(*lhs),
            StmtKind::UnaryOp { operand, .. } => operand_types(*operand),
            StmtKind::ConstI64(_) => Value(crate::types::DataType::I64),
            StmtKind::ConstF64(_) => Value(crate::types::DataType::F64),
            StmtKind::Cast { to, .. } => Value(to.clone()),
            StmtKind::GlobalPtr { .. } | StmtKind::PtrOffset { .. } => {
                Value(crate::types::DataType::ptr_to(crate::types::DataType::I64))
            }
            StmtKind::GlobalLoad { ptr } => operand_types(*ptr),
            StmtKind::AtomicRmw { ptr, .. } => operand_types(*ptr),
            StmtKind::AllocaLocal { ty } => Value(crate::types::DataType::ptr_to(ty.clone())),
            StmtKind::LocalLoad { alloca } => operand_types(*alloca),
            StmtKind::SNodeOp {
                kind: SNodeOpKind::IsActive,
                ..
            } => Value(crate::types::DataType::I32),
            StmtKind::SNodeOp {
                kind: SNodeOpKind::Length,
                ..
            } => Value(crate::types::DataType::I32),
            StmtKind::SNodeOp {
                kind: SNodeOpKind::GetAddr,
                ..
            } => Value(crate::types::DataType::ptr_to(crate::types::DataType::I64)),
            StmtKind::ExternalCall { has_result, .. } if *has_result => {
                Value(crate::types::DataType::I64)
            }
            StmtKind::KernelArg { ty, .. } => Value(ty.clone()),
            StmtKind::RangeAssumption { input, .. } | StmtKind::LoopUnique { input } => {
                operand_types(*input)
            }
            _ => None,
        }
    }

    /// True for tags whose removal could change program behavior even if
    /// their result is unused (the definition of "side effect" DCE needs).
    pub fn has_side_effect(&self) -> bool {
        matches!(
            self,
            StmtKind::GlobalStore { .. }
                | StmtKind::AtomicRmw { .. }
                | StmtKind::LocalStore { .. }
                | StmtKind::SNodeOp {
                    kind: SNodeOpKind::Activate | SNodeOpKind::Deactivate | SNodeOpKind::Append,
                    ..
                }
                | StmtKind::ExternalCall { .. }
                | StmtKind::KernelReturn { .. }
                | StmtKind::RangeFor { .. }
                | StmtKind::StructFor { .. }
                | StmtKind::WhileLoop { .. }
                | StmtKind::IfStmt { .. }
                | StmtKind::OffloadedMarker { .. }
        )
    }

    /// Is this a container statement (owns a nested `Block`)?
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            StmtKind::RangeFor { .. }
                | StmtKind::StructFor { .. }
                | StmtKind::WhileLoop { .. }
                | StmtKind::IfStmt { .. }
        )
    }

    /// All operand statement references, in a stable order. Used by
    /// `replace_usages_with` and by the generic gather/use-def machinery.
    pub fn operands(&self) -> SmallVec<[StmtId; 4]> {
        let mut v = SmallVec::new();
        match self {
            StmtKind::BinaryOp { lhs, rhs, .. } => {
                v.push(*lhs);
                v.push(*rhs);
            }
            StmtKind::UnaryOp { operand, .. } => v.push(*operand),
            StmtKind::Cast { operand, .. } => v.push(*operand),
            StmtKind::GlobalPtr { indices, .. } => v.extend(indices.iter().copied()),
            StmtKind::PtrOffset { base, offset } => {
                v.push(*base);
                v.push(*offset);
            }
            StmtKind::GlobalLoad { ptr } => v.push(*ptr),
            StmtKind::GlobalStore { ptr, value } => {
                v.push(*ptr);
                v.push(*value);
            }
            StmtKind::AtomicRmw { ptr, value, .. } => {
                v.push(*ptr);
                v.push(*value);
            }
            StmtKind::SNodeOp {
                indices, value, ..
            } => {
                v.extend(indices.iter().copied());
                if let Some(value) = value {
                    v.push(*value);
                }
            }
            StmtKind::LocalLoad { alloca } => v.push(*alloca),
            StmtKind::LocalStore { alloca, value } => {
                v.push(*alloca);
                v.push(*value);
            }
            StmtKind::RangeFor { begin, end, .. } => {
                v.push(*begin);
                v.push(*end);
            }
            StmtKind::IfStmt { cond, .. } => v.push(*cond),
            StmtKind::RangeAssumption { input, .. } => v.push(*input),
            StmtKind::LoopUnique { input } => v.push(*input),
            StmtKind::ExternalCall { args, .. } => v.extend(args.iter().copied()),
            StmtKind::KernelReturn { value } => v.push(*value),
            _ => {}
        }
        v
    }

    /// Rewrite every operand reference equal to `from` to `to`, in place.
    pub fn replace_operand(&mut self, from: StmtId, to: StmtId) {
        let rewrite = |r: &mut StmtId| {
            if *r == from {
                *r = to;
            }
        };
        match self {
            StmtKind::BinaryOp { lhs, rhs, .. } => {
                rewrite(lhs);
                rewrite(rhs);
            }
            StmtKind::UnaryOp { operand, .. } => rewrite(operand),
            StmtKind::Cast { operand, .. } => rewrite(operand),
            StmtKind::GlobalPtr { indices, .. } => indices.iter_mut().for_each(rewrite),
            StmtKind::PtrOffset { base, offset } => {
                rewrite(base);
                rewrite(offset);
            }
            StmtKind::GlobalLoad { ptr } => rewrite(ptr),
            StmtKind::GlobalStore { ptr, value } => {
                rewrite(ptr);
                rewrite(value);
            }
            StmtKind::AtomicRmw { ptr, value, .. } => {
                rewrite(ptr);
                rewrite(value);
            }
            StmtKind::SNodeOp {
                indices, value, ..
            } => {
                indices.iter_mut().for_each(rewrite);
                if let Some(value) = value {
                    rewrite(value);
                }
            }
            StmtKind::LocalLoad { alloca } => rewrite(alloca),
            StmtKind::LocalStore { alloca, value } => {
                rewrite(alloca);
                rewrite(value);
            }
            StmtKind::RangeFor { begin, end, .. } => {
                rewrite(begin);
                rewrite(end);
            }
            StmtKind::IfStmt { cond, .. } => rewrite(cond),
            StmtKind::RangeAssumption { input, .. } => rewrite(input),
            StmtKind::LoopUnique { input } => rewrite(input),
            StmtKind::ExternalCall { args, .. } => args.iter_mut().for_each(rewrite),
            StmtKind::KernelReturn { value } => rewrite(value),
            _ => {}
        }
    }
}

/// A node in the IR, carrying its classification plus bookkeeping shared by
/// every tag: identity, parent block, and result type.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Stmt {
    pub kind: StmtKind,
    pub parent: Option<BlockId>,
}

impl Stmt {
    pub fn new(kind: StmtKind, parent: BlockId) -> Self {
        Stmt {
            kind,
            parent: Some(parent),
        }
    }
}
