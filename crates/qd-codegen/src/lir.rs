//! A minimal, single-block "machine-independent instruction list" that
//! stands in for a real LLVM/SPIR-V module: this crate's backend boundary
//! is the `KernelCodeGen` trait, not a production code generator. Shaped
//! after `cranelift-frontend`'s `FunctionBuilder`: values and instructions
//! are entity-indexed, and callers build instructions through an
//! `ins()`-returned builder rather than pushing `LirInst`s directly.

use qd_entity::{entity_impl, EntityRef, PrimaryMap};
use qd_ir::{AtomicOp, BinaryOp, DataType, UnaryOp};

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct LirValue(u32);
entity_impl!(LirValue, "v");

/// One instruction in lowered form. Unlike `qd_ir::StmtKind`, operands here
/// are always `LirValue`s already resolved to this function's own value
/// space — no `BlockId`/`SNodeId` containers remain by this point; control
/// flow and SNode addressing were fully resolved by the IR passes upstream
/// of codegen.
#[derive(Clone, Debug)]
pub enum LirInst {
    ConstI64(i64),
    ConstF64(f64),
    Binary(BinaryOp, LirValue, LirValue),
    Unary(UnaryOp, LirValue),
    Cast(LirValue, DataType),
    LoadArg(u32),
    Load(LirValue),
    Store(LirValue, LirValue),
    AtomicRmw(AtomicOp, LirValue, LirValue),
    Call {
        symbol: String,
        args: Vec<LirValue>,
        has_result: bool,
    },
    Return(Option<LirValue>),
}

/// A straight-line instruction list plus its result types, one per task.
/// Stands in for the machine-code object a real backend would produce.
#[derive(Clone, Debug, Default)]
pub struct LirFunction {
    insts: PrimaryMap<LirValue, LirInst>,
}

impl LirFunction {
    pub fn new() -> Self {
        LirFunction {
            insts: PrimaryMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.len() == 0
    }

    pub fn inst(&self, value: LirValue) -> &LirInst {
        &self.insts[value]
    }

    pub fn iter(&self) -> impl Iterator<Item = (LirValue, &LirInst)> {
        self.insts.iter()
    }

    /// A builder bound to this function's instruction stream, mirroring
    /// `FunctionBuilder::ins()`.
    pub fn builder(&mut self) -> LirBuilder<'_> {
        LirBuilder { func: self }
    }
}

/// Ergonomic instruction emission: `func.builder().iadd(a, b)` instead of
/// hand-rolling `PrimaryMap::push(LirInst::Binary(...))` at every call
/// site.
pub struct LirBuilder<'f> {
    func: &'f mut LirFunction,
}

impl<'f> LirBuilder<'f> {
    fn push(&mut self, inst: LirInst) -> LirValue {
        self.func.insts.push(inst)
    }

    pub fn iconst(&mut self, v: i64) -> LirValue {
        self.push(LirInst::ConstI64(v))
    }

    pub fn fconst(&mut self, v: f64) -> LirValue {
        self.push(LirInst::ConstF64(v))
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: LirValue, rhs: LirValue) -> LirValue {
        self.push(LirInst::Binary(op, lhs, rhs))
    }

    pub fn unary(&mut self, op: UnaryOp, operand: LirValue) -> LirValue {
        self.push(LirInst::Unary(op, operand))
    }

    pub fn cast(&mut self, operand: LirValue, to: DataType) -> LirValue {
        self.push(LirInst::Cast(operand, to))
    }

    pub fn load_arg(&mut self, index: u32) -> LirValue {
        self.push(LirInst::LoadArg(index))
    }

    pub fn load(&mut self, ptr: LirValue) -> LirValue {
        self.push(LirInst::Load(ptr))
    }

    pub fn store(&mut self, ptr: LirValue, value: LirValue) -> LirValue {
        self.push(LirInst::Store(ptr, value))
    }

    pub fn atomic_rmw(&mut self, op: AtomicOp, ptr: LirValue, value: LirValue) -> LirValue {
        self.push(LirInst::AtomicRmw(op, ptr, value))
    }

    pub fn call(&mut self, symbol: impl Into<String>, args: Vec<LirValue>, has_result: bool) -> LirValue {
        self.push(LirInst::Call {
            symbol: symbol.into(),
            args,
            has_result,
        })
    }

    pub fn return_(&mut self, value: Option<LirValue>) -> LirValue {
        self.push(LirInst::Return(value))
    }
}
