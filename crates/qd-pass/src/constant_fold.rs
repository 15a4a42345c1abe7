//! Folds expressions whose operands are all compile-time constants, per a
//! per-operator allow-list (division/modulo by a known-zero constant is
//! deliberately left unfolded — it is a runtime trap, not a value).

use qd_ir::{BinaryOp, KernelIr, StmtKind, UnaryOp};

use crate::outcome::PassOutcome;

fn fold_binary(op: BinaryOp, lhs: i64, rhs: i64) -> Option<i64> {
    use BinaryOp::*;
    Some(match op {
        Add => lhs.wrapping_add(rhs),
        Sub => lhs.wrapping_sub(rhs),
        Mul => lhs.wrapping_mul(rhs),
        Div if rhs != 0 => lhs.wrapping_div(rhs),
        Mod if rhs != 0 => lhs.wrapping_rem(rhs),
        BitAnd => lhs & rhs,
        BitOr => lhs | rhs,
        BitXor => lhs ^ rhs,
        Shl => lhs.wrapping_shl(rhs as u32),
        Shr => lhs.wrapping_shr(rhs as u32),
        Lt => (lhs < rhs) as i64,
        Le => (lhs <= rhs) as i64,
        Gt => (lhs > rhs) as i64,
        Ge => (lhs >= rhs) as i64,
        Eq => (lhs == rhs) as i64,
        Ne => (lhs != rhs) as i64,
        Div | Mod => return None,
    })
}

fn fold_unary(op: UnaryOp, v: i64) -> i64 {
    match op {
        UnaryOp::Neg => v.wrapping_neg(),
        UnaryOp::Not => (v == 0) as i64,
        UnaryOp::BitNot => !v,
    }
}

fn try_fold(ir: &KernelIr, stmt: qd_ir::StmtId) -> Option<StmtKind> {
    match &ir.stmt(stmt).kind {
        StmtKind::BinaryOp { op, lhs, rhs } => {
            match (&ir.stmt(*lhs).kind, &ir.stmt(*rhs).kind) {
                (StmtKind::ConstI64(a), StmtKind::ConstI64(b)) => {
                    fold_binary(*op, *a, *b).map(StmtKind::ConstI64)
                }
                _ => None,
            }
        }
        StmtKind::UnaryOp { op, operand } => match &ir.stmt(*operand).kind {
            StmtKind::ConstI64(v) => Some(StmtKind::ConstI64(fold_unary(*op, *v))),
            _ => None,
        },
        _ => None,
    }
}

/// Fold every `BinaryOp`/`UnaryOp` whose operand(s) are `ConstI64`,
/// replacing the statement's uses with a fresh `ConstI64` of the folded
/// value. Runs to a fixpoint: folding one expression can make its user a
/// fold candidate in turn.
pub fn constant_fold(ir: &mut KernelIr) -> PassOutcome {
    let mut changed = false;
    loop {
        let mut did_one = false;
        for stmt in ir.stmt_ids() {
            if let Some(new_kind) = try_fold(ir, stmt) {
                let replacement = ir.insert_before(stmt, new_kind);
                ir.replace_usages_with(stmt, replacement);
                did_one = true;
                changed = true;
            }
        }
        if !did_one {
            break;
        }
    }
    PassOutcome::modified(changed)
}
