//! Algebraic simplification: rewrites expressions to a cheaper equivalent
//! form using identities that hold regardless of the operands' runtime
//! values (`x + 0 -> x`, `x * 1 -> x`, `x - x -> 0`, double-negation, ...).
//! Unlike `constant_fold`, this does not require either operand to be a
//! literal.

use qd_ir::{BinaryOp, KernelIr, StmtId, StmtKind, UnaryOp};

use crate::outcome::PassOutcome;

/// The result of simplifying one statement: either it should be replaced
/// wholesale by a fresh statement, or all its uses should be redirected to
/// an operand that already exists (no new statement needed).
enum Rewrite {
    ReplaceWith(StmtKind),
    AliasTo(StmtId),
}

fn is_const(ir: &KernelIr, id: StmtId, value: i64) -> bool {
    matches!(&ir.stmt(id).kind, StmtKind::ConstI64(v) if *v == value)
}

fn try_simplify(ir: &KernelIr, stmt: StmtId) -> Option<Rewrite> {
    match &ir.stmt(stmt).kind {
        StmtKind::BinaryOp { op, lhs, rhs } => {
            let (lhs, rhs) = (*lhs, *rhs);
            match op {
                BinaryOp::Add if is_const(ir, rhs, 0) => Some(Rewrite::AliasTo(lhs)),
                BinaryOp::Add if is_const(ir, lhs, 0) => Some(Rewrite::AliasTo(rhs)),
                BinaryOp::Sub if is_const(ir, rhs, 0) => Some(Rewrite::AliasTo(lhs)),
                BinaryOp::Sub if lhs == rhs => Some(Rewrite::ReplaceWith(StmtKind::ConstI64(0))),
                BinaryOp::Mul if is_const(ir, rhs, 1) => Some(Rewrite::AliasTo(lhs)),
                BinaryOp::Mul if is_const(ir, lhs, 1) => Some(Rewrite::AliasTo(rhs)),
                BinaryOp::Mul if is_const(ir, rhs, 0) || is_const(ir, lhs, 0) => {
                    Some(Rewrite::ReplaceWith(StmtKind::ConstI64(0)))
                }
                BinaryOp::Div if is_const(ir, rhs, 1) => Some(Rewrite::AliasTo(lhs)),
                BinaryOp::BitAnd if lhs == rhs => Some(Rewrite::AliasTo(lhs)),
                BinaryOp::BitOr if lhs == rhs => Some(Rewrite::AliasTo(lhs)),
                BinaryOp::BitXor if lhs == rhs => {
                    Some(Rewrite::ReplaceWith(StmtKind::ConstI64(0)))
                }
                _ => None,
            }
        }
        StmtKind::UnaryOp {
            op: UnaryOp::Neg,
            operand,
        } => {
            // --x -> x
            if let StmtKind::UnaryOp {
                op: UnaryOp::Neg,
                operand: inner,
            } = &ir.stmt(*operand).kind
            {
                Some(Rewrite::AliasTo(*inner))
            } else {
                None
            }
        }
        StmtKind::UnaryOp {
            op: UnaryOp::Not,
            operand,
        } => {
            // !!x -> x
            if let StmtKind::UnaryOp {
                op: UnaryOp::Not,
                operand: inner,
            } = &ir.stmt(*operand).kind
            {
                Some(Rewrite::AliasTo(*inner))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Run one simplification sweep to a fixpoint (stage I of §4.3's `simplify`
/// entry: algebraic identities and peephole rewrites; constant folding and
/// dead-code elimination are separate passes run around this one by the
/// orchestrating pipeline).
pub fn simplify(ir: &mut KernelIr) -> PassOutcome {
    let mut changed = false;
    loop {
        let mut did_one = false;
        for stmt in ir.stmt_ids() {
            match try_simplify(ir, stmt) {
                Some(Rewrite::AliasTo(target)) => {
                    ir.replace_usages_with(stmt, target);
                    did_one = true;
                    changed = true;
                }
                Some(Rewrite::ReplaceWith(kind)) => {
                    let replacement = ir.insert_before(stmt, kind);
                    ir.replace_usages_with(stmt, replacement);
                    did_one = true;
                    changed = true;
                }
                None => {}
            }
        }
        if !did_one {
            break;
        }
    }
    PassOutcome::modified(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_zero_aliases_to_lhs() {
        let mut ir = KernelIr::new();
        let x = ir.push_stmt(ir.root_block, StmtKind::ConstI64(7));
        let zero = ir.push_stmt(ir.root_block, StmtKind::ConstI64(0));
        let sum = ir.push_stmt(
            ir.root_block,
            StmtKind::BinaryOp {
                op: BinaryOp::Add,
                lhs: x,
                rhs: zero,
            },
        );
        let user = ir.push_stmt(ir.root_block, StmtKind::LocalLoad { alloca: sum });
        let outcome = simplify(&mut ir);
        assert_eq!(outcome, PassOutcome::Modified);
        match ir.stmt(user).kind {
            StmtKind::LocalLoad { alloca } => assert_eq!(alloca, x),
            _ => panic!("expected LocalLoad"),
        }
    }

    #[test]
    fn self_subtraction_becomes_zero() {
        let mut ir = KernelIr::new();
        let x = ir.push_stmt(ir.root_block, StmtKind::ConstI64(9));
        let diff = ir.push_stmt(
            ir.root_block,
            StmtKind::BinaryOp {
                op: BinaryOp::Sub,
                lhs: x,
                rhs: x,
            },
        );
        let user = ir.push_stmt(ir.root_block, StmtKind::LocalLoad { alloca: diff });
        simplify(&mut ir);
        match ir.stmt(user).kind {
            StmtKind::LocalLoad { alloca } => {
                assert!(matches!(ir.stmt(alloca).kind, StmtKind::ConstI64(0)));
            }
            _ => panic!("expected LocalLoad"),
        }
    }

    #[test]
    fn double_negation_cancels() {
        let mut ir = KernelIr::new();
        let x = ir.push_stmt(ir.root_block, StmtKind::ConstI64(3));
        let neg1 = ir.push_stmt(
            ir.root_block,
            StmtKind::UnaryOp {
                op: UnaryOp::Neg,
                operand: x,
            },
        );
        let neg2 = ir.push_stmt(
            ir.root_block,
            StmtKind::UnaryOp {
                op: UnaryOp::Neg,
                operand: neg1,
            },
        );
        let user = ir.push_stmt(ir.root_block, StmtKind::LocalLoad { alloca: neg2 });
        let outcome = simplify(&mut ir);
        assert_eq!(outcome, PassOutcome::Modified);
        match ir.stmt(user).kind {
            StmtKind::LocalLoad { alloca } => assert_eq!(alloca, x),
            _ => panic!("expected LocalLoad"),
        }
    }

    #[test]
    fn unrelated_binary_op_is_untouched() {
        let mut ir = KernelIr::new();
        let a = ir.push_stmt(ir.root_block, StmtKind::ConstI64(4));
        let b = ir.push_stmt(ir.root_block, StmtKind::ConstI64(5));
        ir.push_stmt(
            ir.root_block,
            StmtKind::BinaryOp {
                op: BinaryOp::Add,
                lhs: a,
                rhs: b,
            },
        );
        assert_eq!(simplify(&mut ir), PassOutcome::Unchanged);
    }
}
