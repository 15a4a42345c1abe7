//! `remove_range_assumption` / `remove_loop_unique`: both passes erase an
//! analysis-only marker statement and rewire its uses to its `input`. They
//! are idempotent — running either twice after the first has exhausted its
//! matches reports `Unchanged`. Grounded on the reference compiler's
//! `RemoveRangeAssumption`/`RemoveLoopUnique` visitors (both a one-method
//! `BasicStmtVisitor` plus a `DelayedIRModifier`).

use qd_ir::{DelayedIRModifier, KernelIr, StmtKind};

use crate::outcome::PassOutcome;

fn remove_marker(ir: &mut KernelIr, is_marker: impl Fn(&StmtKind) -> Option<qd_ir::StmtId>) -> PassOutcome {
    let mut modifier = DelayedIRModifier::new();
    for stmt in ir.stmt_ids() {
        if let Some(input) = is_marker(&ir.stmt(stmt).kind) {
            modifier.replace_usages_with(stmt, input);
            modifier.erase(stmt);
        }
    }
    PassOutcome::modified(modifier.apply(ir))
}

/// Replaces every `RangeAssumption` marker with its `input`, then erases it.
/// Safe to run once `make_block_local` (the consumer of the range-assumption
/// hint) has already run (§4.3: "replaces range-assumption statements with
/// their input after they have served analysis").
pub fn remove_range_assumption(ir: &mut KernelIr) -> PassOutcome {
    remove_marker(ir, |kind| match kind {
        StmtKind::RangeAssumption { input, .. } => Some(*input),
        _ => None,
    })
}

/// Replaces every `LoopUnique` marker with its `input`, then erases it.
pub fn remove_loop_unique(ir: &mut KernelIr) -> PassOutcome {
    remove_marker(ir, |kind| match kind {
        StmtKind::LoopUnique { input } => Some(*input),
        _ => None,
    })
}
