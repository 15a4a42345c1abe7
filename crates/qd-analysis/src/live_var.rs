//! Live-variable analysis over a `ControlFlowGraph`.

use crate::cfg::{defs_uses, BasicBlockId, ControlFlowGraph};
use qd_entity::SecondaryMap;
use qd_ir::{KernelIr, StmtId, StmtKind};
use rustc_hash::FxHashSet;

/// Configuration for `live_variable_analysis`: whether SNode-backed
/// (global) values participate in liveness, or only kernel-local scalars.
#[derive(Copy, Clone, Debug, Default)]
pub struct LiveVarAnalysisConfig {
    pub track_globals: bool,
}

pub struct LiveVarResult {
    pub live_in: SecondaryMap<BasicBlockId, FxHashSet<StmtId>>,
    pub live_out: SecondaryMap<BasicBlockId, FxHashSet<StmtId>>,
}

/// Is `stmt`'s result an SNode-backed (global) value rather than a kernel-
/// local one — a derived global pointer, a value loaded through one, an
/// atomic result, or an SNode structural query? Everything else (consts,
/// arithmetic, casts, `alloca`/`LocalLoad`, kernel args) is local.
fn is_global_producer(ir: &KernelIr, stmt: StmtId) -> bool {
    matches!(
        ir.stmt(stmt).kind,
        StmtKind::GlobalPtr { .. }
            | StmtKind::PtrOffset { .. }
            | StmtKind::GlobalLoad { .. }
            | StmtKind::AtomicRmw { .. }
            | StmtKind::SNodeOp { .. }
    )
}

/// Standard backward fixpoint: `live_out(b) = U live_in(succ)` for every
/// successor of `b`; `live_in(b) = uses(b) U (live_out(b) - defs(b))`.
///
/// `config.track_globals` gates whether an SNode-backed value (see
/// `is_global_producer`) can make a block's `uses` set, and so whether it
/// can ever become live across a block boundary: with it off, liveness is
/// computed as if only kernel-local scalars mattered, which is what lets a
/// caller run this analysis purely to drive local-register-style
/// reasoning without global memory traffic perturbing the result.
pub fn live_variable_analysis(
    ir: &KernelIr,
    cfg: &ControlFlowGraph,
    config: LiveVarAnalysisConfig,
) -> LiveVarResult {
    let mut live_in: SecondaryMap<BasicBlockId, FxHashSet<StmtId>> = SecondaryMap::new();
    let mut live_out: SecondaryMap<BasicBlockId, FxHashSet<StmtId>> = SecondaryMap::new();

    let ids: Vec<BasicBlockId> = cfg.nodes.iter().map(|(k, _)| k).collect();
    let mut dus: SecondaryMap<BasicBlockId, (FxHashSet<StmtId>, FxHashSet<StmtId>)> =
        SecondaryMap::new();
    for &id in &ids {
        let (defs, uses) = defs_uses(ir, cfg, id);
        let uses = if config.track_globals {
            uses
        } else {
            uses.into_iter().filter(|&s| !is_global_producer(ir, s)).collect()
        };
        dus[id] = (defs, uses);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &id in ids.iter().rev() {
            let mut out: FxHashSet<StmtId> = FxHashSet::default();
            for &succ in &cfg.nodes[id].succs {
                out.extend(live_in[succ].iter().copied());
            }
            if out != live_out[id] {
                live_out[id] = out.clone();
                changed = true;
            }
            let (defs, uses) = &dus[id];
            let mut inp = uses.clone();
            for v in out.difference(defs) {
                inp.insert(*v);
            }
            if inp != live_in[id] {
                live_in[id] = inp;
                changed = true;
            }
        }
    }

    LiveVarResult { live_in, live_out }
}
