//! `cfg_optimization`: store-to-load forwarding + dead-store elimination
//! over the CFG, suppressed when `real_matrix_enabled` (§4.3). Dumps the
//! graph before/after when `QD_DUMP_CFG`/`TI_DUMP_CFG` is set, mirroring
//! the reference `irpass::cfg_optimization` entry point.

use qd_analysis::build_cfg;
use qd_ir::{CompileConfig, KernelIr};

use crate::die::die;
use crate::outcome::PassOutcome;

fn dump_cfg_enabled() -> bool {
    let truthy = |v: String| v == "1";
    std::env::var("QD_DUMP_CFG").map(truthy).unwrap_or(false)
        || std::env::var("TI_DUMP_CFG").map(truthy).unwrap_or(false)
}

/// Runs `simplify_graph` + `store_to_load_forwarding` +
/// `dead_store_elimination` over the CFG built from `ir`, then a final
/// `die` sweep to remove now-unused allocas (the reference pass's
/// trailing `die(root)` comment: "remove unused allocas"). No-ops (but
/// still runs `die`) when `config.real_matrix_enabled`.
pub fn cfg_optimization(ir: &mut KernelIr, config: &CompileConfig, phase: &str) -> PassOutcome {
    let mut cfg = build_cfg(ir);
    let dump = dump_cfg_enabled();
    if dump {
        let path = std::env::temp_dir().join(format!("qd_cfg_{phase}_before.dot"));
        if let Err(e) = cfg.dump_graph_to_file(&path) {
            log::warn!("failed to dump CFG to {}: {e}", path.display());
        }
    }

    let mut modified = false;
    if !config.real_matrix_enabled {
        cfg.simplify_graph();
        if cfg.store_to_load_forwarding(ir) {
            modified = true;
        }
        if cfg.dead_store_elimination(ir) {
            modified = true;
        }
        if dump {
            let path = std::env::temp_dir().join(format!("qd_cfg_{phase}_after.dot"));
            if let Err(e) = cfg.dump_graph_to_file(&path) {
                log::warn!("failed to dump CFG to {}: {e}", path.display());
            }
        }
    }

    let die_outcome = die(ir);
    PassOutcome::modified(modified || die_outcome.is_modified())
}
