//! The artifact a `KernelCodeGen` backend hands back to the launcher: one
//! compiled dispatch unit plus the metadata the launcher needs to invoke
//! it without re-inspecting the IR (§4.6 `CompiledKernelData`).

use qd_ir::Arch;
use qd_offload::OffloadedTaskKind;

use crate::lir::LirFunction;

/// One compiled `OffloadedTask`. `entry_symbol` is the name the launcher
/// looks up in the loaded module (`qd-launcher::JitSession::lookup`);
/// `lir` is the backend-internal lowered form kept around for
/// introspection/testing (a real backend would instead stash the
/// assembled object bytes here).
#[derive(Clone, Debug)]
pub struct CompiledKernelData {
    pub entry_symbol: String,
    pub arch: Arch,
    pub task_kind: OffloadedTaskKind,
    pub lir: LirFunction,
    pub tls_size: u32,
    pub bls_size: u32,
}

impl CompiledKernelData {
    pub fn instruction_count(&self) -> usize {
        self.lir.len()
    }
}
