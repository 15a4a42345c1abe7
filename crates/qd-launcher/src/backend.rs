//! Host-backend selection. Only a CPU `Device`/`JitSession` pair is
//! implemented anywhere in this workspace (§1 scope boundary — no physical
//! GPU driver), so the default is always `Arch::Cpu`; this is still written
//! as a `cfg_if!` branch per platform, the way `wasmtime-jit` structures its
//! native-trampoline backend selection, so a later per-OS CPU codegen
//! difference (e.g. calling convention) has somewhere to go without
//! restructuring this function.

use cfg_if::cfg_if;
use qd_ir::Arch;

cfg_if! {
    if #[cfg(unix)] {
        pub fn default_host_arch() -> Arch {
            Arch::Cpu
        }
    } else {
        pub fn default_host_arch() -> Arch {
            Arch::Cpu
        }
    }
}
