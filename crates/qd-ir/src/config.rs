//! Configuration records consumed by every pass and by the cache/launcher.

use std::collections::HashMap;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Target architecture tag, carried in both `CompileConfig` and the on-disk
/// cache entry header.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Arch {
    Cpu,
    Cuda,
    Amdgpu,
    Vulkan,
    Metal,
}

/// Configuration consumed by every pass (§3 `CompileConfig`).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct CompileConfig {
    pub arch: Arch,
    pub fast_math: bool,
    pub opt_level: u8,
    pub debug: bool,
    pub offline_cache: bool,
    pub print_ir: bool,
    pub real_matrix_enabled: bool,
    pub default_cpu_block_dim: u32,
    pub default_gpu_block_dim: u32,
    pub num_cpu_threads: u32,
    pub use_cuda_graph: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        CompileConfig {
            arch: Arch::Cpu,
            fast_math: false,
            opt_level: 2,
            debug: false,
            offline_cache: true,
            print_ir: false,
            real_matrix_enabled: false,
            default_cpu_block_dim: 32,
            default_gpu_block_dim: 256,
            num_cpu_threads: num_cpus_fallback(),
            use_cuda_graph: false,
        }
    }
}

impl CompileConfig {
    /// The subset of fields that affect codegen output, encoded stably for
    /// mixing into the offline-cache fingerprint. Debug/print flags are
    /// deliberately excluded: two configs differing only in those must
    /// fingerprint identically (§8 round-trip law).
    pub fn cache_affecting_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(self.arch as u8);
        buf.push(self.fast_math as u8);
        buf.push(self.opt_level);
        buf.push(self.real_matrix_enabled as u8);
        buf.extend_from_slice(&self.default_cpu_block_dim.to_le_bytes());
        buf.extend_from_slice(&self.default_gpu_block_dim.to_le_bytes());
        buf.extend_from_slice(&self.num_cpu_threads.to_le_bytes());
        buf.push(self.use_cuda_graph as u8);
        buf
    }
}

fn num_cpus_fallback() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

/// A closed set of device-capability tags, each mapped to an integer level
/// (§3 `DeviceCapabilityConfig`). Grounded on the reference runtime's
/// `DeviceCapability`/`DeviceCapabilityConfig` pair (`contains`/`get`/`set`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum DeviceCapability {
    SharedMemorySize,
    ComputeCapabilityMajor,
    ComputeCapabilityMinor,
    SpirvHasInt64,
    SpirvHasFloat64,
    SpirvVersionMinor,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DeviceCapabilityConfig {
    devcaps: HashMap<DeviceCapability, u32>,
}

impl DeviceCapabilityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, cap: DeviceCapability) -> bool {
        self.devcaps.contains_key(&cap)
    }

    pub fn get(&self, cap: DeviceCapability) -> u32 {
        self.devcaps.get(&cap).copied().unwrap_or(0)
    }

    pub fn set(&mut self, cap: DeviceCapability, level: u32) {
        self.devcaps.insert(cap, level);
    }

    /// Stable, sorted byte encoding used as part of the cache fingerprint
    /// (`HashMap` iteration order is not stable, so callers must not hash
    /// `devcaps` directly).
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut entries: Vec<(DeviceCapability, u32)> =
            self.devcaps.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by_key(|(k, _)| format!("{k:?}"));
        let mut buf = Vec::new();
        for (k, v) in entries {
            buf.extend_from_slice(format!("{k:?}").as_bytes());
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }
}
