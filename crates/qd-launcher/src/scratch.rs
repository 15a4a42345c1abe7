//! Per-launch scratch allocation: one device buffer per dispatched task,
//! sized `tls_size + bls_size` and laid out TLS region first (§4.4/§4.5).

use qd_codegen::CompiledKernelData;

use crate::device::{Device, DeviceAllocation};
use crate::error::LauncherError;

/// Allocates a task's combined thread-local/block-local scratch region.
/// Returns `None` without allocating when the task needs no scratch space,
/// so callers don't round-trip to the device for a zero-byte buffer.
pub fn allocate_scratch(device: &dyn Device, compiled: &CompiledKernelData) -> Result<Option<DeviceAllocation>, LauncherError> {
    let size = compiled.tls_size as usize + compiled.bls_size as usize;
    if size == 0 {
        return Ok(None);
    }
    Ok(Some(device.allocate(size)?))
}
