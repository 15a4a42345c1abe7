//! Argument marshaling: turning the caller's Rust-side kernel arguments into
//! the flat byte buffer a compiled task reads through `arg_buffer` (§4.8).
//! Grounded on `quadrants::program::launch_context_builder.h`'s
//! scalar/pointer argument slots, simplified to a fixed 8-byte slot per
//! argument (every scalar this IR models — i32/i64/f32/f64 — fits in 8
//! bytes, and a device address is a `u64`).

use crate::device::DeviceAllocation;

pub const ARG_SLOT_SIZE: usize = 8;

/// One value to marshal into the argument buffer.
#[derive(Copy, Clone, Debug)]
pub enum ScalarValue {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl ScalarValue {
    fn to_le_bytes(self) -> [u8; ARG_SLOT_SIZE] {
        let mut buf = [0u8; ARG_SLOT_SIZE];
        match self {
            ScalarValue::I32(v) => buf[..4].copy_from_slice(&v.to_le_bytes()),
            ScalarValue::U32(v) => buf[..4].copy_from_slice(&v.to_le_bytes()),
            ScalarValue::F32(v) => buf[..4].copy_from_slice(&v.to_le_bytes()),
            ScalarValue::I64(v) => buf.copy_from_slice(&v.to_le_bytes()),
            ScalarValue::U64(v) => buf.copy_from_slice(&v.to_le_bytes()),
            ScalarValue::F64(v) => buf.copy_from_slice(&v.to_le_bytes()),
        }
        buf
    }
}

/// A launch argument: either a value to copy in by bytes, or a prior
/// [`DeviceAllocation`] whose address is passed through (e.g. the argument
/// is a pointer into an already-resident field/array).
#[derive(Copy, Clone, Debug)]
pub enum LaunchArg {
    Scalar(ScalarValue),
    DeviceAllocation(DeviceAllocation),
}

/// Encodes `args` into one flat little-endian byte buffer, one
/// [`ARG_SLOT_SIZE`]-byte slot per argument in order, matching the slot
/// layout a `CpuCodeGen`-lowered `KernelArg` read expects.
pub fn resolve_args(args: &[LaunchArg]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(args.len() * ARG_SLOT_SIZE);
    for arg in args {
        match arg {
            LaunchArg::Scalar(v) => bytes.extend_from_slice(&v.to_le_bytes()),
            LaunchArg::DeviceAllocation(alloc) => bytes.extend_from_slice(&alloc.address.0.to_le_bytes()),
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceAddress;

    #[test]
    fn scalars_are_packed_into_fixed_slots() {
        let args = vec![
            LaunchArg::Scalar(ScalarValue::I32(-1)),
            LaunchArg::Scalar(ScalarValue::F64(2.5)),
        ];
        let bytes = resolve_args(&args);
        assert_eq!(bytes.len(), 2 * ARG_SLOT_SIZE);
        assert_eq!(&bytes[0..4], &(-1i32).to_le_bytes());
        assert_eq!(&bytes[8..16], &2.5f64.to_le_bytes());
    }

    #[test]
    fn device_allocation_arg_passes_through_its_address() {
        let alloc = DeviceAllocation { address: DeviceAddress(0x1234), size: 64 };
        let bytes = resolve_args(&[LaunchArg::DeviceAllocation(alloc)]);
        assert_eq!(bytes, 0x1234u64.to_le_bytes());
    }
}
