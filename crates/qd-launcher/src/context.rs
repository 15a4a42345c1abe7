//! `RuntimeContext`: the struct every compiled task body is handed as its
//! first argument, mirroring `quadrants::RuntimeContext` from
//! `program/context.h`. Field order is load-bearing — a backend's lowered
//! function body indexes into it by offset, so it is `#[repr(C)]` and the
//! declared field order must never change without re-grounding every
//! backend that reads it.

use crate::device::DeviceAddress;

/// A device-side address. Opaque on purpose: `qd-launcher` never dereferences
/// host or device pointers itself, it only hands addresses to a [`Device`]
/// implementation, which is the only thing that knows how to resolve them
/// for its backend (raw pointer, CUDA device pointer, Vulkan buffer offset...).
///
/// [`Device`]: crate::device::Device
#[repr(C)]
#[derive(Clone, Debug)]
pub struct RuntimeContext {
    /// Handle to backend-global runtime state (allocator, profiler, RNG
    /// state...), obtained once per [`Device`](crate::device::Device) via
    /// `Device::runtime_handle`.
    pub runtime: DeviceAddress,
    /// Base address of this launch's argument buffer.
    pub arg_buffer: DeviceAddress,
    /// Base address of this launch's result buffer.
    pub result_buffer: DeviceAddress,
    /// CPU backends bind one context per worker thread; GPU backends leave
    /// this at `0`.
    pub cpu_thread_id: i32,
    /// Base address of this task's scratch region: `tls_size + bls_size`
    /// bytes, laid out TLS first then BLS, allocated per-launch by
    /// [`crate::scratch::allocate_scratch`].
    pub extra: DeviceAddress,
}

impl RuntimeContext {
    pub fn new(runtime: DeviceAddress, arg_buffer: DeviceAddress, result_buffer: DeviceAddress, scratch: DeviceAddress) -> Self {
        RuntimeContext {
            runtime,
            arg_buffer,
            result_buffer,
            cpu_thread_id: 0,
            extra: scratch,
        }
    }

    pub fn with_cpu_thread_id(mut self, id: i32) -> Self {
        self.cpu_thread_id = id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_order_is_stable() {
        let ctx = RuntimeContext::new(DeviceAddress(1), DeviceAddress(2), DeviceAddress(3), DeviceAddress(4))
            .with_cpu_thread_id(7);
        assert_eq!(ctx.runtime, DeviceAddress(1));
        assert_eq!(ctx.arg_buffer, DeviceAddress(2));
        assert_eq!(ctx.result_buffer, DeviceAddress(3));
        assert_eq!(ctx.cpu_thread_id, 7);
        assert_eq!(ctx.extra, DeviceAddress(4));
    }
}
