//! Content-addressed cache key (§4.7 "keyed by a content hash of the IR and
//! configuration"): wraps `qd_analysis::offline_cache_key`, mixing in the
//! codegen-affecting subset of `CompileConfig` plus caller-supplied device
//! capability bytes, and hex-encodes the digest into the string form
//! `qd_cache::CacheManager` keys entries by.

use qd_ir::{CompileConfig, KernelIr, SNodeTree};

/// Fingerprints `ir` (rooted against every tree in `snode_trees`) together
/// with `config`'s cache-affecting fields and `device_caps_bytes` (an
/// embedder-supplied encoding of `DeviceCapabilityConfig`, since its exact
/// byte layout is a policy decision this crate does not impose).
pub fn fingerprint_kernel(ir: &KernelIr, snode_trees: &[&SNodeTree], config: &CompileConfig, device_caps_bytes: &[u8]) -> String {
    let mut extra = config.cache_affecting_bytes();
    extra.extend_from_slice(device_caps_bytes);
    let digest = qd_analysis::offline_cache_key(ir, snode_trees, &extra);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
