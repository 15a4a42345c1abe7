//! Pluggable cleaner policies (§4.7 "Eviction"): given the current
//! metadata map and a byte budget, decide which fingerprints to drop.
//! Pure selection logic — `CacheManager::evict` is what actually removes
//! files and rewrites the metadata.

use std::collections::HashMap;

use crate::format::CacheEntryMetadata;

pub trait EvictionPolicy {
    /// Returns fingerprints to remove so that the remaining total size is
    /// at or under `budget_bytes`. An empty result means nothing needs to
    /// go.
    fn select_for_eviction(
        &self,
        entries: &HashMap<String, CacheEntryMetadata>,
        budget_bytes: u64,
    ) -> Vec<String>;
}

/// Evicts least-recently-used entries first until the remaining total
/// fits the budget.
pub struct LruEviction;

impl EvictionPolicy for LruEviction {
    fn select_for_eviction(
        &self,
        entries: &HashMap<String, CacheEntryMetadata>,
        budget_bytes: u64,
    ) -> Vec<String> {
        let mut total: u64 = entries.values().map(|m| m.size).sum();
        if total <= budget_bytes {
            return Vec::new();
        }
        let mut ordered: Vec<(&String, &CacheEntryMetadata)> = entries.iter().collect();
        ordered.sort_by_key(|(_, m)| m.last_used_at);

        let mut victims = Vec::new();
        for (fingerprint, meta) in ordered {
            if total <= budget_bytes {
                break;
            }
            victims.push(fingerprint.clone());
            total = total.saturating_sub(meta.size);
        }
        victims
    }
}

/// Evicts the largest entries first until the remaining total fits the
/// budget — useful when a handful of oversized kernels dominate usage
/// regardless of recency.
pub struct SizeBoundEviction;

impl EvictionPolicy for SizeBoundEviction {
    fn select_for_eviction(
        &self,
        entries: &HashMap<String, CacheEntryMetadata>,
        budget_bytes: u64,
    ) -> Vec<String> {
        let mut total: u64 = entries.values().map(|m| m.size).sum();
        if total <= budget_bytes {
            return Vec::new();
        }
        let mut ordered: Vec<(&String, &CacheEntryMetadata)> = entries.iter().collect();
        ordered.sort_by_key(|(_, m)| std::cmp::Reverse(m.size));

        let mut victims = Vec::new();
        for (fingerprint, meta) in ordered {
            if total <= budget_bytes {
                break;
            }
            victims.push(fingerprint.clone());
            total = total.saturating_sub(meta.size);
        }
        victims
    }
}
