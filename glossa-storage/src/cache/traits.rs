//! Label store trait and cache statistics.

use glossa_core::{CachedLabel, Label};
use serde::Serialize;
use std::collections::BTreeMap;

/// Store for resolved labels.
///
/// Reads are synchronous: the resolver consults the store before it
/// registers a pending request, so a lookup must never wait on I/O.
/// Implementations must be thread-safe.
///
/// # Write-once contract
///
/// [`set`](LabelStore::set) only records the first value written for a URI.
/// Later writes leave the stored entry untouched and return it, so every
/// caller sees the same value for a URI for as long as the store lives.
pub trait LabelStore: Send + Sync {
    /// Look up a URI. `None` means unknown (never resolved).
    fn get(&self, uri: &str) -> Option<CachedLabel>;

    /// Like [`get`](LabelStore::get) but not counted in [`CacheStats`].
    fn peek(&self, uri: &str) -> Option<CachedLabel>;

    /// Record a resolution and return the canonical stored entry.
    fn set(&self, uri: &str, label: Label) -> CachedLabel;

    /// Number of resolved URIs (labelled and absent).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and reset statistics.
    fn clear(&self);

    /// Current statistics.
    fn stats(&self) -> CacheStats;

    /// Copy of all entries, ordered by URI.
    fn snapshot(&self) -> BTreeMap<String, CachedLabel>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries holding a label.
    pub labelled: u64,
    /// Negative-cache entries.
    pub absent: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.labelled + self.absent
    }
}
