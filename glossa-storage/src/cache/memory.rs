//! In-memory label store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use glossa_core::{CachedLabel, Label};

use super::traits::{CacheStats, LabelStore};

/// Unbounded, never-evicting label cache. Thread-safe via RwLock.
#[derive(Default)]
pub struct InMemoryLabelCache {
    entries: RwLock<HashMap<String, CachedLabel>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryLabelCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LabelStore for InMemoryLabelCache {
    fn get(&self, uri: &str) -> Option<CachedLabel> {
        let found = self.peek(uri);
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    fn peek(&self, uri: &str) -> Option<CachedLabel> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(uri).cloned())
    }

    fn set(&self, uri: &str, label: Label) -> CachedLabel {
        let candidate = CachedLabel::from(label);
        let Ok(mut entries) = self.entries.write() else {
            tracing::error!(uri, "label cache lock poisoned, entry not stored");
            return candidate;
        };
        if let Some(existing) = entries.get(uri) {
            if *existing != candidate {
                tracing::debug!(uri, "ignoring second resolution of an already cached uri");
            }
            return existing.clone();
        }
        entries.insert(uri.to_string(), candidate.clone());
        candidate
    }

    fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    fn stats(&self) -> CacheStats {
        let (labelled, absent) = self
            .entries
            .read()
            .map(|entries| {
                entries.values().fold((0u64, 0u64), |(l, a), entry| match entry {
                    CachedLabel::Label(_) => (l + 1, a),
                    CachedLabel::Absent => (l, a + 1),
                })
            })
            .unwrap_or((0, 0));
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            labelled,
            absent,
        }
    }

    fn snapshot(&self) -> BTreeMap<String, CachedLabel> {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for InMemoryLabelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLabelCache")
            .field("entries", &self.len())
            .finish()
    }
}
