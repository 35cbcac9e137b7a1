//! GLOSSA Storage - Label Cache
//!
//! Holds resolved labels and negative-cache markers for the lifetime of a
//! resolver. Entries are write-once: the first resolution of a URI is final.

pub mod cache;

pub use cache::{CacheStats, InMemoryLabelCache, LabelStore};
