//! Write-once label cache.
//!
//! The cache distinguishes three states per URI:
//!
//! - no entry: unknown, a fetch may be scheduled
//! - [`CachedLabel::Label`]: resolved with a label
//! - [`CachedLabel::Absent`]: resolved, known to have no label
//!
//! There is no TTL and no eviction. Entries only disappear through
//! [`LabelStore::clear`].
//!
//! [`CachedLabel::Label`]: glossa_core::CachedLabel::Label
//! [`CachedLabel::Absent`]: glossa_core::CachedLabel::Absent

pub mod memory;
pub mod traits;

pub use memory::InMemoryLabelCache;
pub use traits::{CacheStats, LabelStore};
