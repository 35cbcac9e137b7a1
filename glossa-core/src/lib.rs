//! GLOSSA Core - Shared Types
//!
//! Data types shared by the GLOSSA crates: cached label states, RDF
//! statements, the namespace registry, resolver configuration and errors.
//! This crate performs no I/O.

mod config;
mod error;
mod namespace;
mod statement;

pub use config::{
    ResolverConfig, DEFAULT_DEBOUNCE_WINDOW, DEFAULT_FETCH_TIMEOUT, DEFAULT_LANGUAGE,
    DEFAULT_MAX_BATCH_SIZE,
};
pub use error::{ConfigError, GlossaError, GlossaResult, ParseError, TransportError};
pub use namespace::{EligiblePrefixSet, Namespace, NamespaceRegistry, EXTRA_PREFIXES};
pub use statement::{Statement, Term};

use serde::{Deserialize, Serialize};

// ============================================================================
// LABEL TYPES
// ============================================================================

/// A resolved label as handed to subscribers. `None` means the URI was
/// checked and has no usable label.
pub type Label = Option<String>;

/// Terminal cache state of a URI.
///
/// A URI with no cache entry at all is *unknown* and may still be fetched;
/// `Absent` is a negative-cache entry and is never fetched again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "label", rename_all = "snake_case")]
pub enum CachedLabel {
    Label(String),
    Absent,
}

impl CachedLabel {
    pub fn as_label(&self) -> Option<&str> {
        match self {
            CachedLabel::Label(label) => Some(label),
            CachedLabel::Absent => None,
        }
    }

    pub fn into_label(self) -> Label {
        match self {
            CachedLabel::Label(label) => Some(label),
            CachedLabel::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, CachedLabel::Absent)
    }
}

impl From<Label> for CachedLabel {
    fn from(label: Label) -> Self {
        match label {
            Some(label) => CachedLabel::Label(label),
            None => CachedLabel::Absent,
        }
    }
}

// ============================================================================
// VOCABULARY
// ============================================================================

/// Predicate IRIs consulted when picking a label.
pub mod vocab {
    pub const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";
    pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
    pub const SKOS_PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
}
