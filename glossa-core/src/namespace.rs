//! Namespace registry and the eligible prefix set derived from it.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Prefixes that are always eligible even though they are not registered
/// namespaces (authority tables and the CPV vocabulary).
pub const EXTRA_PREFIXES: &[&str] = &[
    "http://publications.europa.eu/resource/authority/",
    "http://data.europa.eu/cpv",
];

static DEFAULT_NAMESPACES: Lazy<NamespaceRegistry> = Lazy::new(|| {
    NamespaceRegistry::from_pairs([
        ("epo", "http://data.europa.eu/a4g/ontology#"),
        ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
        ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
        ("skos", "http://www.w3.org/2004/02/skos/core#"),
        ("xsd", "http://www.w3.org/2001/XMLSchema#"),
        ("adms", "http://www.w3.org/ns/adms#"),
        ("dct", "http://purl.org/dc/terms/"),
        ("org", "http://www.w3.org/ns/org#"),
        ("foaf", "http://xmlns.com/foaf/0.1/"),
        ("locn", "http://www.w3.org/ns/locn#"),
        ("cccev", "http://data.europa.eu/m8g/"),
        ("owl", "http://www.w3.org/2002/07/owl#"),
        ("time", "http://www.w3.org/2006/time#"),
    ])
});

/// A registered namespace: short prefix name and base IRI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub prefix: String,
    pub base: String,
}

/// Ordered set of namespaces known to the application.
///
/// Registering a prefix name twice replaces the earlier base IRI in place,
/// keeping the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRegistry {
    namespaces: Vec<Namespace>,
}

impl NamespaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The vocabularies used by procurement notice data (eProcurement
    /// ontology plus the W3C/DCMI vocabularies it builds on).
    pub fn default_registry() -> Self {
        DEFAULT_NAMESPACES.clone()
    }

    /// Build a registry from `(prefix, base)` pairs.
    pub fn from_pairs<I, P, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<String>,
    {
        let mut registry = Self::new();
        for (prefix, base) in pairs {
            registry.insert(prefix, base);
        }
        registry
    }

    /// Register a namespace.
    pub fn insert(&mut self, prefix: impl Into<String>, base: impl Into<String>) {
        let prefix = prefix.into();
        let base = base.into();
        match self.namespaces.iter_mut().find(|ns| ns.prefix == prefix) {
            Some(existing) => existing.base = base,
            None => self.namespaces.push(Namespace { prefix, base }),
        }
    }

    /// Look up the base IRI for a prefix name.
    pub fn base_for(&self, prefix: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|ns| ns.prefix == prefix)
            .map(|ns| ns.base.as_str())
    }

    /// Expand a compact `prefix:local` name into a full IRI.
    pub fn expand(&self, curie: &str) -> Option<String> {
        let (prefix, local) = curie.split_once(':')?;
        self.base_for(prefix).map(|base| format!("{}{}", base, local))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.iter()
    }

    /// Base IRIs in registration order.
    pub fn base_uris(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(|ns| ns.base.as_str())
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

/// Immutable set of URI prefixes for which label resolution is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligiblePrefixSet {
    prefixes: Vec<String>,
}

impl EligiblePrefixSet {
    /// Registry base IRIs followed by the extra prefixes. Empty strings are
    /// dropped (an empty prefix would make every URI eligible) and
    /// duplicates collapse to their first occurrence.
    pub fn new<'a, I>(registry: &'a NamespaceRegistry, extra: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut prefixes: Vec<String> = Vec::new();
        for prefix in registry.base_uris().chain(extra) {
            if !prefix.is_empty() && !prefixes.iter().any(|p| p == prefix) {
                prefixes.push(prefix.to_string());
            }
        }
        Self { prefixes }
    }

    /// True iff `uri` is non-empty and starts with a known prefix.
    pub fn is_eligible(&self, uri: &str) -> bool {
        !uri.is_empty() && self.prefixes.iter().any(|prefix| uri.starts_with(prefix.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }
}
