//! Resolver configuration

use crate::namespace::{EligiblePrefixSet, NamespaceRegistry, EXTRA_PREFIXES};
use crate::{ConfigError, GlossaError, GlossaResult};
use std::time::Duration;

/// Distinct pending URIs that trigger an immediate flush, and the sub-batch size.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;

/// Quiet period after the last request before pending URIs are flushed.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Language tag preferred when picking labels.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Upper bound on a single sub-batch query.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a label resolver. Fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Known namespaces; their base IRIs are eligible prefixes.
    pub namespaces: NamespaceRegistry,
    /// Prefixes eligible in addition to the registry.
    pub extra_prefixes: Vec<String>,
    /// Debounce window for time-triggered flushes.
    pub debounce_window: Duration,
    /// Size threshold for immediate flushes and the sub-batch chunk size.
    pub max_batch_size: usize,
    /// Preferred language tag (compared case-insensitively).
    pub language: String,
    /// Per-sub-batch timeout. `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            namespaces: NamespaceRegistry::default_registry(),
            extra_prefixes: EXTRA_PREFIXES.iter().map(|p| p.to_string()).collect(),
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            language: DEFAULT_LANGUAGE.to_string(),
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

impl ResolverConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the namespace registry.
    pub fn with_namespaces(mut self, namespaces: NamespaceRegistry) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Replace the extra eligible prefixes.
    pub fn with_extra_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the debounce window.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Set the batch size.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Set the preferred language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set or disable the fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Build the eligible prefix set from the registry and extra prefixes.
    pub fn eligible_prefixes(&self) -> EligiblePrefixSet {
        EligiblePrefixSet::new(
            &self.namespaces,
            self.extra_prefixes.iter().map(String::as_str),
        )
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - max_batch_size > 0
    /// - language is a non-empty tag without whitespace or quotes
    /// - fetch_timeout, when set, is positive
    /// - at least one eligible prefix exists
    pub fn validate(&self) -> GlossaResult<()> {
        if self.max_batch_size == 0 {
            return Err(GlossaError::Config(ConfigError::InvalidValue {
                field: "max_batch_size".to_string(),
                value: self.max_batch_size.to_string(),
                reason: "max_batch_size must be greater than 0".to_string(),
            }));
        }

        if self.language.trim().is_empty() {
            return Err(GlossaError::Config(ConfigError::MissingRequired {
                field: "language".to_string(),
            }));
        }

        if !self
            .language
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(GlossaError::Config(ConfigError::InvalidValue {
                field: "language".to_string(),
                value: self.language.clone(),
                reason: "language must be a BCP 47 tag (letters, digits, '-')".to_string(),
            }));
        }

        if let Some(timeout) = self.fetch_timeout {
            if timeout.is_zero() {
                return Err(GlossaError::Config(ConfigError::InvalidValue {
                    field: "fetch_timeout".to_string(),
                    value: format!("{:?}", timeout),
                    reason: "fetch_timeout must be positive".to_string(),
                }));
            }
        }

        if self.eligible_prefixes().is_empty() {
            return Err(GlossaError::Config(ConfigError::MissingRequired {
                field: "namespaces".to_string(),
            }));
        }

        Ok(())
    }
}
