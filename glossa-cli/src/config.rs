//! Configuration loading for the glossa CLI.
//!
//! Only `endpoint` is required. Every other field falls back to the
//! resolver and executor defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use glossa_core::{NamespaceRegistry, ResolverConfig};
use glossa_sparql::HttpExecutorConfig;
use serde::Deserialize;

pub const CONFIG_ENV_VAR: &str = "GLOSSA_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// SPARQL endpoint URL.
    pub endpoint: String,
    pub language: Option<String>,
    pub debounce_ms: Option<u64>,
    pub max_batch_size: Option<usize>,
    pub fetch_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub max_concurrent_requests: Option<usize>,
    /// Replaces the built-in extra prefixes when set.
    pub extra_prefixes: Option<Vec<String>>,
    /// Replaces the built-in namespace registry when set.
    pub namespaces: Option<Vec<NamespaceEntry>>,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceEntry {
    pub prefix: String,
    pub base: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or GLOSSA_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl CliConfig {
    /// Load from `explicit` if given, otherwise from `GLOSSA_CONFIG`.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(config_path_from_env)
            .ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "endpoint",
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_batch_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_batch_size",
                reason: "must be > 0".to_string(),
            });
        }
        if self.fetch_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "fetch_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.max_concurrent_requests == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_requests",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(namespaces) = &self.namespaces {
            if let Some(entry) = namespaces.iter().find(|n| n.base.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: "namespaces",
                    reason: format!("namespace '{}' has an empty base", entry.prefix),
                });
            }
        }
        Ok(())
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::default();
        if let Some(language) = &self.language {
            config = config.with_language(language.clone());
        }
        if let Some(ms) = self.debounce_ms {
            config = config.with_debounce_window(Duration::from_millis(ms));
        }
        if let Some(size) = self.max_batch_size {
            config = config.with_max_batch_size(size);
        }
        if let Some(ms) = self.fetch_timeout_ms {
            config = config.with_fetch_timeout(Some(Duration::from_millis(ms)));
        }
        if let Some(prefixes) = &self.extra_prefixes {
            config = config.with_extra_prefixes(prefixes.iter().cloned());
        }
        if let Some(namespaces) = &self.namespaces {
            config = config.with_namespaces(NamespaceRegistry::from_pairs(
                namespaces
                    .iter()
                    .map(|n| (n.prefix.clone(), n.base.clone())),
            ));
        }
        config
    }

    pub fn executor_config(&self) -> HttpExecutorConfig {
        let mut config = HttpExecutorConfig::new(self.endpoint.clone());
        if let Some(ms) = self.request_timeout_ms {
            config = config.with_request_timeout(Duration::from_millis(ms));
        }
        if let Some(max) = self.max_concurrent_requests {
            config = config.with_max_concurrent_requests(max);
        }
        config
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}
