//! Error types for the CLI.

use crate::config::ConfigError;
use glossa_core::GlossaError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Glossa(#[from] GlossaError),
    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("Invalid arguments: {0}")]
    Usage(String),
}
