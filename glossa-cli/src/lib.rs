//! GLOSSA CLI - Label Lookup
//!
//! Resolves the URIs given on the command line against a configured SPARQL
//! endpoint and prints a JSON object mapping each URI to its label, or
//! `null` when it has none.

pub mod args;
pub mod config;
pub mod error;
pub mod telemetry;

use std::collections::BTreeMap;
use std::sync::Arc;

use glossa_core::Label;
use glossa_resolver::{LabelResolver, ResolverInspection};
use glossa_sparql::{HttpQueryExecutor, QueryExecutor};

use crate::config::CliConfig;
use crate::error::CliError;

/// Output of one CLI run.
#[derive(Debug)]
pub struct Lookup {
    pub labels: BTreeMap<String, Label>,
    pub inspection: ResolverInspection,
}

/// Resolve `uris` with an executor built from `config`.
pub async fn lookup(config: &CliConfig, uris: &[String]) -> Result<Lookup, CliError> {
    let executor = HttpQueryExecutor::new(config.executor_config())?;
    lookup_with(Arc::new(executor), config, uris).await
}

/// Resolve `uris` through `executor`.
pub async fn lookup_with(
    executor: Arc<dyn QueryExecutor>,
    config: &CliConfig,
    uris: &[String],
) -> Result<Lookup, CliError> {
    let resolver = LabelResolver::new(executor, config.resolver_config())?;
    let ineligible = uris.iter().filter(|uri| !resolver.is_eligible(uri)).count();
    if ineligible > 0 {
        tracing::info!(ineligible, "some URIs are outside the known namespaces");
    }
    let labels = resolver.resolve_many(uris).await.into_iter().collect();
    Ok(Lookup {
        labels,
        inspection: resolver.inspect(),
    })
}
