//! GLOSSA SPARQL - Query Execution
//!
//! The label engine only depends on [`QueryExecutor`]: given a query string,
//! asynchronously return RDF statements or fail. This crate defines that
//! contract and ships an HTTP implementation plus the N-Triples decoder it
//! uses for responses.

pub mod http;
pub mod ntriples;

pub use http::{HttpExecutorConfig, HttpQueryExecutor};
pub use ntriples::{parse_ntriples, parse_ntriples_bytes};

use async_trait::async_trait;
use glossa_core::{GlossaResult, Statement};
use std::sync::Arc;

/// Executes SPARQL CONSTRUCT queries.
///
/// Implementations must be thread-safe (Send + Sync). Failures are reported
/// as [`GlossaError::Transport`] or [`GlossaError::Parse`].
///
/// [`GlossaError::Transport`]: glossa_core::GlossaError::Transport
/// [`GlossaError::Parse`]: glossa_core::GlossaError::Parse
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a query and return the statements it produced.
    async fn execute(&self, query: &str) -> GlossaResult<Vec<Statement>>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    async fn execute(&self, query: &str) -> GlossaResult<Vec<Statement>> {
        (**self).execute(query).await
    }
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    async fn execute(&self, query: &str) -> GlossaResult<Vec<Statement>> {
        (**self).execute(query).await
    }
}
