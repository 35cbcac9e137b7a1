//! GLOSSA Resolver - Batched Label Resolution
//!
//! Resolves RDF resource URIs to display labels. Requests are filtered by
//! namespace, answered from a never-evicted cache when possible, and
//! otherwise coalesced into batches that are fetched with one query per
//! sub-batch.
//!
//! ```no_run
//! use std::sync::Arc;
//! use glossa_core::ResolverConfig;
//! use glossa_resolver::LabelResolver;
//! use glossa_sparql::{HttpExecutorConfig, HttpQueryExecutor};
//!
//! # async fn run() -> glossa_core::GlossaResult<()> {
//! let executor = HttpQueryExecutor::new(HttpExecutorConfig::new(
//!     "https://publications.europa.eu/webapi/rdf/sparql",
//! ))?;
//! let resolver = LabelResolver::new(Arc::new(executor), ResolverConfig::default())?;
//! let label = resolver
//!     .resolve("http://publications.europa.eu/resource/authority/country/BEL")
//!     .await;
//! println!("{:?}", label);
//! # Ok(())
//! # }
//! ```

mod fetcher;
mod resolver;
mod scheduler;
mod subscription;

pub use fetcher::{build_batch_query, parse_results, LabelFetcher};
pub use resolver::{LabelResolver, RequestHandle, ResolverInspection, INSPECTION_SAMPLE_LIMIT};
pub use scheduler::CancelToken;
pub use subscription::{LabelSubscription, LabelsSnapshot, LabelsSubscription, SubscriptionState};
