//! GLOSSA Test Utilities
//!
//! Shared test infrastructure for the GLOSSA workspace:
//! - A scripted [`MockQueryExecutor`] that records every query
//! - Proptest generators for URIs, language tags and labels
//! - Fixtures for common datasets

pub use glossa_core::{vocab, GlossaError, GlossaResult, Label, Statement, Term};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use glossa_core::{ParseError, TransportError};
use glossa_sparql::QueryExecutor;
use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// MOCK EXECUTOR
// ============================================================================

static VALUES_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"VALUES \?uri \{([^}]*)\}").unwrap_or_else(|e| panic!("bad regex: {}", e))
});
static IRI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^>]+)>").unwrap_or_else(|e| panic!("bad regex: {}", e)));

/// URIs listed in the `VALUES ?uri { ... }` clause of a batch query.
pub fn extract_requested_uris(query: &str) -> Vec<String> {
    VALUES_BLOCK
        .captures(query)
        .and_then(|captures| captures.get(1))
        .map(|block| {
            IRI.captures_iter(block.as_str())
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// One query seen by [`MockQueryExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQuery {
    pub query: String,
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Transport,
    Parse,
    Hang,
}

/// In-memory [`QueryExecutor`] answering batch queries from a dataset.
///
/// Every query is recorded. Queries naming a URI registered through one of
/// the `*_when_requested` methods fail (or never finish) instead.
#[derive(Debug, Default)]
pub struct MockQueryExecutor {
    dataset: Mutex<HashMap<String, Vec<Statement>>>,
    failures: Mutex<HashMap<String, Failure>>,
    calls: Mutex<Vec<RecordedQuery>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockQueryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor answering from `statements`, grouped by subject.
    pub fn with_dataset(statements: impl IntoIterator<Item = Statement>) -> Self {
        let executor = Self::new();
        for statement in statements {
            executor.add_statement(statement);
        }
        executor
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn add_statement(&self, statement: Statement) {
        lock(&self.dataset)
            .entry(statement.subject.clone())
            .or_default()
            .push(statement);
    }

    /// Queries that include `uri` fail with a transport error.
    pub fn fail_when_requested(&self, uri: impl Into<String>) {
        lock(&self.failures).insert(uri.into(), Failure::Transport);
    }

    /// Queries that include `uri` fail with a parse error.
    pub fn fail_parse_when_requested(&self, uri: impl Into<String>) {
        lock(&self.failures).insert(uri.into(), Failure::Parse);
    }

    /// Queries that include `uri` never complete.
    pub fn hang_when_requested(&self, uri: impl Into<String>) {
        lock(&self.failures).insert(uri.into(), Failure::Hang);
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls(&self) -> Vec<RecordedQuery> {
        lock(&self.calls).clone()
    }

    /// Number of URIs per query, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        lock(&self.calls).iter().map(|call| call.uris.len()).collect()
    }

    /// Every URI requested so far, in call order.
    pub fn requested_uris(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .flat_map(|call| call.uris.iter().cloned())
            .collect()
    }

    /// Highest number of queries observed running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn failure_for(&self, uris: &[String]) -> Option<Failure> {
        let failures = lock(&self.failures);
        uris.iter().find_map(|uri| failures.get(uri).copied())
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueryExecutor for MockQueryExecutor {
    async fn execute(&self, query: &str) -> GlossaResult<Vec<Statement>> {
        let uris = extract_requested_uris(query);
        lock(&self.calls).push(RecordedQuery {
            query: query.to_string(),
            uris: uris.clone(),
        });
        let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.failure_for(&uris) {
            Some(Failure::Transport) => {
                return Err(GlossaError::Transport(TransportError::Status {
                    endpoint: "mock://sparql".to_string(),
                    status: 503,
                    message: "service unavailable".to_string(),
                }))
            }
            Some(Failure::Parse) => {
                return Err(GlossaError::Parse(ParseError::Syntax {
                    line: 1,
                    reason: "unexpected end of input".to_string(),
                }))
            }
            Some(Failure::Hang) => std::future::pending::<()>().await,
            None => {}
        }

        let dataset = lock(&self.dataset);
        Ok(uris
            .iter()
            .filter_map(|uri| dataset.get(uri))
            .flatten()
            .cloned()
            .collect())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use proptest::prelude::*;

    /// URIs under a default namespace or extra prefix.
    pub fn arb_eligible_uri() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Z]{3}".prop_map(|code| format!(
                "http://publications.europa.eu/resource/authority/country/{}",
                code
            )),
            "[0-9]{8}".prop_map(|code| format!("http://data.europa.eu/cpv/cpv/{}", code)),
            "[A-Za-z]{1,20}".prop_map(|name| format!("http://data.europa.eu/a4g/ontology#{}", name)),
            "[a-z]{1,12}".prop_map(|name| format!("http://www.w3.org/2004/02/skos/core#{}", name)),
        ]
    }

    /// URIs no default prefix matches.
    pub fn arb_ineligible_uri() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            "[a-z]{1,10}".prop_map(|host| format!("https://{}.example.org/resource", host)),
            "[a-z0-9]{1,16}".prop_map(|id| format!("urn:uuid:{}", id)),
            "[a-z ]{0,20}",
        ]
    }

    pub fn arb_language_tag() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("en".to_string()),
            Just("fr".to_string()),
            Just("de".to_string()),
            "[a-z]{2}-[A-Z]{2}",
        ]
    }

    pub fn arb_label() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z ,()-]{0,40}"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;

    /// `http://publications.europa.eu/resource/authority/{table}/{code}`
    pub fn authority_uri(table: &str, code: &str) -> String {
        format!(
            "http://publications.europa.eu/resource/authority/{}/{}",
            table, code
        )
    }

    /// `n` distinct eligible URIs.
    pub fn numbered_uris(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("http://data.europa.eu/cpv/cpv/{:08}", i))
            .collect()
    }

    pub fn pref_label(uri: &str, label: &str, language: Option<&str>) -> Statement {
        Statement::literal(uri, vocab::SKOS_PREF_LABEL, label, language)
    }

    pub fn rdfs_label(uri: &str, label: &str, language: Option<&str>) -> Statement {
        Statement::literal(uri, vocab::RDFS_LABEL, label, language)
    }

    /// English `skos:prefLabel` statements for each `(uri, label)` pair.
    pub fn labelled_dataset(pairs: &[(&str, &str)]) -> Vec<Statement> {
        pairs
            .iter()
            .map(|(uri, label)| pref_label(uri, label, Some("en")))
            .collect()
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// Assert that the mock saw exactly these batch sizes, in any order.
pub fn assert_batch_sizes(mock: &MockQueryExecutor, expected: &[usize]) {
    let mut actual = mock.batch_sizes();
    let mut expected = expected.to_vec();
    actual.sort_unstable();
    expected.sort_unstable();
    assert_eq!(actual, expected, "unexpected batch sizes");
}
