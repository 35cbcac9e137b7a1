//! Batch label fetcher.
//!
//! Turns one sub-batch of URIs into a single CONSTRUCT query, runs it
//! through the injected [`QueryExecutor`], and picks one label per URI.
//! Failures never escape [`LabelFetcher::fetch_batch`]: they become absent
//! labels for the URIs of that sub-batch.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use glossa_core::{
    vocab, GlossaError, GlossaResult, Label, Statement, TransportError,
};
use glossa_sparql::QueryExecutor;

/// Fetches labels for sub-batches of URIs.
#[derive(Clone)]
pub struct LabelFetcher {
    executor: Arc<dyn QueryExecutor>,
    language: String,
    timeout: Option<Duration>,
}

impl LabelFetcher {
    /// `language` is the preferred tag; `timeout` bounds each sub-batch.
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        language: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            executor,
            language: language.into().to_ascii_lowercase(),
            timeout,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Build the CONSTRUCT query for `uris`.
    ///
    /// URIs that cannot appear inside `<...>` are left out; they resolve
    /// to absent like any URI the endpoint knows nothing about.
    pub fn build_batch_query(&self, uris: &[String]) -> String {
        build_batch_query(uris, &self.language)
    }

    /// Execute the batch query and return the raw statements.
    pub async fn execute_batch(&self, uris: &[String]) -> GlossaResult<Vec<Statement>> {
        if !uris.iter().any(|uri| is_writable_iri(uri)) {
            return Ok(Vec::new());
        }
        let query = self.build_batch_query(uris);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.executor.execute(&query))
                .await
                .map_err(|_| GlossaError::Transport(TransportError::Timeout { elapsed: limit }))?,
            None => self.executor.execute(&query).await,
        }
    }

    /// Pick a label for every requested URI.
    pub fn parse_results(&self, statements: &[Statement], requested: &[String]) -> HashMap<String, Label> {
        parse_results(statements, requested, &self.language)
    }

    /// Execute and parse one sub-batch. Transport, parse and timeout
    /// failures are logged and yield `None` for every URI in `uris`.
    pub async fn fetch_batch(&self, uris: &[String]) -> HashMap<String, Label> {
        match self.execute_batch(uris).await {
            Ok(statements) => return self.parse_results(&statements, uris),
            Err(error) if error.is_fetch_failure() => tracing::warn!(
                error = %error,
                uris = uris.len(),
                "label batch failed, caching its uris as absent"
            ),
            Err(error) => tracing::error!(
                error = %error,
                uris = uris.len(),
                "label batch could not run, caching its uris as absent"
            ),
        }
        uris.iter().map(|uri| (uri.clone(), None)).collect()
    }
}

impl std::fmt::Debug for LabelFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelFetcher")
            .field("language", &self.language)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// True if `uri` can be written as a SPARQL IRIREF without escaping.
fn is_writable_iri(uri: &str) -> bool {
    !uri.is_empty()
        && !uri
            .chars()
            .any(|c| c <= ' ' || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\'))
}

/// CONSTRUCT query asking for `skos:prefLabel@language`, `rdfs:label@language`
/// and untagged `rdfs:label` of every writable URI.
pub fn build_batch_query(uris: &[String], language: &str) -> String {
    let mut values = String::new();
    for uri in uris.iter().filter(|uri| is_writable_iri(uri)) {
        if !values.is_empty() {
            values.push(' ');
        }
        let _ = write!(values, "<{}>", uri);
    }
    let language = language.to_ascii_lowercase();
    format!(
        r#"PREFIX skos: <{skos}>
PREFIX rdfs: <{rdfs}>

CONSTRUCT {{
  ?uri skos:prefLabel ?prefLabel .
  ?uri rdfs:label ?label .
}}
WHERE {{
  VALUES ?uri {{ {values} }}
  {{
    ?uri skos:prefLabel ?prefLabel .
    FILTER (LCASE(lang(?prefLabel)) = "{language}")
  }}
  UNION
  {{
    ?uri rdfs:label ?label .
    FILTER (LCASE(lang(?label)) = "{language}")
  }}
  UNION
  {{
    ?uri rdfs:label ?label .
    FILTER (lang(?label) = "")
  }}
}}"#,
        skos = vocab::SKOS,
        rdfs = vocab::RDFS,
        values = values,
        language = language,
    )
}

#[derive(Default)]
struct Candidates<'a> {
    pref_label: Option<&'a str>,
    label_in_language: Option<&'a str>,
    label_untagged: Option<&'a str>,
}

impl<'a> Candidates<'a> {
    fn best(&self) -> Option<&'a str> {
        self.pref_label
            .or(self.label_in_language)
            .or(self.label_untagged)
    }
}

/// Resolve each requested URI to its best label.
///
/// Priority: `skos:prefLabel` in `language`, then `rdfs:label` in
/// `language`, then untagged `rdfs:label`. Empty literals never count as
/// a label. Within a tier the first statement wins. Requested URIs without a matching statement map to
/// `None`; statements about other subjects are ignored.
pub fn parse_results(
    statements: &[Statement],
    requested: &[String],
    language: &str,
) -> HashMap<String, Label> {
    let mut candidates: HashMap<&str, Candidates<'_>> = requested
        .iter()
        .map(|uri| (uri.as_str(), Candidates::default()))
        .collect();

    for statement in statements {
        let Some(entry) = candidates.get_mut(statement.subject.as_str()) else {
            continue;
        };
        let Some(value) = statement.object.literal_value().filter(|v| !v.is_empty()) else {
            continue;
        };
        let tag = statement.object.language();
        let in_language = tag.is_some_and(|t| t.eq_ignore_ascii_case(language));

        let slot = match statement.predicate.as_str() {
            vocab::SKOS_PREF_LABEL if in_language => &mut entry.pref_label,
            vocab::RDFS_LABEL if in_language => &mut entry.label_in_language,
            vocab::RDFS_LABEL if tag.is_none() => &mut entry.label_untagged,
            _ => continue,
        };
        slot.get_or_insert(value);
    }

    requested
        .iter()
        .map(|uri| {
            let label = candidates
                .get(uri.as_str())
                .and_then(Candidates::best)
                .map(str::to_string);
            (uri.clone(), label)
        })
        .collect()
}
