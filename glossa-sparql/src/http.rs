//! SPARQL-over-HTTP executor with bounded concurrency

use crate::ntriples::parse_ntriples;
use crate::QueryExecutor;
use async_trait::async_trait;
use glossa_core::{
    ConfigError, GlossaError, GlossaResult, ParseError, Statement, TransportError,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const NTRIPLES: &str = "application/n-triples";

/// Settings for [`HttpQueryExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpExecutorConfig {
    /// SPARQL endpoint URL.
    pub endpoint: String,
    /// Whole-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
    /// Maximum queries in flight at once.
    pub max_concurrent_requests: usize,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl HttpExecutorConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: Duration::from_secs(30),
            max_concurrent_requests: 8,
            user_agent: format!("glossa/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    fn validate(&self) -> GlossaResult<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(GlossaError::Config(ConfigError::InvalidValue {
                field: "endpoint".to_string(),
                value: self.endpoint.clone(),
                reason: "endpoint must be an http(s) URL".to_string(),
            }));
        }
        if self.max_concurrent_requests == 0 {
            return Err(GlossaError::Config(ConfigError::InvalidValue {
                field: "max_concurrent_requests".to_string(),
                value: "0".to_string(),
                reason: "max_concurrent_requests must be greater than 0".to_string(),
            }));
        }
        Ok(())
    }
}

/// Executes queries by POSTing them form-encoded to a SPARQL endpoint and
/// decoding the N-Triples response.
pub struct HttpQueryExecutor {
    client: Client,
    endpoint: String,
    request_timeout: Duration,
    limiter: Arc<Semaphore>,
}

impl HttpQueryExecutor {
    /// Create a new executor.
    pub fn new(config: HttpExecutorConfig) -> GlossaResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                GlossaError::Transport(TransportError::Unavailable {
                    reason: format!("failed to build HTTP client: {}", e),
                })
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint,
            request_timeout: config.request_timeout,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_requests)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_failed(&self, reason: impl Into<String>) -> GlossaError {
        GlossaError::Transport(TransportError::RequestFailed {
            endpoint: self.endpoint.clone(),
            reason: reason.into(),
        })
    }
}

#[async_trait]
impl QueryExecutor for HttpQueryExecutor {
    async fn execute(&self, query: &str) -> GlossaResult<Vec<Statement>> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| self.request_failed(format!("rate limiter closed: {}", e)))?;

        tracing::debug!(endpoint = %self.endpoint, query_len = query.len(), "executing SPARQL query");

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, NTRIPLES)
            .form(&[("query", query)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GlossaError::Transport(TransportError::Timeout {
                        elapsed: self.request_timeout,
                    })
                } else {
                    self.request_failed(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GlossaError::Transport(TransportError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                message,
            }));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);
        if let Some(content_type) = content_type {
            if !is_ntriples_compatible(&content_type) {
                return Err(GlossaError::Parse(ParseError::UnsupportedContentType {
                    content_type,
                }));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.request_failed(format!("failed to read body: {}", e)))?;
        let statements = parse_ntriples(&body)?;
        tracing::trace!(count = statements.len(), "decoded statements");
        Ok(statements)
    }
}

fn is_ntriples_compatible(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    matches!(
        mime,
        "application/n-triples" | "text/plain" | "text/ntriples" | "application/octet-stream"
    )
}

impl std::fmt::Debug for HttpQueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpQueryExecutor")
            .field("endpoint", &self.endpoint)
            .field("available_permits", &self.limiter.available_permits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(HttpExecutorConfig::new("ftp://example.org").validate().is_err());
        assert!(HttpExecutorConfig::new("https://example.org/sparql")
            .with_max_concurrent_requests(0)
            .validate()
            .is_err());
        assert!(HttpExecutorConfig::new("https://example.org/sparql")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_content_type_check() {
        assert!(is_ntriples_compatible("application/n-triples; charset=utf-8"));
        assert!(is_ntriples_compatible("text/plain"));
        assert!(!is_ntriples_compatible("text/html"));
        assert!(!is_ntriples_compatible("application/sparql-results+json"));
    }

    #[test]
    fn test_executor_construction() {
        let executor = HttpQueryExecutor::new(
            HttpExecutorConfig::new("https://publications.europa.eu/webapi/rdf/sparql")
                .with_max_concurrent_requests(2)
                .with_request_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(
            executor.endpoint(),
            "https://publications.europa.eu/webapi/rdf/sparql"
        );
        assert!(format!("{:?}", executor).contains("available_permits: 2"));
    }
}
