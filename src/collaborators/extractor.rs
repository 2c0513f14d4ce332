//! Extraction collaborator interface
//!
//! Defines the narrow contract the extraction worker calls through, plus the
//! production HTTP implementation. The error kinds drive the worker's retry
//! decision: transient failures are retried with capped backoff inside a
//! single job execution, fatal failures fail the job immediately.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use url::Url;

use crate::domain::SourceConfig;

/// Extraction error split by retryability.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractError {
    /// Retryable failure (network fetch failure, upstream 5xx/429).
    #[error("transient extraction failure: {0}")]
    Transient(String),
    /// Non-retryable failure (bad source configuration, malformed response,
    /// upstream 4xx).
    #[error("fatal extraction failure: {0}")]
    Fatal(String),
}

impl ExtractError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractError::Transient(_))
    }
}

/// Contract for the external extraction collaborator.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch raw record payloads for a source. Payload shape is opaque to
    /// the pipeline; the dedup gate only inspects identifying fields.
    async fn extract(&self, source: &SourceConfig) -> Result<Vec<JsonValue>, ExtractError>;
}

/// HTTP extractor fetching JSON documents from the configured URLs.
pub struct HttpExtractor {
    client: reqwest::Client,
}

impl HttpExtractor {
    pub fn new(request_timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("watchtower/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client builds");

        Self { client }
    }

    async fn fetch_one(
        &self,
        url: &str,
        source: &SourceConfig,
    ) -> Result<Vec<JsonValue>, ExtractError> {
        let parsed = Url::parse(url)
            .map_err(|e| ExtractError::Fatal(format!("invalid source url {url}: {e}")))?;

        let response = self.client.get(parsed).send().await.map_err(|e| {
            // Connect/timeout failures are worth a retry; anything else in
            // the transport layer is too.
            ExtractError::Transient(format!("fetch failed for {url}: {e}"))
        })?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(ExtractError::Transient(format!(
                "upstream returned {status} for {url}"
            )));
        }
        if !status.is_success() {
            return Err(ExtractError::Fatal(format!(
                "upstream returned {status} for {url}"
            )));
        }

        let body: JsonValue = response.json().await.map_err(|e| {
            ExtractError::Fatal(format!("malformed response body from {url}: {e}"))
        })?;

        let items = match &source.items_pointer {
            Some(pointer) => body
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| {
                    ExtractError::Fatal(format!(
                        "items pointer {pointer} matched nothing in response from {url}"
                    ))
                })?,
            None => body,
        };

        let mut payloads = match items {
            JsonValue::Array(values) => values,
            single => vec![single],
        };

        if let Some(cap) = source.max_items {
            payloads.truncate(cap);
        }

        Ok(payloads)
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn extract(&self, source: &SourceConfig) -> Result<Vec<JsonValue>, ExtractError> {
        if source.urls.is_empty() {
            return Err(ExtractError::Fatal(
                "source configuration has no urls".to_string(),
            ));
        }

        let mut all = Vec::new();
        for url in &source.urls {
            let mut payloads = self.fetch_one(url, source).await?;
            all.append(&mut payloads);
        }

        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_source_config_is_fatal() {
        let extractor = HttpExtractor::new(std::time::Duration::from_secs(5));
        let source = SourceConfig {
            urls: vec![],
            items_pointer: None,
            max_items: None,
        };

        let err = extractor.extract(&source).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn invalid_url_is_fatal() {
        let extractor = HttpExtractor::new(std::time::Duration::from_secs(5));
        let source = SourceConfig {
            urls: vec!["not a url".to_string()],
            items_pointer: None,
            max_items: None,
        };

        let err = extractor.extract(&source).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
