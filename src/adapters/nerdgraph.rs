//! NerdGraph Adapter
//!
//! Implements the `GraphQlExecutor` port over HTTPS with reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::ports::{GraphQlExecutor, GraphQlQuery};
use crate::error::{Error, Result};

/// Default NerdGraph endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.newrelic.com/graphql";

/// Header carrying the user API key.
const API_KEY_HEADER: &str = "API-Key";

/// Longest response body kept in a status error.
const MAX_ERROR_BODY: usize = 512;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the NerdGraph client
#[derive(Clone)]
pub struct NerdGraphConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,

    /// User API key
    pub api_key: String,

    /// Per-request timeout
    pub query_timeout: Duration,
}

impl NerdGraphConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            query_timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for NerdGraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NerdGraphConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

// =============================================================================
// Client
// =============================================================================

/// NerdGraph client.
///
/// Sends each query once; there are no retries. Every request is bounded by
/// the configured timeout.
pub struct NerdGraphClient {
    config: NerdGraphConfig,
    client: Client,
}

impl NerdGraphClient {
    /// Create a new NerdGraph client
    pub fn new(config: NerdGraphConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("New Relic API key must not be empty".into()));
        }
        if config.query_timeout.is_zero() {
            return Err(Error::Config("query timeout must be positive".into()));
        }

        let client = Client::builder()
            .timeout(config.query_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }
}

impl std::fmt::Debug for NerdGraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NerdGraphClient")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl GraphQlExecutor for NerdGraphClient {
    #[instrument(skip(self, query), fields(endpoint = %self.config.endpoint))]
    async fn execute(&self, query: &GraphQlQuery) -> Result<serde_json::Value> {
        debug!("Querying NerdGraph: {}", query);

        let response = self
            .client
            .post(&self.config.endpoint)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&GraphQlRequest {
                query: query.as_str(),
            })
            .send()
            .await
            .map_err(Error::UpstreamConnection)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::UpstreamConnection)?;

        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        classify_body(&body)
    }
}

/// Classify a NerdGraph response body.
///
/// A non-empty top-level `errors` member fails the call even when partial
/// `data` is present.
pub fn classify_body(body: &str) -> Result<serde_json::Value> {
    let envelope: GraphQlEnvelope = serde_json::from_str(body)
        .map_err(|e| Error::UpstreamResponseParse(format!("body is not a GraphQL envelope: {}", e)))?;

    if let Some(errors) = envelope.errors.filter(has_errors) {
        warn!("NerdGraph returned errors: {}", errors);
        return Err(Error::UpstreamBackend(errors));
    }

    match envelope.data {
        Some(data) if !data.is_null() => Ok(data),
        _ => Err(Error::UpstreamResponseParse("response has no data".into())),
    }
}

fn has_errors(errors: &serde_json::Value) -> bool {
    match errors {
        serde_json::Value::Null => false,
        serde_json::Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}
