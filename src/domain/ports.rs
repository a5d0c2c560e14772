//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! This module defines the abstraction the collection pipeline depends on to
//! reach NerdGraph. The reqwest-backed adapter implements it in production;
//! tests drive the pipeline through in-memory implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │                   GraphQlExecutor                    │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │                   NerdGraphClient                    │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// A complete GraphQL query document.
///
/// Only the builders in [`crate::query`] construct these, so every value
/// interpolated into the document has been escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQlQuery(String);

impl GraphQlQuery {
    pub(crate) fn new(document: String) -> Self {
        Self(document)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GraphQlQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Upstream Port
// =============================================================================

/// Port for executing GraphQL queries against the APM backend.
///
/// Implementations return the `data` member of the response envelope and
/// classify everything else (transport failures, non-success statuses,
/// malformed bodies, backend-reported `errors`) as an upstream error.
/// Implementations never retry.
///
/// # Example
///
/// ```ignore
/// struct CannedExecutor { data: serde_json::Value }
///
/// #[async_trait]
/// impl GraphQlExecutor for CannedExecutor {
///     async fn execute(&self, _query: &GraphQlQuery) -> Result<serde_json::Value> {
///         Ok(self.data.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait GraphQlExecutor: Send + Sync {
    /// Execute one query and return its `data` payload.
    async fn execute(&self, query: &GraphQlQuery) -> Result<serde_json::Value>;
}
