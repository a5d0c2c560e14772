//! Error types for the New Relic exporter

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while collecting from New Relic
#[derive(Error, Debug)]
pub enum Error {
    /// Connection failure, request timeout, or body read failure
    #[error("NerdGraph connection error: {0}")]
    UpstreamConnection(#[source] reqwest::Error),

    /// NerdGraph answered with a non-success HTTP status
    #[error("NerdGraph request failed with status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// NerdGraph response body could not be interpreted
    #[error("Failed to parse NerdGraph response: {0}")]
    UpstreamResponseParse(String),

    /// NerdGraph reported errors in the response envelope
    #[error("NerdGraph returned errors: {0}")]
    UpstreamBackend(serde_json::Value),

    /// A query could not be built from the given inputs
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for every failure that originates from talking to NerdGraph.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::UpstreamConnection(_)
                | Error::UpstreamStatus { .. }
                | Error::UpstreamResponseParse(_)
                | Error::UpstreamBackend(_)
        )
    }
}
