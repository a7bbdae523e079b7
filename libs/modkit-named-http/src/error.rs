use std::time::Duration;
use thiserror::Error;

use crate::query::QueryError;

/// Boxed error type used for errors coming from outside this crate
/// (transport, TLS, token suppliers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the registry and by named clients.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ClientError {
    /// No usable caller identity could be resolved from the principal context
    #[error("Principal is missing: {0}")]
    PrincipalMissing(&'static str),

    /// A handle with this name already exists for the calling principal
    #[error("A client with name '{name}' already exists")]
    AlreadyExists { name: String },

    /// Downstream API answered 401
    #[error("Unauthorized endpoint: {url}. Check credentials")]
    Unauthorized { url: String },

    /// The request was cancelled by the caller or aborted through its handle
    #[error("Request cancelled")]
    Cancelled,

    /// Non-2xx response whose body could not be shaped into the expected type
    #[error("HTTP {status} from {url}")]
    UnexpectedStatus {
        status: http::StatusCode,
        url: String,
    },

    /// Base URL or request URL is not a valid absolute http(s) URL
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri { url: String, reason: String },

    /// Header value could not be built (e.g. token with control characters)
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// JSON serialization of the request or parsing of the response failed
    #[error("JSON processing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Query parameters could not be encoded
    #[error("Query encoding failed: {0}")]
    Query(#[from] QueryError),

    /// The bearer token supplier failed to produce a token
    #[error("Token supplier failed: {0}")]
    TokenSupplier(#[source] BoxError),

    /// Request attempt timed out
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Response body exceeded the configured size limit
    #[error("Response body too large: limit {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Transport error (network, connection, DNS, ...)
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// TLS setup error
    #[error("TLS error: {0}")]
    Tls(#[source] BoxError),
}

impl ClientError {
    /// Returns `true` for the terminal 401 outcome.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized { .. })
    }

    /// Returns `true` if the request was cancelled or aborted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

impl From<hyper_util::client::legacy::Error> for ClientError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        ClientError::Transport(Box::new(err))
    }
}
