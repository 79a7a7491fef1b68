//! Error types for the backend layer.

use thiserror::Error;

/// Backend operation result type.
pub type Result<T> = std::result::Result<T, BackendError>;

/// PostgREST code for "no rows" on a single-row read.
pub const NOT_FOUND_CODE: &str = "PGRST116";

/// Backend errors.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transport failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("{message} (status {status}{})", code_suffix(.code))]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// A single-row read matched nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage rejected the request because the bucket does not exist.
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// Missing or rejected session token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Service temporarily unreachable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Row could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid backend configuration: {0}")]
    Config(String),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(", code {}", c))
        .unwrap_or_default()
}

impl BackendError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Worth retrying: connection problems, timeouts, 5xx and 429.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            BackendError::Status { status, .. } => *status >= 500 || *status == 429,
            BackendError::Unavailable(_) => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            BackendError::NotFound(_) => true,
            BackendError::Status { code, .. } => code.as_deref() == Some(NOT_FOUND_CODE),
            _ => false,
        }
    }

    pub fn is_bucket_missing(&self) -> bool {
        match self {
            BackendError::BucketNotFound(_) => true,
            BackendError::Status { message, .. } => message.contains("Bucket not found"),
            _ => false,
        }
    }
}
