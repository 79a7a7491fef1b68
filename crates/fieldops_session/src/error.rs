use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The value is larger than the store accepts.
    #[error("Quota exceeded for '{key}': {size} bytes > {limit} bytes")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl SessionError {
    pub fn is_quota(&self) -> bool {
        matches!(self, SessionError::QuotaExceeded { .. })
    }
}
