//! NSX client errors

use thiserror::Error;

/// Errors that can occur when interacting with the NSX Policy API
#[derive(Debug, Error)]
pub enum NsxError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// NSX API returned an error
    #[error("NSX API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (bad credentials, locked account, etc.)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., malformed path)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl NsxError {
    /// True for a 404 from the API
    pub fn is_not_found(&self) -> bool {
        matches!(self, NsxError::NotFound(_))
    }
}
