//! Error types for the Civo client.

use thiserror::Error;

/// Result type alias for Civo API operations.
pub type CivoResult<T> = Result<T, CivoError>;

#[derive(Debug, Error)]
pub enum CivoError {
    #[error("civo API key is not set")]
    MissingApiKey,

    #[error("civo API key is not a valid header value")]
    InvalidApiKey,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("civo API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("no instance matches {0:?}")]
    ZeroMatches(String),

    #[error("{count} instances partially match {search:?}")]
    MultipleMatches { search: String, count: usize },
}
