use thiserror::Error;

/// Errors from conversational model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned no usable reply")]
    EmptyReply,

    #[error("model API key is not configured")]
    MissingApiKey,
}
