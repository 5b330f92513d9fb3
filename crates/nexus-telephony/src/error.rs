use thiserror::Error;

/// Errors from telephony provider operations.
#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed (status {status})")]
    Auth { status: u16 },

    #[error("provider API error (status {status}): {message}")]
    Api { status: u16, message: String },
}
