use thiserror::Error;

/// Errors from speech capabilities.
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("recognizer error: {0}")]
    Recognizer(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("TTS API error (status {status}): {message}")]
    TtsApi { status: u16, message: String },

    #[error("playback error: {0}")]
    Playback(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}
