//! Error types for kaigi.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KaigiError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("WAV codec error: {message}")]
    WavCodec { message: String },

    // Speech-to-text errors
    #[error("No STT client configured")]
    NoSttClientConfigured,

    #[error("STT provider {provider} returned {status}: {detail}")]
    SttProxy {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("Transcription error: {message}")]
    Transcription { message: String },

    // Translation/summarization errors
    #[error("LLM provider {provider} returned {status}: {detail}")]
    LlmProxy {
        provider: String,
        status: u16,
        detail: String,
    },

    #[error("Translation error: {message}")]
    Translation { message: String },

    // HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, KaigiError>;
