//! Error types for the collector protocol client.

use thiserror::Error;

/// Payload codec errors. Encoding failures are never retried: the same
/// malformed batch would fail identically on a later attempt, so the
/// caller must discard it.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode payload for method '{method}': {source}")]
    Encoding {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode collector response: {0}")]
    Decoding(#[from] serde_json::Error),

    #[error("Failed to compress payload: {0}")]
    Compression(#[from] std::io::Error),
}

/// Transport-level errors. Everything that happens before a response is
/// received collapses into `Connection`, which is always transient.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Unable to connect to the collector: {0}")]
    Connection(String),

    #[error("Failed to construct HTTP client: {0}")]
    Client(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
