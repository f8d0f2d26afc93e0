//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by the bridge framework and returned from bridge workers.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    #[error("MQTT connection error: {0}")]
    MqttConnection(String),

    /// Encoding a payload failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The request queue is full or the event loop is gone.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// A fatal worker failure; ends the runner.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }
}

impl From<pvbridge_common::Error> for BridgeError {
    fn from(err: pvbridge_common::Error) -> Self {
        use pvbridge_common::Error;

        match err {
            Error::Config(e) => Self::Config(e),
            Error::BrokerUri(e) => Self::MqttConnection(e),
            Error::Json(e) => Self::Serialization(e.to_string()),
            Error::Cbor(e) => Self::Serialization(e),
            Error::Io(e) => Self::Io(e),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}
