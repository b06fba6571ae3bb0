use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message carried by every cancellation error. Callers may match on it.
pub const CANCELLED_MESSAGE: &str = "request cancelled";

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("HTTP error! status: {status}")]
    Http { status: u16, body: String },

    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Stream error: {0}")]
    Transport(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("Failed to parse data line: {source}, {payload}")]
    MalformedPayload {
        payload: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session task failed: {0}")]
    Task(String),
}

impl StreamError {
    /// Severity the caller should render this error with.
    pub fn severity(&self) -> Severity {
        match self {
            StreamError::Cancelled => Severity::Info,
            _ => Severity::Error,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }

    /// Malformed payloads are reported but never end the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StreamError::MalformedPayload { .. })
    }
}

/// How an error should be presented. Cancellation is informational, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(label)
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
