//! Error types for the agent-swarm core library.

use thiserror::Error;

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for agent-swarm operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A string did not name a known enum value (agent type, mode, effort, status).
    #[error("Invalid {kind} '{value}'. Use {expected}.")]
    InvalidValue {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
