//! Errors surfaced to callers of the engine.
//!
//! Housekeeping failures (pruning, cleanup, log tailing) never reach this
//! type; they are logged where they happen.

use std::path::PathBuf;

/// Errors from agent orchestration.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{0}")]
    InvalidValue(#[from] swarm_core::Error),

    #[error("Maximum concurrent agents ({max}) reached. Wait for an agent to complete or stop one first.")]
    ConcurrencyLimit { max: usize },

    #[error("CLI tool '{executable}' not found in PATH. Install it first.")]
    CliNotFound { executable: &'static str },

    #[error("Working directory does not exist: {}", .0.display())]
    WorkingDirMissing(PathBuf),

    #[error("Working directory is not a directory: {}", .0.display())]
    WorkingDirNotDirectory(PathBuf),

    #[error("Failed to create agent directory {}: {source}", .path.display())]
    AgentDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to spawn agent: {reason}")]
    SpawnFailed { reason: String },

    #[error("Failed to persist metadata for agent {id}: {reason}")]
    MetadataPersist { id: String, reason: String },

    #[error("Unable to find a writable agent storage directory. Tried: {tried}")]
    NoStorageDir { tried: String },

    #[error("Agent not found: {id}")]
    NotFound { id: String },
}

impl AgentError {
    /// Whether this error is a rejected request rather than a failure while acting on it.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidValue(_)
                | Self::ConcurrencyLimit { .. }
                | Self::CliNotFound { .. }
                | Self::WorkingDirMissing(_)
                | Self::WorkingDirNotDirectory(_)
        )
    }
}
