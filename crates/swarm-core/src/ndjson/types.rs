//! Normalized event types shared by every agent CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::AgentType;

/// One normalized unit of agent output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Init {
        model: Option<String>,
        session_id: Option<String>,
    },
    TurnStart,
    Thinking {
        content: String,
        complete: bool,
    },
    Message {
        content: String,
        complete: bool,
    },
    UserMessage {
        content: String,
    },
    ToolUse {
        tool: String,
        args: Value,
    },
    ToolResult {
        tool: String,
        success: bool,
    },
    FileRead {
        tool: String,
        path: String,
    },
    FileWrite {
        tool: String,
        path: String,
    },
    FileCreate {
        tool: String,
        path: String,
    },
    FileDelete {
        tool: String,
        path: String,
    },
    Bash {
        tool: String,
        command: String,
    },
    /// End of the agent's turn.
    Result {
        status: ResultStatus,
        duration_ms: Option<u64>,
        usage: Option<Usage>,
    },
    Error {
        message: String,
    },
    /// A line that was not valid JSON, kept verbatim.
    Raw {
        content: String,
    },
    /// A JSON event this normalizer does not recognise.
    Other {
        event_type: String,
        raw: Value,
    },
}

impl EventKind {
    /// The terminal status if this event marks the end of a turn.
    pub const fn terminal_status(&self) -> Option<ResultStatus> {
        match self {
            Self::Result { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::TurnStart => "turn_start",
            Self::Thinking { .. } => "thinking",
            Self::Message { .. } => "message",
            Self::UserMessage { .. } => "user_message",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::FileRead { .. } => "file_read",
            Self::FileWrite { .. } => "file_write",
            Self::FileCreate { .. } => "file_create",
            Self::FileDelete { .. } => "file_delete",
            Self::Bash { .. } => "bash",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
            Self::Raw { .. } => "raw",
            Self::Other { .. } => "other",
        }
    }
}

/// Outcome carried by a terminal [`EventKind::Result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

impl ResultStatus {
    /// `success` (or nothing) is success; any other subtype is an error,
    /// e.g. `error_max_turns`.
    pub fn from_subtype(subtype: Option<&str>) -> Self {
        match subtype {
            None | Some("success") => Self::Success,
            Some(_) => Self::Error,
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// An event with its resolved timestamp, as accumulated per agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentEvent {
    pub agent: AgentType,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}
