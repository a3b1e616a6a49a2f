//! Agent vocabulary shared by the engine and its front ends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Third-party coding-agent CLI flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Codex,
    Cursor,
    Gemini,
    Claude,
}

impl AgentType {
    pub const ALL: [Self; 4] = [Self::Codex, Self::Cursor, Self::Gemini, Self::Claude];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Cursor => "cursor",
            Self::Gemini => "gemini",
            Self::Claude => "claude",
        }
    }

    /// Name of the executable that must resolve on the search path.
    pub const fn executable(self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Cursor => "cursor-agent",
            Self::Gemini => "gemini",
            Self::Claude => "claude",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "codex" => Ok(Self::Codex),
            "cursor" => Ok(Self::Cursor),
            "gemini" => Ok(Self::Gemini),
            "claude" => Ok(Self::Claude),
            _ => Err(Error::InvalidValue {
                kind: "agent type",
                value: s.to_string(),
                expected: "'codex', 'cursor', 'gemini' or 'claude'",
            }),
        }
    }
}

/// How much autonomy an agent is granted.
///
/// Older metadata used `safe`/`yolo`; those names still deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Read-only; the agent may stop and ask.
    #[default]
    #[serde(alias = "safe")]
    Plan,
    /// Edits are auto-approved.
    Edit,
    /// Fully unattended, every permission skipped.
    #[serde(alias = "yolo")]
    Ralph,
}

impl AgentMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Edit => "edit",
            Self::Ralph => "ralph",
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plan" => Ok(Self::Plan),
            "edit" => Ok(Self::Edit),
            "ralph" => Ok(Self::Ralph),
            _ => Err(Error::InvalidValue {
                kind: "mode",
                value: s.to_string(),
                expected: "'plan', 'edit' or 'ralph'",
            }),
        }
    }
}

/// Lifecycle state of an agent. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Completed,
    Failed,
    Stopped,
}

impl AgentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effort tier; selects which model an agent type runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Fast,
    #[default]
    Default,
    Detailed,
}

impl Effort {
    pub const ALL: [Self; 3] = [Self::Fast, Self::Default, Self::Detailed];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Default => "default",
            Self::Detailed => "detailed",
        }
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "default" => Ok(Self::Default),
            "detailed" => Ok(Self::Detailed),
            _ => Err(Error::InvalidValue {
                kind: "effort",
                value: s.to_string(),
                expected: "'fast', 'default' or 'detailed'",
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mode_parse_is_case_insensitive() {
        assert_eq!("Ralph".parse::<AgentMode>().unwrap(), AgentMode::Ralph);
        assert_eq!(" edit ".parse::<AgentMode>().unwrap(), AgentMode::Edit);
    }

    #[test]
    fn invalid_mode_names_choices() {
        let err = "yolo!".parse::<AgentMode>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid mode 'yolo!'. Use 'plan', 'edit' or 'ralph'."
        );
    }

    #[test]
    fn legacy_mode_names_deserialize() {
        let safe: AgentMode = serde_json::from_str(r#""safe""#).unwrap();
        let yolo: AgentMode = serde_json::from_str(r#""yolo""#).unwrap();
        assert_eq!(safe, AgentMode::Plan);
        assert_eq!(yolo, AgentMode::Ralph);
        assert_eq!(serde_json::to_string(&yolo).unwrap(), r#""ralph""#);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AgentStatus::Completed).unwrap(),
            r#""completed""#
        );
        assert!(!AgentStatus::Running.is_terminal());
        assert!(AgentStatus::Stopped.is_terminal());
    }

    #[test]
    fn cursor_runs_cursor_agent() {
        assert_eq!(AgentType::Cursor.executable(), "cursor-agent");
        assert_eq!("CURSOR".parse::<AgentType>().unwrap(), AgentType::Cursor);
        assert!("copilot".parse::<AgentType>().is_err());
    }
}
