//! Rule-based digests of normalized events.
//!
//! [`summarize_events`] folds an event list into files touched, tools used,
//! errors and the last message; [`EventSummary::view`] projects that at a
//! chosen detail level. [`event_delta`] does the same for the tail after a
//! known index, for polling callers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::{AgentEvent, EventKind, ResultStatus};
use crate::error::Error;

/// Longest error or message text kept in a summary.
const MAX_ERROR_CHARS: usize = 500;
/// Raw lines scanned backwards when an error carries no text of its own.
const RAW_ERROR_WINDOW: usize = 20;
const ERROR_KEYWORDS: [&str; 3] = ["error", "failed", "exception"];

/// How much of an [`EventSummary`] to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Brief,
    #[default]
    Standard,
    Detailed,
}

impl DetailLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brief => "brief",
            Self::Standard => "standard",
            Self::Detailed => "detailed",
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brief" => Ok(Self::Brief),
            "standard" => Ok(Self::Standard),
            "detailed" => Ok(Self::Detailed),
            _ => Err(Error::InvalidValue {
                kind: "detail level",
                value: s.to_string(),
                expected: "'brief', 'standard' or 'detailed'",
            }),
        }
    }
}

/// Coarse importance of an event for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    Important,
    Verbose,
}

impl EventKind {
    pub const fn priority(&self) -> Priority {
        match self {
            Self::Error { .. }
            | Self::Result { .. }
            | Self::FileWrite { .. }
            | Self::FileCreate { .. }
            | Self::FileDelete { .. } => Priority::Critical,
            Self::ToolUse { .. }
            | Self::Bash { .. }
            | Self::FileRead { .. }
            | Self::Thinking { complete: true, .. }
            | Self::Message { complete: true, .. } => Priority::Important,
            Self::Thinking { .. }
            | Self::Message { .. }
            | Self::Init { .. }
            | Self::TurnStart
            | Self::UserMessage { .. }
            | Self::ToolResult { .. }
            | Self::Raw { .. }
            | Self::Other { .. } => Priority::Verbose,
        }
    }
}

/// Events whose priority is one of `levels`, in order.
pub fn filter_by_priority<'a>(events: &'a [AgentEvent], levels: &[Priority]) -> Vec<&'a AgentEvent> {
    events
        .iter()
        .filter(|e| levels.contains(&e.kind.priority()))
        .collect()
}

/// What an agent did, folded from its events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSummary {
    pub files_modified: BTreeSet<String>,
    pub files_created: BTreeSet<String>,
    pub files_read: BTreeSet<String>,
    pub files_deleted: BTreeSet<String>,
    pub tools_used: BTreeSet<String>,
    pub tool_call_count: usize,
    pub bash_commands: Vec<String>,
    pub errors: Vec<String>,
    pub final_message: Option<String>,
    pub event_count: usize,
    pub last_activity: Option<&'static str>,
    /// Turn duration reported by the last result event.
    pub reported_duration_ms: Option<u64>,
}

/// Fold `events` into an [`EventSummary`].
pub fn summarize_events(events: &[AgentEvent]) -> EventSummary {
    let mut summary = EventSummary {
        event_count: events.len(),
        ..EventSummary::default()
    };

    for event in events {
        summary.last_activity = Some(event.kind.type_name());
        match &event.kind {
            EventKind::FileWrite { path, .. } => {
                count_file(&mut summary.files_modified, &mut summary.tool_call_count, path);
            }
            EventKind::FileCreate { path, .. } => {
                count_file(&mut summary.files_created, &mut summary.tool_call_count, path);
            }
            EventKind::FileRead { path, .. } => {
                count_file(&mut summary.files_read, &mut summary.tool_call_count, path);
            }
            EventKind::FileDelete { path, .. } => {
                count_file(&mut summary.files_deleted, &mut summary.tool_call_count, path);
            }
            EventKind::ToolUse { tool, .. } => {
                summary.tools_used.insert(tool.clone());
                summary.tool_call_count += 1;
            }
            EventKind::Bash { command, .. } => {
                summary.tools_used.insert("bash".to_string());
                summary.tool_call_count += 1;
                if !command.is_empty() {
                    let ops = file_ops_from_shell(command);
                    summary.files_read.extend(ops.read);
                    summary.files_modified.extend(ops.written);
                    summary.bash_commands.push(command.clone());
                }
            }
            EventKind::Message { content, .. } if !content.is_empty() => {
                summary.final_message = Some(content.clone());
            }
            EventKind::Error { message } => {
                let text = if message.trim().is_empty() {
                    recent_raw_error(events)
                } else {
                    Some(truncate_chars(message.trim(), MAX_ERROR_CHARS))
                };
                summary.errors.extend(text);
            }
            EventKind::Result {
                status,
                duration_ms,
                ..
            } => {
                if *status == ResultStatus::Error {
                    summary.errors.extend(recent_raw_error(events));
                }
                if duration_ms.is_some() {
                    summary.reported_duration_ms = *duration_ms;
                }
            }
            _ => {}
        }
    }
    summary
}

fn count_file(set: &mut BTreeSet<String>, count: &mut usize, path: &str) {
    if !path.is_empty() {
        set.insert(path.to_string());
        *count += 1;
    }
}

/// The most recent raw line that reads like an error.
fn recent_raw_error(events: &[AgentEvent]) -> Option<String> {
    events
        .iter()
        .rev()
        .take(RAW_ERROR_WINDOW)
        .find_map(|e| match &e.kind {
            EventKind::Raw { content } => {
                let lower = content.to_lowercase();
                ERROR_KEYWORDS
                    .iter()
                    .any(|k| lower.contains(k))
                    .then(|| truncate_chars(content.trim(), MAX_ERROR_CHARS))
            }
            _ => None,
        })
}

/// Cut `text` to `max` characters, marking the cut with `...`.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Paths a shell command reads or writes, as far as common idioms show.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ShellFileOps {
    pub read: Vec<String>,
    pub written: Vec<String>,
}

static SHELL_WRAPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"-[lc]+\s+["'](.+)["']$"#).expect("static regex is valid"));

static WRITE_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        r#"(?:cat|echo|printf)\s+.*?>\s*["']?([^\s"'|;&]+)"#,
        r#"tee\s+(?:-a\s+)?["']?([^\s"'|;&]+)"#,
        r#"sed\s+-i\S*\s+.*?["']?([^\s"']+)$"#,
    ]
    .map(|p| Regex::new(p).expect("static regex is valid"))
});

static READ_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        r#"sed\s+-n\s+["'][^"']+["']\s+["']?([^\s"'|;&>]+)"#,
        r#"(?:head|tail)\s+(?:-\w+\s+)*(?:\d+\s+)?([^\s"'|;&-][^\s"'|;&]*)"#,
    ]
    .map(|p| Regex::new(p).expect("static regex is valid"))
});

/// Extract file reads and writes from a shell command line.
///
/// A `sh -lc "..."` style wrapper is unwrapped first.
pub fn file_ops_from_shell(command: &str) -> ShellFileOps {
    let command = SHELL_WRAPPER
        .captures(command)
        .and_then(|c| c.get(1))
        .map_or(command, |m| m.as_str());

    let collect = |patterns: &[Regex]| -> Vec<String> {
        patterns
            .iter()
            .flat_map(|re| re.captures_iter(command))
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|p| !p.starts_with('-'))
            .map(String::from)
            .collect()
    };

    ShellFileOps {
        read: collect(READ_PATTERNS.as_slice()),
        written: collect(WRITE_PATTERNS.as_slice()),
    }
}

/// An [`EventSummary`] cut down to one [`DetailLevel`]. Absent fields are
/// not part of that level.
#[derive(Debug, Default, Serialize)]
pub struct SummaryView<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_modified: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_created: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_read: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_deleted: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<&'a str>>,
    pub tool_call_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bash_commands: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_errors: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<&'static str>,
}

fn listed(set: &BTreeSet<String>, limit: usize) -> Vec<&str> {
    set.iter().take(limit).map(String::as_str).collect()
}

impl EventSummary {
    pub fn view(&self, level: DetailLevel) -> SummaryView<'_> {
        let message = |max| self.final_message.as_deref().map(|m| truncate_chars(m, max));
        match level {
            DetailLevel::Brief => SummaryView {
                files_modified: Some(listed(&self.files_modified, 5)),
                files_created: Some(listed(&self.files_created, 5)),
                tool_call_count: self.tool_call_count,
                has_errors: Some(!self.errors.is_empty()),
                last_activity: self.last_activity,
                ..SummaryView::default()
            },
            DetailLevel::Standard => SummaryView {
                files_modified: Some(listed(&self.files_modified, usize::MAX)),
                files_created: Some(listed(&self.files_created, usize::MAX)),
                tools_used: Some(listed(&self.tools_used, usize::MAX)),
                tool_call_count: self.tool_call_count,
                errors: Some(self.errors.get(..3).unwrap_or(self.errors.as_slice())),
                final_message: message(200),
                ..SummaryView::default()
            },
            DetailLevel::Detailed => SummaryView {
                files_modified: Some(listed(&self.files_modified, usize::MAX)),
                files_created: Some(listed(&self.files_created, usize::MAX)),
                files_read: Some(listed(&self.files_read, usize::MAX)),
                files_deleted: Some(listed(&self.files_deleted, usize::MAX)),
                tools_used: Some(listed(&self.tools_used, usize::MAX)),
                tool_call_count: self.tool_call_count,
                bash_commands: Some(
                    &self.bash_commands[self.bash_commands.len().saturating_sub(10)..],
                ),
                errors: Some(self.errors.as_slice()),
                final_message: message(500),
                event_count: Some(self.event_count),
                last_activity: self.last_activity,
                ..SummaryView::default()
            },
        }
    }
}

/// What changed after the first `since_event` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDelta {
    pub since_event: usize,
    pub new_events_count: usize,
    pub current_event_count: usize,
    pub has_changes: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_files_modified: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_files_created: Vec<String>,
    /// The last few tool calls, as `tool: target`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_tool_calls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_errors: Vec<String>,
}

/// Summarize only the events after index `since_event`.
pub fn event_delta(events: &[AgentEvent], since_event: usize) -> EventDelta {
    let new = events.get(since_event..).unwrap_or_default();
    let summary = summarize_events(new);

    let mut tool_calls: Vec<String> = new
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::ToolUse { tool, .. } => Some(tool.clone()),
            EventKind::Bash { tool, command } => Some(format!("{tool}: {command}")),
            EventKind::FileWrite { tool, path }
            | EventKind::FileCreate { tool, path }
            | EventKind::FileDelete { tool, path } => Some(format!("{tool}: {path}")),
            _ => None,
        })
        .collect();
    let new_tool_calls = tool_calls.split_off(tool_calls.len().saturating_sub(5));

    EventDelta {
        since_event,
        new_events_count: new.len(),
        current_event_count: since_event + new.len(),
        has_changes: !new.is_empty(),
        new_files_modified: summary.files_modified.into_iter().collect(),
        new_files_created: summary.files_created.into_iter().collect(),
        new_tool_calls,
        latest_message: summary.final_message,
        new_errors: summary.errors,
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
#[path = "summary_tests.rs"]
mod tests;
