//! Per-CLI normalizers.
//!
//! One parser per [`AgentType`]; cursor and claude share the Anthropic-style
//! stream-json shape but differ in their tool and streaming events.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use super::types::*;
use crate::agent::AgentType;

/// Parse one output line. Returns `None` when the line is not JSON.
pub fn parse_line(agent_type: AgentType, line: &str) -> Option<Vec<EventKind>> {
    let raw: Value = serde_json::from_str(line).ok()?;
    Some(normalize_events(agent_type, &raw))
}

/// Normalize one parsed JSON value into zero or more events.
pub fn normalize_events(agent_type: AgentType, raw: &Value) -> Vec<EventKind> {
    match agent_type {
        AgentType::Codex => parse_codex(raw),
        AgentType::Cursor => parse_cursor(raw),
        AgentType::Gemini => parse_gemini(raw),
        AgentType::Claude => parse_claude(raw),
    }
}

/// Timestamp carried by the raw payload, if any.
///
/// Accepts RFC 3339 strings, naive ISO-8601 strings (read as UTC) and epoch
/// seconds or milliseconds.
pub fn extract_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    ["timestamp", "ts", "time", "created_at"]
        .iter()
        .filter_map(|key| raw.get(*key))
        .find_map(timestamp_from_value)
}

fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }),
        Value::Number(n) => {
            let n = n.as_i64()?;
            // Anything past year 33658 in seconds is really milliseconds.
            if n.unsigned_abs() >= 1_000_000_000_000 {
                DateTime::from_timestamp_millis(n)
            } else {
                DateTime::from_timestamp(n, 0)
            }
        }
        _ => None,
    }
}

fn str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(String::from)
}

fn text_field(raw: &Value, key: &str) -> String {
    str_field(raw, key).unwrap_or_default()
}

fn event_type(raw: &Value) -> &str {
    raw.get("type").and_then(Value::as_str).unwrap_or("unknown")
}

fn passthrough(raw: &Value) -> Vec<EventKind> {
    vec![EventKind::Other {
        event_type: event_type(raw).to_string(),
        raw: raw.clone(),
    }]
}

/// Classify a tool invocation into a file read, file write, shell command or
/// generic tool use.
fn classify_tool(tool: &str, args: &Value) -> EventKind {
    let name = tool.to_ascii_lowercase();
    let path = ["file_path", "path", "filePath", "absolute_path"]
        .iter()
        .find_map(|key| str_field(args, key))
        .unwrap_or_default();

    let is_write = matches!(
        name.as_str(),
        "write" | "edit" | "multiedit" | "notebookedit" | "replace" | "write_file" | "create_file"
            | "edit_file"
    ) || (name.contains("write") && name.contains("file"));
    let is_read = matches!(name.as_str(), "read" | "read_file" | "read_many_files")
        || (name.contains("read") && name.contains("file"));
    let is_shell = matches!(
        name.as_str(),
        "bash" | "shell" | "execute" | "run_command" | "run_shell_command" | "local_shell"
    );

    if is_write {
        EventKind::FileWrite {
            tool: tool.to_string(),
            path,
        }
    } else if is_read {
        EventKind::FileRead {
            tool: tool.to_string(),
            path,
        }
    } else if is_shell {
        EventKind::Bash {
            tool: tool.to_string(),
            command: command_text(args.get("command")),
        }
    } else {
        EventKind::ToolUse {
            tool: tool.to_string(),
            args: args.clone(),
        }
    }
}

/// Commands arrive either as a string or as an argv array.
fn command_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

fn parse_usage(val: Option<&Value>) -> Option<Usage> {
    val.and_then(|v| serde_json::from_value(v.clone()).ok())
}

// ---------------------------------------------------------------------------
// codex exec --json
// ---------------------------------------------------------------------------

fn parse_codex(raw: &Value) -> Vec<EventKind> {
    match event_type(raw) {
        "thread.started" => vec![EventKind::Init {
            model: None,
            session_id: str_field(raw, "thread_id"),
        }],
        "turn.started" => vec![EventKind::TurnStart],
        // The completed item carries the full content.
        "item.started" | "item.updated" => Vec::new(),
        "item.completed" => parse_codex_item(raw),
        "turn.completed" => vec![EventKind::Result {
            status: ResultStatus::Success,
            duration_ms: None,
            usage: parse_usage(raw.get("usage")),
        }],
        "turn.failed" => {
            let message = raw
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("turn failed")
                .to_string();
            vec![
                EventKind::Error { message },
                EventKind::Result {
                    status: ResultStatus::Error,
                    duration_ms: None,
                    usage: None,
                },
            ]
        }
        "error" => vec![EventKind::Error {
            message: text_field(raw, "message"),
        }],
        _ => passthrough(raw),
    }
}

fn parse_codex_item(raw: &Value) -> Vec<EventKind> {
    let Some(item) = raw.get("item") else {
        return passthrough(raw);
    };

    match item.get("type").and_then(Value::as_str).unwrap_or("") {
        "agent_message" => vec![EventKind::Message {
            content: text_field(item, "text"),
            complete: true,
        }],
        "reasoning" => vec![EventKind::Thinking {
            content: text_field(item, "text"),
            complete: true,
        }],
        "command_execution" => vec![EventKind::Bash {
            tool: "command_execution".to_string(),
            command: command_text(item.get("command")),
        }],
        "file_change" => item
            .get("changes")
            .and_then(Value::as_array)
            .map(|changes| {
                changes
                    .iter()
                    .map(|change| {
                        let tool = "file_change".to_string();
                        let path = text_field(change, "path");
                        match change.get("kind").and_then(Value::as_str) {
                            Some("add") => EventKind::FileCreate { tool, path },
                            Some("delete") => EventKind::FileDelete { tool, path },
                            _ => EventKind::FileWrite { tool, path },
                        }
                    })
                    .collect()
            })
            .unwrap_or_default(),
        "mcp_tool_call" => vec![EventKind::ToolUse {
            tool: str_field(item, "tool").unwrap_or_else(|| "mcp_tool_call".to_string()),
            args: item.get("arguments").cloned().unwrap_or(Value::Null),
        }],
        "web_search" => vec![EventKind::ToolUse {
            tool: "web_search".to_string(),
            args: serde_json::json!({ "query": text_field(item, "query") }),
        }],
        "tool_call" => {
            let name = str_field(item, "name").unwrap_or_else(|| "unknown".to_string());
            let args = item.get("arguments").cloned().unwrap_or(Value::Null);
            vec![classify_tool(&name, &args)]
        }
        "error" => vec![EventKind::Error {
            message: text_field(item, "message"),
        }],
        _ => passthrough(raw),
    }
}

// ---------------------------------------------------------------------------
// cursor-agent / claude stream-json
// ---------------------------------------------------------------------------

fn parse_cursor(raw: &Value) -> Vec<EventKind> {
    match event_type(raw) {
        "thinking" => vec![EventKind::Thinking {
            content: text_field(raw, "text"),
            complete: matches!(
                raw.get("subtype").and_then(Value::as_str),
                Some("completed" | "complete")
            ),
        }],
        "tool_call" => parse_cursor_tool_call(raw),
        "tool_result" => vec![EventKind::ToolResult {
            tool: str_field(raw, "tool_name").unwrap_or_else(|| "unknown".to_string()),
            success: raw.get("success").and_then(Value::as_bool).unwrap_or(true),
        }],
        _ => parse_stream_json(raw),
    }
}

/// `{"type":"tool_call","subtype":"started","tool_call":{"readToolCall":{"args":{..}}}}`
fn parse_cursor_tool_call(raw: &Value) -> Vec<EventKind> {
    let Some((key, call)) = raw
        .get("tool_call")
        .and_then(Value::as_object)
        .and_then(|obj| obj.iter().next())
    else {
        return passthrough(raw);
    };
    let name = key.strip_suffix("ToolCall").unwrap_or(key);

    match raw.get("subtype").and_then(Value::as_str) {
        Some("completed") => {
            let success = call
                .get("result")
                .is_none_or(|result| result.get("error").is_none());
            vec![EventKind::ToolResult {
                tool: name.to_string(),
                success,
            }]
        }
        _ => {
            let args = call.get("args").cloned().unwrap_or(Value::Null);
            vec![classify_tool(name, &args)]
        }
    }
}

fn parse_claude(raw: &Value) -> Vec<EventKind> {
    match event_type(raw) {
        // Partial-message deltas; the assembled assistant message follows.
        "stream_event" => Vec::new(),
        _ => parse_stream_json(raw),
    }
}

fn parse_stream_json(raw: &Value) -> Vec<EventKind> {
    match event_type(raw) {
        "system" if raw.get("subtype").and_then(Value::as_str) == Some("init") => {
            vec![EventKind::Init {
                model: str_field(raw, "model"),
                session_id: str_field(raw, "session_id"),
            }]
        }
        "assistant" => parse_assistant(raw),
        "user" => parse_user(raw),
        "result" => {
            let status = if raw.get("is_error").and_then(Value::as_bool) == Some(true) {
                ResultStatus::Error
            } else {
                ResultStatus::from_subtype(raw.get("subtype").and_then(Value::as_str))
            };
            vec![EventKind::Result {
                status,
                duration_ms: raw.get("duration_ms").and_then(Value::as_u64),
                usage: parse_usage(raw.get("usage")),
            }]
        }
        _ => passthrough(raw),
    }
}

fn parse_assistant(raw: &Value) -> Vec<EventKind> {
    let msg = raw.get("message").unwrap_or(raw);
    match msg.get("content") {
        Some(Value::String(text)) => vec![EventKind::Message {
            content: text.clone(),
            complete: true,
        }],
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|block| match block.get("type")?.as_str()? {
                "text" => Some(EventKind::Message {
                    content: text_field(block, "text"),
                    complete: true,
                }),
                "thinking" => Some(EventKind::Thinking {
                    content: text_field(block, "thinking"),
                    complete: true,
                }),
                "tool_use" => {
                    let name = block.get("name")?.as_str()?;
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    Some(classify_tool(name, &input))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_user(raw: &Value) -> Vec<EventKind> {
    let msg = raw.get("message").unwrap_or(raw);
    match msg.get("content") {
        Some(Value::String(text)) => vec![EventKind::UserMessage {
            content: text.clone(),
        }],
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|block| match block.get("type")?.as_str()? {
                "tool_result" => Some(EventKind::ToolResult {
                    tool: text_field(block, "tool_use_id"),
                    success: !block
                        .get("is_error")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                }),
                "text" => Some(EventKind::UserMessage {
                    content: text_field(block, "text"),
                }),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// gemini --output-format stream-json
// ---------------------------------------------------------------------------

fn parse_gemini(raw: &Value) -> Vec<EventKind> {
    match event_type(raw) {
        "init" => vec![EventKind::Init {
            model: str_field(raw, "model"),
            session_id: str_field(raw, "session_id"),
        }],
        "message" => {
            let content = text_field(raw, "content");
            if raw.get("role").and_then(Value::as_str) == Some("user") {
                vec![EventKind::UserMessage { content }]
            } else {
                vec![EventKind::Message {
                    content,
                    complete: !raw.get("delta").and_then(Value::as_bool).unwrap_or(false),
                }]
            }
        }
        "tool_use" | "tool_call" => {
            let name = str_field(raw, "tool_name")
                .or_else(|| str_field(raw, "name"))
                .unwrap_or_else(|| "unknown".to_string());
            let args = raw
                .get("parameters")
                .or_else(|| raw.get("args"))
                .cloned()
                .unwrap_or(Value::Null);
            vec![classify_tool(&name, &args)]
        }
        "tool_result" => vec![EventKind::ToolResult {
            tool: str_field(raw, "tool_id")
                .or_else(|| str_field(raw, "tool_name"))
                .unwrap_or_else(|| "unknown".to_string()),
            success: raw.get("status").and_then(Value::as_str) != Some("error"),
        }],
        "error" => vec![EventKind::Error {
            message: text_field(raw, "message"),
        }],
        "result" => {
            let stats = raw.get("stats");
            vec![EventKind::Result {
                status: ResultStatus::from_subtype(raw.get("status").and_then(Value::as_str)),
                duration_ms: stats
                    .and_then(|s| s.get("duration_ms"))
                    .and_then(Value::as_u64),
                usage: parse_usage(stats),
            }]
        }
        _ => passthrough(raw),
    }
}
