use chrono::Utc;
use serde_json::{Value, json};

use super::*;
use crate::agent::AgentType;

fn ev(kind: EventKind) -> AgentEvent {
    AgentEvent {
        agent: AgentType::Codex,
        timestamp: Utc::now(),
        kind,
    }
}

fn write(path: &str) -> AgentEvent {
    ev(EventKind::FileWrite {
        tool: "apply_patch".to_string(),
        path: path.to_string(),
    })
}

fn bash(command: &str) -> AgentEvent {
    ev(EventKind::Bash {
        tool: "command_execution".to_string(),
        command: command.to_string(),
    })
}

fn tool(name: &str) -> AgentEvent {
    ev(EventKind::ToolUse {
        tool: name.to_string(),
        args: Value::Null,
    })
}

fn message(content: &str, complete: bool) -> AgentEvent {
    ev(EventKind::Message {
        content: content.to_string(),
        complete,
    })
}

fn raw(content: &str) -> AgentEvent {
    ev(EventKind::Raw {
        content: content.to_string(),
    })
}

fn result(status: ResultStatus, duration_ms: Option<u64>) -> AgentEvent {
    ev(EventKind::Result {
        status,
        duration_ms,
        usage: None,
    })
}

fn init() -> AgentEvent {
    ev(EventKind::Init {
        model: None,
        session_id: None,
    })
}

#[test]
fn empty_events_summarize_to_nothing() {
    let summary = summarize_events(&[]);
    assert_eq!(summary, EventSummary::default());
    assert_eq!(summary.last_activity, None);
}

#[test]
fn file_operations_are_sorted_by_kind() {
    let events = [
        write("src/auth.ts"),
        ev(EventKind::FileCreate {
            tool: "file_change".to_string(),
            path: "src/types.ts".to_string(),
        }),
        ev(EventKind::FileRead {
            tool: "Read".to_string(),
            path: "src/config.ts".to_string(),
        }),
        ev(EventKind::FileDelete {
            tool: "file_change".to_string(),
            path: "src/old.ts".to_string(),
        }),
        write(""),
    ];

    let summary = summarize_events(&events);
    assert!(summary.files_modified.contains("src/auth.ts"));
    assert!(summary.files_created.contains("src/types.ts"));
    assert!(summary.files_read.contains("src/config.ts"));
    assert!(summary.files_deleted.contains("src/old.ts"));
    assert_eq!(summary.files_modified.len(), 1);
    assert_eq!(summary.tool_call_count, 4);
}

#[test]
fn tools_and_commands_are_tracked() {
    let events = [
        tool("write_file"),
        tool("read_file"),
        bash("npm install"),
        bash("npm test"),
    ];

    let summary = summarize_events(&events);
    let tools: Vec<_> = summary.tools_used.iter().map(String::as_str).collect();
    assert_eq!(tools, ["bash", "read_file", "write_file"]);
    assert_eq!(summary.tool_call_count, 4);
    assert_eq!(summary.bash_commands, ["npm install", "npm test"]);
}

#[test]
fn errors_come_from_error_events_and_failed_results() {
    let events = [
        ev(EventKind::Error {
            message: "File not found".to_string(),
        }),
        raw("npm ERR! Test failed with exit code 1"),
        result(ResultStatus::Error, None),
    ];

    let summary = summarize_events(&events);
    assert_eq!(
        summary.errors,
        ["File not found", "npm ERR! Test failed with exit code 1"]
    );
}

#[test]
fn blank_error_falls_back_to_recent_raw_output() {
    let long = format!("Exception: {}", "x".repeat(600));
    let events = [
        raw("compiling"),
        raw(&long),
        ev(EventKind::Error {
            message: "  ".to_string(),
        }),
    ];

    let summary = summarize_events(&events);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].chars().count(), 500);
    assert!(summary.errors[0].starts_with("Exception: "));
    assert!(summary.errors[0].ends_with("..."));
}

#[test]
fn successful_result_adds_no_error() {
    let summary = summarize_events(&[raw("error: retrying"), result(ResultStatus::Success, None)]);
    assert!(summary.errors.is_empty());
}

#[test]
fn last_non_empty_message_wins() {
    let events = [
        message("Starting task...", false),
        message("Task completed successfully!", true),
        message("", true),
    ];
    let summary = summarize_events(&events);
    assert_eq!(
        summary.final_message.as_deref(),
        Some("Task completed successfully!")
    );
}

#[test]
fn reported_duration_and_counts() {
    let mut events = vec![init(); 9];
    events.push(result(ResultStatus::Success, Some(7_500)));

    let summary = summarize_events(&events);
    assert_eq!(summary.reported_duration_ms, Some(7_500));
    assert_eq!(summary.event_count, 10);
    assert_eq!(summary.last_activity, Some("result"));
}

#[test]
fn brief_view_caps_file_lists() {
    let events: Vec<_> = ["a", "b", "c", "d", "e", "f"]
        .iter()
        .map(|p| write(&format!("src/{p}.ts")))
        .collect();
    let summary = summarize_events(&events);

    let view = serde_json::to_value(summary.view(DetailLevel::Brief)).unwrap();
    assert_eq!(view["files_modified"].as_array().unwrap().len(), 5);
    assert_eq!(view["tool_call_count"], 6);
    assert_eq!(view["last_activity"], "file_write");
    assert_eq!(view["has_errors"], false);
    assert!(view.get("tools_used").is_none());
    assert!(view.get("final_message").is_none());
}

#[test]
fn standard_view_truncates_the_message() {
    let events = [
        write("src/auth.ts"),
        tool("write_file"),
        message(&"Done!".repeat(100), true),
    ];
    let summary = summarize_events(&events);

    let view = serde_json::to_value(summary.view(DetailLevel::Standard)).unwrap();
    let text = view["final_message"].as_str().unwrap();
    assert_eq!(text.chars().count(), 200);
    assert!(text.ends_with("..."));
    assert_eq!(view["tools_used"], json!(["write_file"]));
    assert_eq!(view["errors"], json!([]));
    assert!(view.get("files_read").is_none());
}

#[test]
fn detailed_view_keeps_the_last_ten_commands() {
    let events: Vec<_> = (0..12).map(|i| bash(&format!("step {i}"))).collect();
    let summary = summarize_events(&events);

    let view = serde_json::to_value(summary.view(DetailLevel::Detailed)).unwrap();
    let commands = view["bash_commands"].as_array().unwrap();
    assert_eq!(commands.len(), 10);
    assert_eq!(commands[0], "step 2");
    assert_eq!(view["event_count"], 12);
    assert!(view.get("files_deleted").is_some());
}

#[test]
fn detail_levels_parse() {
    assert_eq!("Brief".parse::<DetailLevel>().unwrap(), DetailLevel::Brief);
    assert_eq!(
        "nope".parse::<DetailLevel>().unwrap_err().to_string(),
        "Invalid detail level 'nope'. Use 'brief', 'standard' or 'detailed'."
    );
}

#[test]
fn delta_without_new_events() {
    let events = [init(), write("src/auth.ts")];
    let delta = event_delta(&events, 2);
    assert!(!delta.has_changes);
    assert_eq!(delta.new_events_count, 0);
    assert_eq!(delta.current_event_count, 2);

    let past_end = event_delta(&events, 9);
    assert!(!past_end.has_changes);
    assert_eq!(past_end.since_event, 9);
}

#[test]
fn delta_summarizes_only_the_tail() {
    let events = [
        write("src/old.ts"),
        write("src/types.ts"),
        bash("npm install"),
        message("Working on it...", true),
        ev(EventKind::Error {
            message: "Something went wrong".to_string(),
        }),
    ];

    let delta = event_delta(&events, 1);
    assert!(delta.has_changes);
    assert_eq!(delta.new_events_count, 4);
    assert_eq!(delta.current_event_count, 5);
    assert_eq!(delta.new_files_modified, ["src/types.ts"]);
    assert_eq!(
        delta.new_tool_calls,
        ["apply_patch: src/types.ts", "command_execution: npm install"]
    );
    assert_eq!(delta.latest_message.as_deref(), Some("Working on it..."));
    assert_eq!(delta.new_errors, ["Something went wrong"]);
}

#[test]
fn delta_keeps_the_last_five_tool_calls() {
    let events: Vec<_> = (0..8).map(|i| tool(&format!("t{i}"))).collect();
    let delta = event_delta(&events, 0);
    assert_eq!(delta.new_tool_calls, ["t3", "t4", "t5", "t6", "t7"]);
}

#[test]
fn priority_filtering() {
    let events = [
        init(),
        write("src/auth.ts"),
        ev(EventKind::Error {
            message: "Failed".to_string(),
        }),
        ev(EventKind::Thinking {
            content: "Hmm...".to_string(),
            complete: true,
        }),
        tool("read_file"),
        message("partial", false),
    ];

    let critical = filter_by_priority(&events, &[Priority::Critical]);
    let kinds: Vec<_> = critical.iter().map(|e| e.kind.type_name()).collect();
    assert_eq!(kinds, ["file_write", "error"]);

    let default = filter_by_priority(&events, &[Priority::Critical, Priority::Important]);
    let kinds: Vec<_> = default.iter().map(|e| e.kind.type_name()).collect();
    assert_eq!(kinds, ["file_write", "error", "thinking", "tool_use"]);
}

#[test]
fn shell_reads_and_writes() {
    let ops = file_ops_from_shell("sed -n '1,100p' path/to/file.tsx");
    assert_eq!(ops.read, ["path/to/file.tsx"]);
    assert!(ops.written.is_empty());

    let ops = file_ops_from_shell("sed -i 's/old/new/' file.ts");
    assert_eq!(ops.written, ["file.ts"]);
    assert!(ops.read.is_empty());

    assert_eq!(
        file_ops_from_shell("cat > src/App.tsx << 'EOF'").written,
        ["src/App.tsx"]
    );
    assert_eq!(
        file_ops_from_shell(r#"echo "content" > output.txt"#).written,
        ["output.txt"]
    );
    assert_eq!(
        file_ops_from_shell("echo test | tee output.log").written,
        ["output.log"]
    );
    assert_eq!(file_ops_from_shell("head -100 file.txt").read, ["file.txt"]);
    assert_eq!(file_ops_from_shell("tail -n 50 log.txt").read, ["log.txt"]);
    assert_eq!(file_ops_from_shell("npm install"), ShellFileOps::default());
}

#[test]
fn shell_wrapper_is_unwrapped() {
    let ops = file_ops_from_shell(r#"/bin/zsh -lc "sed -n '1,240p' rush/app/src/App.tsx""#);
    assert_eq!(ops.read, ["rush/app/src/App.tsx"]);
}

#[test]
fn summary_picks_up_files_from_shell_commands() {
    let events = [
        bash(r#"/bin/zsh -lc "sed -n '1,100p' src/App.tsx""#),
        bash("cat > src/new.tsx << 'EOF'"),
    ];
    let summary = summarize_events(&events);
    assert!(summary.files_read.contains("src/App.tsx"));
    assert!(summary.files_modified.contains("src/new.tsx"));
    assert_eq!(summary.tool_call_count, 2);
}
