//! Argv construction for each agent CLI.

use std::path::Path;

use swarm_core::{AgentMode, AgentType};

const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Appended to every prompt so each run ends with a short structured summary.
const SUMMARY_SUFFIX: &str = "\n\nWhen you are done, end your final message with a short summary \
under the heading `## Summary` listing: what you did, the files you changed, \
and anything left unresolved. Keep it under 10 lines.";

/// Prepended to claude prompts outside edit mode. Nobody is attached to the
/// session to approve a plan or answer a question.
const CLAUDE_PLAN_PREAMBLE: &str = "You are running headless with no human attached. \
If you are in plan mode, do not wait for plan approval and do not call ExitPlanMode: \
write the complete plan in your final message instead. Do not ask clarifying \
questions; state your assumptions and continue.\n\n";

/// Claude's combined permission flag and the value its template starts with.
const CLAUDE_PERMISSION_FLAG: &str = "--permission-mode";

const fn template(agent_type: AgentType) -> &'static [&'static str] {
    match agent_type {
        AgentType::Codex => &["codex", "exec", "--skip-git-repo-check", PROMPT_PLACEHOLDER, "--json"],
        AgentType::Cursor => &["cursor-agent", "-p", "--output-format", "stream-json", PROMPT_PLACEHOLDER],
        AgentType::Gemini => &["gemini", "-p", PROMPT_PLACEHOLDER, "--output-format", "stream-json"],
        AgentType::Claude => &[
            "claude",
            "-p",
            PROMPT_PLACEHOLDER,
            "--output-format",
            "stream-json",
            "--verbose",
            CLAUDE_PERMISSION_FLAG,
            "plan",
        ],
    }
}

/// Inputs to [`build_command`].
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec<'a> {
    pub agent_type: AgentType,
    pub prompt: &'a str,
    pub mode: AgentMode,
    /// Already resolved from the effort tier.
    pub model: &'a str,
    pub cwd: Option<&'a Path>,
    /// Claude settings file, passed only to claude.
    pub claude_settings: Option<&'a Path>,
}

/// Build the argv for one agent run. `argv[0]` is the bare executable name.
pub fn build_command(spec: &CommandSpec<'_>) -> Vec<String> {
    let agent_type = spec.agent_type;

    let mut prompt = String::new();
    if agent_type == AgentType::Claude && spec.mode != AgentMode::Edit {
        prompt.push_str(CLAUDE_PLAN_PREAMBLE);
    }
    prompt.push_str(spec.prompt);
    prompt.push_str(SUMMARY_SUFFIX);

    let mut argv: Vec<String> = template(agent_type)
        .iter()
        .map(|part| {
            if *part == PROMPT_PLACEHOLDER {
                prompt.clone()
            } else {
                (*part).to_string()
            }
        })
        .collect();

    if agent_type == AgentType::Claude {
        if let Some(settings) = spec.claude_settings {
            argv.push("--settings".to_string());
            argv.push(settings.display().to_string());
        }
        if let Some(cwd) = spec.cwd {
            argv.push("--add-dir".to_string());
            argv.push(cwd.display().to_string());
        }
    }

    match agent_type {
        // Options must follow the `exec` subcommand, ahead of the prompt.
        AgentType::Codex => {
            let at = argv.iter().position(|a| a == "exec").map_or(argv.len(), |i| i + 1);
            argv.insert(at, "--model".to_string());
            argv.insert(at + 1, spec.model.to_string());
        }
        AgentType::Cursor | AgentType::Gemini | AgentType::Claude => {
            argv.extend(["--model".to_string(), spec.model.to_string()]);
        }
    }

    match (spec.mode, agent_type) {
        (AgentMode::Plan, _) => {}
        (AgentMode::Edit, AgentType::Codex) => argv.push("--full-auto".to_string()),
        (AgentMode::Edit | AgentMode::Ralph, AgentType::Cursor) => argv.push("--force".to_string()),
        (AgentMode::Edit, AgentType::Gemini) => {
            argv.extend(["--approval-mode".to_string(), "auto_edit".to_string()]);
        }
        (AgentMode::Edit, AgentType::Claude) => {
            remove_flag_pair(&mut argv, CLAUDE_PERMISSION_FLAG);
            argv.extend([CLAUDE_PERMISSION_FLAG.to_string(), "acceptEdits".to_string()]);
        }
        (AgentMode::Ralph, AgentType::Codex) => {
            argv.push("--dangerously-bypass-approvals-and-sandbox".to_string());
        }
        (AgentMode::Ralph, AgentType::Gemini) => argv.push("--yolo".to_string()),
        (AgentMode::Ralph, AgentType::Claude) => {
            remove_flag_pair(&mut argv, CLAUDE_PERMISSION_FLAG);
            argv.push("--dangerously-skip-permissions".to_string());
        }
    }

    argv
}

/// Remove `flag` and the value that follows it.
fn remove_flag_pair(argv: &mut Vec<String>, flag: &str) {
    if let Some(i) = argv.iter().position(|a| a == flag) {
        argv.remove(i);
        if i < argv.len() {
            argv.remove(i);
        }
    }
}
