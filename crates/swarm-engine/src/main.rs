//! agent-swarm operator CLI
//!
//! Spawns, inspects and stops detached coding agents from a shell. Every
//! command prints JSON on stdout; logs go to stderr.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;

use swarm_core::config::load_config;
use swarm_core::ndjson::summary::SummaryView;
use swarm_core::ndjson::{
    AgentEvent, DetailLevel, EventDelta, Priority, event_delta, filter_by_priority,
    summarize_events,
};
use swarm_core::{AgentType, Effort};
use swarm_engine::subprocess::check_all_clis;
use swarm_engine::{AgentManager, AgentProcess, AgentSummary, SpawnRequest};

#[derive(Parser, Debug)]
#[command(name = "swarm")]
#[command(version, about = "Run and supervise detached coding-agent CLIs")]
struct Args {
    /// Agents directory (overrides settings and `AGENT_SWARM_DIR`)
    #[arg(long, global = true)]
    agents_dir: Option<PathBuf>,

    /// Maximum number of simultaneously running agents
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, global = true, default_value = "warn", env = "AGENT_SWARM_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON.
    #[arg(long, global = true, env = "AGENT_SWARM_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Start an agent in the background
    Spawn {
        /// Task name used to group related agents
        #[arg(long, default_value = "default")]
        task: String,
        /// Agent CLI: codex, cursor, gemini or claude
        #[arg(long = "type")]
        agent_type: AgentType,
        /// Prompt passed to the agent
        #[arg(long)]
        prompt: String,
        /// Working directory for the agent
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// plan, edit or ralph
        #[arg(long)]
        mode: Option<String>,
        /// fast, default or detailed
        #[arg(long, default_value = "default")]
        effort: Effort,
        /// Session id of the requester
        #[arg(long)]
        parent_session: Option<String>,
    },
    /// List agents
    List {
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        parent_session: Option<String>,
        /// Only running agents
        #[arg(long, conflicts_with = "finished")]
        running: bool,
        /// Only agents in a terminal state
        #[arg(long)]
        finished: bool,
    },
    /// Show one agent and what it has done
    Status {
        agent_id: String,
        #[arg(long, value_enum, default_value_t = StatusFormat::Summary)]
        format: StatusFormat,
        /// brief, standard or detailed (summary format)
        #[arg(long, default_value = "standard")]
        detail: DetailLevel,
        /// Only events after this index (delta and events formats)
        #[arg(long, default_value_t = 0)]
        since: usize,
        /// Drop low-priority events (events format)
        #[arg(long)]
        important_only: bool,
    },
    /// Stop a running agent
    Stop { agent_id: String },
    /// Stop every running agent of a task
    StopTask { task: String },
    /// Report which agent CLIs are installed
    Check,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusFormat {
    /// Files, tools, errors and the last message
    Summary,
    /// Summary of events after `--since` only
    Delta,
    /// The events themselves
    Events,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    #[serde(flatten)]
    agent: AgentSummary,
    detail: DetailLevel,
    summary: SummaryView<'a>,
}

#[derive(Serialize)]
struct DeltaOutput {
    #[serde(flatten)]
    agent: AgentSummary,
    #[serde(flatten)]
    delta: EventDelta,
}

#[derive(Serialize)]
struct EventsOutput<'a> {
    #[serde(flatten)]
    agent: AgentSummary,
    since: usize,
    events: Vec<&'a AgentEvent>,
}

#[derive(Serialize)]
struct StopOutput<'a> {
    agent_id: &'a str,
    stopped: bool,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    swarm_core::tracing_init::init_tracing(
        &format!("swarm_engine={0},swarm_core={0},swarm={0}", args.log_level),
        args.log_json,
    );

    let project_dir = std::env::current_dir()?;
    let mut config = load_config(Some(&project_dir))?;
    if let Some(dir) = args.agents_dir {
        config.agents_dir = Some(dir);
    }
    if let Some(n) = args.max_concurrent {
        config.max_concurrent = n;
    }
    debug!(?config, "Resolved configuration");

    if matches!(args.command, Cmd::Check) {
        return print_json(&check_all_clis(None));
    }

    let mut manager = AgentManager::new(&config);
    manager.initialize()?;

    match args.command {
        Cmd::Spawn {
            task,
            agent_type,
            prompt,
            cwd,
            mode,
            effort,
            parent_session,
        } => {
            let agent = manager.spawn(SpawnRequest {
                task_name: task,
                agent_type,
                prompt,
                cwd,
                mode,
                effort,
                parent_session_id: parent_session,
            })?;
            print_json(&agent.summary())
        }
        Cmd::List {
            task,
            parent_session,
            running,
            finished,
        } => {
            let agents = match (&task, &parent_session) {
                (Some(task), _) => manager.list_by_task(task)?,
                (None, Some(session)) => manager.list_by_parent_session(session)?,
                (None, None) if running => manager.list_running()?,
                (None, None) if finished => manager.list_completed()?,
                (None, None) => manager.list_all()?,
            };
            let summaries: Vec<AgentSummary> = agents
                .into_iter()
                .filter(|a| !running || !a.status().is_terminal())
                .filter(|a| !finished || a.status().is_terminal())
                .filter(|a| {
                    parent_session
                        .as_deref()
                        .is_none_or(|s| a.parent_session_id() == Some(s))
                })
                .map(AgentProcess::summary)
                .collect();
            print_json(&summaries)
        }
        Cmd::Status {
            agent_id,
            format,
            detail,
            since,
            important_only,
        } => {
            let Some(agent) = manager.get(&agent_id)? else {
                anyhow::bail!("Agent not found: {agent_id}");
            };
            let events = agent.cached_events();
            match format {
                StatusFormat::Summary => {
                    let summary = summarize_events(events);
                    print_json(&SummaryOutput {
                        agent: agent.summary(),
                        detail,
                        summary: summary.view(detail),
                    })
                }
                StatusFormat::Delta => print_json(&DeltaOutput {
                    agent: agent.summary(),
                    delta: event_delta(events, since),
                }),
                StatusFormat::Events => {
                    let tail = events.get(since..).unwrap_or_default();
                    let events = if important_only {
                        filter_by_priority(tail, &[Priority::Critical, Priority::Important])
                    } else {
                        tail.iter().collect()
                    };
                    print_json(&EventsOutput {
                        agent: agent.summary(),
                        since,
                        events,
                    })
                }
            }
        }
        Cmd::Stop { agent_id } => {
            let stopped = manager.stop(&agent_id).await?;
            print_json(&StopOutput {
                agent_id: &agent_id,
                stopped,
            })
        }
        Cmd::StopTask { task } => print_json(&manager.stop_by_task(&task).await?),
        Cmd::Check => Ok(()),
    }
}
