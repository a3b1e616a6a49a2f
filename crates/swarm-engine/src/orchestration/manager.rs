//! Agent registry and lifecycle manager.
//!
//! [`AgentManager`] is the coordinator that:
//! - spawns detached agent CLIs under a concurrency ceiling
//! - rehydrates agents from the agents directory on first use, pruning expired ones
//! - stops agents (SIGTERM to the process group -> grace -> SIGKILL)
//! - evicts finished agents beyond the retention ceiling
//!
//! There is no monitoring task. Every query reconciles the agents it returns
//! against the OS before answering.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use swarm_core::{AgentMode, AgentStatus, AgentType, Effort, ModelTable, SwarmConfig};
use tracing::{debug, error, info, warn};

use super::process::AgentProcess;
use crate::error::AgentError;
use crate::storage::{AgentMeta, AgentsDir, STDOUT_FILE};
use crate::subprocess::{CommandSpec, build_command, check_cli_available, signals};

/// Length of generated agent ids.
const AGENT_ID_LEN: usize = 8;

/// Parameters for spawning one agent.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Grouping label shared by related agents.
    pub task_name: String,
    pub agent_type: AgentType,
    pub prompt: String,
    /// Working directory; the manager's own cwd when unset.
    pub cwd: Option<PathBuf>,
    /// Mode name (`plan`, `edit`, `ralph`); the configured default when unset.
    pub mode: Option<String>,
    pub effort: Effort,
    /// Correlation id of the session that requested the agent.
    pub parent_session_id: Option<String>,
}

impl SpawnRequest {
    pub fn new(
        task_name: impl Into<String>,
        agent_type: AgentType,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            agent_type,
            prompt: prompt.into(),
            cwd: None,
            mode: None,
            effort: Effort::Default,
            parent_session_id: None,
        }
    }
}

/// Result of [`AgentManager::stop_by_task`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub stopped: Vec<String>,
    pub already_stopped: Vec<String>,
}

/// Registry of agents backed by the agents directory.
#[derive(Debug)]
pub struct AgentManager {
    agents: HashMap<String, AgentProcess>,
    locator: AgentsDir,
    /// Set once the first disk scan has finished.
    initialized: bool,
    max_concurrent: usize,
    max_retained: usize,
    retention_days: u32,
    default_mode: AgentMode,
    stop_grace: Duration,
    filter_by_cwd: Option<PathBuf>,
    claude_settings: Option<PathBuf>,
    models: ModelTable,
    /// Search path for agent executables; `$PATH` when unset.
    search_path: Option<OsString>,
}

impl AgentManager {
    pub fn new(config: &SwarmConfig) -> Self {
        Self {
            agents: HashMap::new(),
            locator: AgentsDir::new(config.agents_dir.clone()),
            initialized: false,
            max_concurrent: config.max_concurrent,
            max_retained: config.max_retained,
            retention_days: config.retention_days,
            default_mode: config.default_mode,
            stop_grace: config.stop_grace(),
            filter_by_cwd: config.filter_by_cwd.clone(),
            claude_settings: config.claude_settings.clone(),
            models: config.model_table(),
            search_path: None,
        }
    }

    /// Look up agent executables in `path` instead of `$PATH`.
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_locator(mut self, locator: AgentsDir) -> Self {
        self.locator = locator;
        self
    }

    pub const fn default_mode(&self) -> AgentMode {
        self.default_mode
    }

    /// The resolved agents directory, once initialized.
    pub fn base_dir(&self) -> Option<&Path> {
        self.locator.get()
    }

    /// Resolve the agents directory and load agents already on disk.
    /// Only the first successful call scans; later calls are no-ops.
    pub fn initialize(&mut self) -> Result<(), AgentError> {
        self.ensure_initialized()?;
        Ok(())
    }

    fn ensure_initialized(&mut self) -> Result<PathBuf, AgentError> {
        let base = self.locator.resolve()?.to_path_buf();
        if !self.initialized {
            self.load_existing_agents(&base);
            self.initialized = true;
        }
        Ok(base)
    }

    fn load_existing_agents(&mut self, base: &Path) {
        let entries = match std::fs::read_dir(base) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %base.display(), error = %e, "Failed to scan agents directory");
                return;
            }
        };

        let cutoff = Utc::now() - TimeDelta::days(i64::from(self.retention_days));
        let (mut loaded, mut skipped, mut pruned) = (0_usize, 0_usize, 0_usize);

        for entry in entries.flatten() {
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let Some(agent_id) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(mut agent) = AgentProcess::load_from_disk(&agent_id, base) else {
                continue;
            };

            if agent.completed_at().is_some_and(|at| at < cutoff) {
                remove_agent_dir(&agent_id, agent.dir());
                pruned += 1;
                continue;
            }
            if let Some(filter) = &self.filter_by_cwd
                && agent.cwd() != Some(filter.as_path())
            {
                skipped += 1;
                continue;
            }

            agent.update_status_from_process();
            self.agents.insert(agent_id, agent);
            loaded += 1;
        }

        info!(loaded, skipped, pruned, path = %base.display(), "Loaded existing agents");
    }

    /// Start an agent CLI as a detached process.
    ///
    /// Validation failures leave nothing behind. Failures after the agent
    /// directory exists roll it back before returning.
    pub fn spawn(&mut self, request: SpawnRequest) -> Result<&mut AgentProcess, AgentError> {
        let base = self.ensure_initialized()?;
        let agent_type = request.agent_type;

        let mode = match request.mode.as_deref() {
            Some(raw) => raw.parse::<AgentMode>()?,
            None => self.default_mode,
        };
        let model = self.models.resolve(request.effort, agent_type).to_string();

        let running = self.refresh_running();
        if running >= self.max_concurrent {
            return Err(AgentError::ConcurrencyLimit {
                max: self.max_concurrent,
            });
        }

        let executable = check_cli_available(agent_type, self.search_path.as_deref())?;
        let cwd = request.cwd.as_deref().map(resolve_cwd).transpose()?;

        let agent_id = self.generate_agent_id(&base);
        let argv = build_command(&CommandSpec {
            agent_type,
            prompt: &request.prompt,
            mode,
            model: &model,
            cwd: cwd.as_deref(),
            claude_settings: self.claude_settings.as_deref(),
        });

        let dir = base.join(&agent_id);
        if let Err(source) = std::fs::create_dir_all(&dir) {
            self.cleanup_partial_agent(&agent_id, &dir);
            return Err(AgentError::AgentDir { path: dir, source });
        }

        let pid = match launch(&executable, &argv, cwd.as_deref(), &dir.join(STDOUT_FILE)) {
            Ok(pid) => pid,
            Err(e) => {
                error!(agent_id = %agent_id, error = %e, "Failed to launch agent");
                self.cleanup_partial_agent(&agent_id, &dir);
                return Err(e);
            }
        };

        let agent = AgentProcess::new(
            AgentMeta {
                agent_id: agent_id.clone(),
                task_name: request.task_name,
                agent_type,
                prompt: request.prompt,
                cwd,
                mode,
                pid: Some(pid),
                status: AgentStatus::Running,
                started_at: Utc::now(),
                completed_at: None,
                parent_session_id: request.parent_session_id,
            },
            &base,
        );
        if let Err(e) = agent.save_meta() {
            error!(agent_id = %agent_id, error = %e, "Failed to persist new agent, killing it");
            signals::kill_group(pid);
            self.cleanup_partial_agent(&agent_id, &dir);
            return Err(e);
        }

        info!(
            agent_id = %agent_id,
            agent_type = %agent_type,
            mode = %mode,
            model = %model,
            task = %agent.task_name(),
            pid,
            "Spawned agent"
        );
        self.agents.insert(agent_id.clone(), agent);
        self.cleanup_old_agents();

        self.agents
            .get_mut(&agent_id)
            .ok_or(AgentError::NotFound { id: agent_id })
    }

    /// Reconcile every running agent and count those still running.
    fn refresh_running(&mut self) -> usize {
        self.agents
            .values_mut()
            .filter(|a| a.status() == AgentStatus::Running)
            .for_each(AgentProcess::update_status_from_process);
        self.agents
            .values()
            .filter(|a| a.status() == AgentStatus::Running)
            .count()
    }

    fn generate_agent_id(&self, base: &Path) -> String {
        loop {
            let id: String = uuid::Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(AGENT_ID_LEN)
                .collect();
            if !self.agents.contains_key(&id) && !base.join(&id).exists() {
                return id;
            }
        }
    }

    /// Register `agent_id` from disk if it is not registered yet. Returns
    /// whether the agent is now in the registry.
    fn adopt(&mut self, agent_id: &str, base: &Path) -> bool {
        if self.agents.contains_key(agent_id) {
            return true;
        }
        if !is_plain_id(agent_id) {
            return false;
        }
        let Some(agent) = AgentProcess::load_from_disk(agent_id, base) else {
            return false;
        };
        debug!(agent_id, "Adopted agent from disk");
        self.agents.insert(agent_id.to_string(), agent);
        true
    }

    /// A refreshed agent, adopting it from disk if it is not registered yet.
    pub fn get(&mut self, agent_id: &str) -> Result<Option<&mut AgentProcess>, AgentError> {
        let base = self.ensure_initialized()?;
        if !self.adopt(agent_id, &base) {
            return Ok(None);
        }
        Ok(self.agents.get_mut(agent_id).map(|agent| {
            agent.update_status_from_process();
            agent
        }))
    }

    /// Every agent, refreshed, oldest first.
    pub fn list_all(&mut self) -> Result<Vec<&AgentProcess>, AgentError> {
        self.ensure_initialized()?;
        for agent in self.agents.values_mut() {
            agent.update_status_from_process();
        }
        let mut agents: Vec<&AgentProcess> = self.agents.values().collect();
        agents.sort_by(|a, b| {
            a.started_at()
                .cmp(&b.started_at())
                .then_with(|| a.agent_id().cmp(b.agent_id()))
        });
        Ok(agents)
    }

    fn list_where(
        &mut self,
        keep: impl Fn(&AgentProcess) -> bool,
    ) -> Result<Vec<&AgentProcess>, AgentError> {
        let mut agents = self.list_all()?;
        agents.retain(|a| keep(a));
        Ok(agents)
    }

    pub fn list_running(&mut self) -> Result<Vec<&AgentProcess>, AgentError> {
        self.list_where(|a| a.status() == AgentStatus::Running)
    }

    /// Agents in any terminal state.
    pub fn list_completed(&mut self) -> Result<Vec<&AgentProcess>, AgentError> {
        self.list_where(|a| a.status().is_terminal())
    }

    pub fn list_by_task(&mut self, task_name: &str) -> Result<Vec<&AgentProcess>, AgentError> {
        self.list_where(|a| a.task_name() == task_name)
    }

    pub fn list_by_parent_session(
        &mut self,
        parent_session_id: &str,
    ) -> Result<Vec<&AgentProcess>, AgentError> {
        self.list_where(|a| a.parent_session_id() == Some(parent_session_id))
    }

    /// Stop a running agent. Returns `false` if it is unknown or not running.
    ///
    /// The agent is marked stopped once the signals are sent, whether or not
    /// the process has actually exited.
    pub async fn stop(&mut self, agent_id: &str) -> Result<bool, AgentError> {
        let base = self.ensure_initialized()?;
        let running = self.adopt(agent_id, &base)
            && self
                .agents
                .get(agent_id)
                .is_some_and(|a| a.status() == AgentStatus::Running);
        if !running {
            return Ok(false);
        }
        self.terminate(&[agent_id.to_string()]).await?;
        Ok(true)
    }

    /// Stop every running agent of a task. The grace window is shared.
    pub async fn stop_by_task(&mut self, task_name: &str) -> Result<StopReport, AgentError> {
        let mut report = StopReport::default();
        for agent in self.list_by_task(task_name)? {
            let id = agent.agent_id().to_string();
            if agent.status() == AgentStatus::Running {
                report.stopped.push(id);
            } else {
                report.already_stopped.push(id);
            }
        }
        self.terminate(&report.stopped).await?;
        info!(
            task = %task_name,
            stopped = report.stopped.len(),
            already_stopped = report.already_stopped.len(),
            "Stopped task agents"
        );
        Ok(report)
    }

    /// SIGTERM each group, wait out the grace window, SIGKILL survivors, then
    /// mark every agent stopped.
    async fn terminate(&mut self, ids: &[String]) -> Result<(), AgentError> {
        let mut signalled = false;
        for id in ids {
            if let Some(pid) = self.agents.get(id).and_then(AgentProcess::pid) {
                if signals::terminate_group(pid) {
                    debug!(agent_id = %id, pid, "Sent SIGTERM to agent process group");
                    signalled = true;
                } else {
                    debug!(agent_id = %id, pid, "Agent process already gone");
                }
            }
        }
        if signalled {
            tokio::time::sleep(self.stop_grace).await;
        }

        let mut first_error = None;
        for id in ids {
            let Some(agent) = self.agents.get_mut(id) else {
                continue;
            };
            if let Some(pid) = agent.pid()
                && agent.reap_process().is_none()
                && agent.is_process_alive()
            {
                warn!(agent_id = %id, pid, "Grace period expired, sending SIGKILL");
                signals::kill_group(pid);
            }
            if agent.mark_stopped() {
                info!(agent_id = %id, "Agent stopped");
            }
            if let Err(e) = agent.save_meta() {
                error!(agent_id = %id, error = %e, "Failed to persist stopped agent");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            agent.reap_process();
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Drop a half-created agent from the registry and disk.
    fn cleanup_partial_agent(&mut self, agent_id: &str, dir: &Path) {
        self.agents.remove(agent_id);
        remove_agent_dir(agent_id, dir);
    }

    /// Evict the oldest finished agents until at most `max_retained` remain.
    /// Agents without a completion time count as oldest.
    fn cleanup_old_agents(&mut self) {
        let mut finished: Vec<(Option<DateTime<Utc>>, String)> = self
            .agents
            .values()
            .filter(|a| a.status().is_terminal())
            .map(|a| (a.completed_at(), a.agent_id().to_string()))
            .collect();
        if finished.len() <= self.max_retained {
            return;
        }
        finished.sort();
        let excess = finished.len() - self.max_retained;

        for (_, agent_id) in finished.into_iter().take(excess) {
            if let Some(agent) = self.agents.remove(&agent_id) {
                remove_agent_dir(&agent_id, agent.dir());
                info!(agent_id = %agent_id, "Evicted finished agent beyond retention limit");
            }
        }
    }
}

/// Spawn `argv` (with `argv[0]` resolved to `executable`) in its own process
/// group, stdout and stderr both appended to `log_path`.
fn launch(
    executable: &Path,
    argv: &[String],
    cwd: Option<&Path>,
    log_path: &Path,
) -> Result<u32, AgentError> {
    let spawn_failed = |e: std::io::Error| AgentError::SpawnFailed {
        reason: e.to_string(),
    };
    let stdout = File::create(log_path).map_err(spawn_failed)?;
    let stderr = stdout.try_clone().map_err(spawn_failed)?;

    let mut command = Command::new(executable);
    command
        .args(argv.iter().skip(1))
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    // Never waited on here: the agent outlives this call and is reaped by
    // `AgentProcess::reap_process` after it exits.
    #[allow(clippy::zombie_processes)]
    let child = command.spawn().map_err(spawn_failed)?;
    Ok(child.id())
}

fn resolve_cwd(cwd: &Path) -> Result<PathBuf, AgentError> {
    let abs = std::path::absolute(cwd)
        .map_err(|_| AgentError::WorkingDirMissing(cwd.to_path_buf()))?;
    if !abs.exists() {
        return Err(AgentError::WorkingDirMissing(abs));
    }
    if !abs.is_dir() {
        return Err(AgentError::WorkingDirNotDirectory(abs));
    }
    Ok(abs)
}

/// Whether `id` names a single directory entry (no separators or `..`).
fn is_plain_id(id: &str) -> bool {
    let mut components = Path::new(id).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

fn remove_agent_dir(agent_id: &str, dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!(agent_id, "Removed agent directory"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(agent_id, error = %e, "Failed to remove agent directory"),
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
#[path = "manager_tests.rs"]
mod tests;
