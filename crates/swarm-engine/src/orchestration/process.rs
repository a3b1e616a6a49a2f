//! A single agent: identity, incremental log reader, accumulated events.
//!
//! Nothing here runs in the background. Events are read and status is
//! reconciled only when a caller asks, via [`AgentProcess::read_new_events`]
//! or [`AgentProcess::update_status_from_process`].

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use swarm_core::ndjson::{AgentEvent, EventKind, ResultStatus, extract_timestamp, normalize_events};
use swarm_core::{AgentMode, AgentStatus, AgentType};
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::storage::{AgentMeta, STDOUT_FILE};
use crate::subprocess::signals;

/// Upper bound on bytes consumed by one read.
const READ_CHUNK_BYTES: u64 = 1024 * 1024;

/// One running or finished agent.
#[derive(Debug)]
pub struct AgentProcess {
    meta: AgentMeta,
    dir: PathBuf,
    events: Vec<AgentEvent>,
    /// Bytes taken off the log so far, including `pending`.
    cursor: u64,
    /// Tail of the log read past the last newline.
    pending: Vec<u8>,
    /// Exit code collected by `waitpid`; only ever set for our own children.
    exit_code: Option<i32>,
}

/// Display projection of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub task_name: String,
    pub agent_type: AgentType,
    pub status: AgentStatus,
    pub mode: AgentMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub event_count: usize,
    pub duration: Option<String>,
    pub parent_session_id: Option<String>,
    pub cwd: Option<PathBuf>,
    pub pid: Option<u32>,
}

impl AgentProcess {
    /// Wrap metadata for an agent stored under `base_dir/<agent_id>`.
    pub fn new(meta: AgentMeta, base_dir: &Path) -> Self {
        let dir = base_dir.join(&meta.agent_id);
        Self {
            meta,
            dir,
            events: Vec::new(),
            cursor: 0,
            pending: Vec::new(),
            exit_code: None,
        }
    }

    /// Rehydrate from `base_dir/<agent_id>/meta.json`.
    ///
    /// Returns `None` when the file is missing, unparsable, or names a
    /// different agent.
    pub fn load_from_disk(agent_id: &str, base_dir: &Path) -> Option<Self> {
        let dir = base_dir.join(agent_id);
        let meta = match AgentMeta::read(&dir) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(agent_id, error = %e, "Failed to load agent metadata");
                return None;
            }
        };
        if meta.agent_id != agent_id {
            warn!(
                agent_id,
                recorded = %meta.agent_id,
                "Agent metadata does not match its directory, ignoring"
            );
            return None;
        }
        Some(Self::new(meta, base_dir))
    }

    pub fn agent_id(&self) -> &str {
        &self.meta.agent_id
    }

    pub fn task_name(&self) -> &str {
        &self.meta.task_name
    }

    pub const fn agent_type(&self) -> AgentType {
        self.meta.agent_type
    }

    pub fn prompt(&self) -> &str {
        &self.meta.prompt
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.meta.cwd.as_deref()
    }

    pub const fn mode(&self) -> AgentMode {
        self.meta.mode
    }

    pub const fn pid(&self) -> Option<u32> {
        self.meta.pid
    }

    pub const fn status(&self) -> AgentStatus {
        self.meta.status
    }

    pub const fn started_at(&self) -> DateTime<Utc> {
        self.meta.started_at
    }

    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.meta.completed_at
    }

    pub fn parent_session_id(&self) -> Option<&str> {
        self.meta.parent_session_id.as_deref()
    }

    pub const fn meta(&self) -> &AgentMeta {
        &self.meta
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stdout_path(&self) -> PathBuf {
        self.dir.join(STDOUT_FILE)
    }

    /// Events read so far, without touching the log.
    pub fn cached_events(&self) -> &[AgentEvent] {
        &self.events
    }

    /// All events, after reading any new log output.
    pub fn events(&mut self) -> &[AgentEvent] {
        self.read_new_events();
        &self.events
    }

    /// Events after the first `index`, after reading any new log output.
    pub fn events_since(&mut self, index: usize) -> &[AgentEvent] {
        self.read_new_events();
        self.events.get(index..).unwrap_or_default()
    }

    /// Persist metadata to `meta.json`.
    pub fn save_meta(&self) -> Result<(), AgentError> {
        self.meta
            .write(&self.dir)
            .map_err(|e| AgentError::MetadataPersist {
                id: self.meta.agent_id.clone(),
                reason: e.to_string(),
            })
    }

    fn save_meta_logged(&self) {
        if let Err(e) = self.save_meta() {
            warn!(agent_id = %self.meta.agent_id, error = %e, "Failed to save agent metadata");
        }
    }

    /// Tail the output log once, consuming complete lines only.
    ///
    /// Reads at most one chunk. Bytes past the last newline are kept until
    /// the rest of their line arrives, so a line longer than a chunk still
    /// yields its events once, on a later call.
    pub fn read_new_events(&mut self) {
        self.read_chunk();
    }

    /// Tail the output log to its end, including a trailing partial line.
    /// Used once the writer is gone.
    fn drain_events(&mut self) {
        while self.read_chunk() > 0 {}
        self.flush_pending();
    }

    /// Read at most one chunk from the cursor and ingest every line it
    /// completes. Returns the bytes read.
    fn read_chunk(&mut self) -> u64 {
        let path = self.stdout_path();
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(agent_id = %self.meta.agent_id, error = %e, "Failed to open agent log");
                return 0;
            }
        };

        let mut buf = Vec::new();
        let read = file
            .seek(SeekFrom::Start(self.cursor))
            .and_then(|_| (&mut file).take(READ_CHUNK_BYTES).read_to_end(&mut buf));
        if let Err(e) = read {
            warn!(agent_id = %self.meta.agent_id, error = %e, "Failed to read agent log");
            return 0;
        }
        if buf.is_empty() {
            return 0;
        }
        let read = buf.len() as u64;
        self.cursor += read;
        self.pending.append(&mut buf);

        if let Some(i) = self.pending.iter().rposition(|b| *b == b'\n') {
            let rest = self.pending.split_off(i + 1);
            let complete = std::mem::replace(&mut self.pending, rest);
            let fallback_ts = self.log_mtime();
            for line in complete.split(|b| *b == b'\n') {
                self.ingest_bytes(line, fallback_ts);
            }
        }
        read
    }

    /// Ingest the unterminated tail as a final line.
    ///
    /// Invalid UTF-8 in it (typically a character cut off by the writer's
    /// death) is replaced with U+FFFD; the rest of the line is kept as is.
    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let tail = std::mem::take(&mut self.pending);
        let fallback_ts = self.log_mtime();
        self.ingest_bytes(&tail, fallback_ts);
    }

    fn log_mtime(&self) -> DateTime<Utc> {
        std::fs::metadata(self.stdout_path())
            .and_then(|m| m.modified())
            .map_or_else(|_| Utc::now(), DateTime::<Utc>::from)
    }

    /// Decode one complete line and ingest it unless blank.
    fn ingest_bytes(&mut self, line: &[u8], fallback_ts: DateTime<Utc>) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let text = String::from_utf8_lossy(line);
        if !text.trim().is_empty() {
            self.ingest_line(&text, fallback_ts);
        }
    }

    fn ingest_line(&mut self, line: &str, fallback_ts: DateTime<Utc>) {
        let agent_type = self.meta.agent_type;
        let (kinds, timestamp) = match serde_json::from_str::<Value>(line) {
            Ok(raw) => (
                normalize_events(agent_type, &raw),
                extract_timestamp(&raw).unwrap_or(fallback_ts),
            ),
            Err(_) => (
                vec![EventKind::Raw {
                    content: line.to_string(),
                }],
                fallback_ts,
            ),
        };

        for kind in kinds {
            if let Some(result) = kind.terminal_status()
                && self.meta.status == AgentStatus::Running
            {
                self.meta.status = match result {
                    ResultStatus::Success => AgentStatus::Completed,
                    ResultStatus::Error => AgentStatus::Failed,
                };
                self.meta.completed_at = Some(timestamp);
                info!(
                    agent_id = %self.meta.agent_id,
                    status = %self.meta.status,
                    "Agent reported end of turn"
                );
            }
            self.events.push(AgentEvent {
                agent: agent_type,
                timestamp,
                kind,
            });
        }
    }

    /// Whether the recorded pid still exists.
    pub fn is_process_alive(&self) -> bool {
        self.meta.pid.is_some_and(signals::is_alive)
    }

    /// Exit code if the process is positively known to have exited.
    ///
    /// Only our own children can be reaped; for a rehydrated agent this is
    /// always `None`.
    pub fn reap_process(&mut self) -> Option<i32> {
        if self.exit_code.is_none()
            && let Some(pid) = self.meta.pid
            && let Some(code) = signals::reap(pid)
        {
            debug!(agent_id = %self.meta.agent_id, pid, code, "Reaped agent process");
            self.exit_code = Some(code);
        }
        self.exit_code
    }

    /// Reconcile recorded status with the OS process, then persist.
    pub fn update_status_from_process(&mut self) {
        // Reap first: an unreaped child of ours is a zombie and still answers
        // the liveness probe.
        let exit_code = self.reap_process();
        if exit_code.is_none() && self.is_process_alive() {
            self.read_new_events();
            self.save_meta_logged();
            return;
        }

        // The log may still hold a terminal marker written just before exit.
        self.drain_events();

        if self.meta.status == AgentStatus::Running {
            self.meta.status = if exit_code.is_some_and(|code| code != 0) {
                AgentStatus::Failed
            } else {
                AgentStatus::Completed
            };
            self.meta.completed_at = Some(self.inferred_completion());
            info!(
                agent_id = %self.meta.agent_id,
                status = %self.meta.status,
                exit_code,
                "Agent process exited without an end-of-turn event"
            );
        } else if self.meta.completed_at.is_none() {
            self.meta.completed_at = Some(self.inferred_completion());
        }

        self.save_meta_logged();
    }

    /// Latest event timestamp, else the start time.
    fn inferred_completion(&self) -> DateTime<Utc> {
        self.events
            .iter()
            .map(|e| e.timestamp)
            .max()
            .unwrap_or(self.meta.started_at)
    }

    /// Mark a running agent stopped. Returns `false` if it was already terminal.
    pub(crate) fn mark_stopped(&mut self) -> bool {
        if self.meta.status.is_terminal() {
            return false;
        }
        self.meta.status = AgentStatus::Stopped;
        self.meta.completed_at = Some(Utc::now());
        true
    }

    /// Human-readable run time, `None` when unknown.
    pub fn duration(&self) -> Option<String> {
        self.duration_at(Utc::now())
    }

    fn duration_at(&self, now: DateTime<Utc>) -> Option<String> {
        let end = match (self.meta.completed_at, self.meta.status) {
            (Some(end), _) => end,
            (None, AgentStatus::Running) => now,
            (None, _) => return None,
        };
        Some(format_duration((end - self.meta.started_at).num_milliseconds()))
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            agent_id: self.meta.agent_id.clone(),
            task_name: self.meta.task_name.clone(),
            agent_type: self.meta.agent_type,
            status: self.meta.status,
            mode: self.meta.mode,
            started_at: self.meta.started_at,
            completed_at: self.meta.completed_at,
            event_count: self.events.len(),
            duration: self.duration(),
            parent_session_id: self.meta.parent_session_id.clone(),
            cwd: self.meta.cwd.clone(),
            pid: self.meta.pid,
        }
    }
}

/// Whole seconds under a minute, else minutes to one decimal.
fn format_duration(millis: i64) -> String {
    let millis = millis.max(0);
    if millis < 60_000 {
        format!("{} seconds", millis / 1_000)
    } else {
        let tenths = (millis + 3_000) / 6_000;
        format!("{}.{} minutes", tenths / 10, tenths % 10)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
#[path = "process_tests.rs"]
mod tests;
