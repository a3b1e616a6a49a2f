//! Agents base-directory resolution.
//!
//! The first call to [`AgentsDir::resolve`] picks a directory and caches it;
//! every later call returns the cached path.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::meta::META_FILE;
use crate::error::AgentError;

const WRITE_PROBE: &str = ".write_test";

/// Lazily resolved agents base directory.
#[derive(Debug, Clone)]
pub struct AgentsDir {
    override_dir: Option<PathBuf>,
    candidates: Vec<PathBuf>,
    resolved: Option<PathBuf>,
}

impl AgentsDir {
    /// Locator using `override_dir` when writable, else [`default_candidates`].
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        Self::with_candidates(override_dir, default_candidates())
    }

    pub const fn with_candidates(override_dir: Option<PathBuf>, candidates: Vec<PathBuf>) -> Self {
        Self {
            override_dir,
            candidates,
            resolved: None,
        }
    }

    /// The cached directory, if already resolved.
    pub fn get(&self) -> Option<&Path> {
        self.resolved.as_deref()
    }

    /// Resolve and create the base directory.
    ///
    /// Order: a writable override; a writable candidate that already holds
    /// agent data; the first writable candidate.
    pub fn resolve(&mut self) -> Result<&Path, AgentError> {
        let dir = match self.resolved.take() {
            Some(dir) => dir,
            None => self.pick()?,
        };
        Ok(self.resolved.insert(dir).as_path())
    }

    fn pick(&self) -> Result<PathBuf, AgentError> {
        if let Some(dir) = &self.override_dir {
            if is_writable(dir) {
                return Ok(dir.clone());
            }
            warn!(path = %dir.display(), "Configured agents directory is not writable");
        }

        let canonical = self.candidates.first();
        let writable: Vec<&PathBuf> = self.candidates.iter().filter(|c| is_writable(c)).collect();

        if let Some(dir) = writable.iter().find(|c| has_agent_data(c)) {
            if Some(*dir) != canonical {
                info!(path = %dir.display(), "Using existing agent storage");
            }
            return Ok((*dir).clone());
        }
        if let Some(dir) = writable.first() {
            if Some(*dir) != canonical {
                info!(path = %dir.display(), "Falling back to agent storage");
            }
            return Ok((*dir).clone());
        }

        let tried = self
            .override_dir
            .iter()
            .chain(&self.candidates)
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(AgentError::NoStorageDir { tried })
    }
}

/// Candidate base directories, most preferred first.
pub fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".agent-swarm").join("agents"));
        candidates.push(home.join(".claude").join("agent-swarm").join("agents"));
    }
    if let Some(state) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(state).join("agent-swarm").join("agents"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(".agent-swarm").join("agents"));
    }
    candidates.push(std::env::temp_dir().join("agent-swarm").join("agents"));
    candidates
}

/// Create `dir` if needed and check a file can be written into it.
fn is_writable(dir: &Path) -> bool {
    let probe = dir.join(WRITE_PROBE);
    let result = std::fs::create_dir_all(dir)
        .and_then(|()| std::fs::write(&probe, b""))
        .and_then(|()| std::fs::remove_file(&probe));
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Agent storage path is not writable");
            false
        }
    }
}

fn has_agent_data(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|entries| {
        entries
            .flatten()
            .any(|entry| entry.path().join(META_FILE).is_file())
    })
}
