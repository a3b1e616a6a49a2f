//! CLI availability probe.
//!
//! Resolves an agent type's executable against a search path (`$PATH` unless
//! the caller supplies one).

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use serde::Serialize;
use swarm_core::AgentType;

use crate::error::AgentError;

/// Installation status of one agent CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CliStatus {
    pub installed: bool,
    pub path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Resolve the agent type's executable, or explain why it is unavailable.
pub fn check_cli_available(
    agent_type: AgentType,
    search_path: Option<&OsStr>,
) -> Result<PathBuf, AgentError> {
    let executable = agent_type.executable();
    find_executable(executable, search_path).ok_or(AgentError::CliNotFound { executable })
}

/// Availability of every supported agent CLI.
pub fn check_all_clis(search_path: Option<&OsStr>) -> BTreeMap<AgentType, CliStatus> {
    AgentType::ALL
        .into_iter()
        .map(|agent_type| {
            let status = match check_cli_available(agent_type, search_path) {
                Ok(path) => CliStatus {
                    installed: true,
                    path: Some(path),
                    error: None,
                },
                Err(e) => CliStatus {
                    installed: false,
                    path: None,
                    error: Some(e.to_string()),
                },
            };
            (agent_type, status)
        })
        .collect()
}

/// First executable file called `name` in `search_path` (or `$PATH`).
pub fn find_executable(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let path_var: OsString = match search_path {
        Some(p) => p.to_os_string(),
        None => std::env::var_os("PATH")?,
    };
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
