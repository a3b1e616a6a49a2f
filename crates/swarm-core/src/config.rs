//! Configuration resolution for agent-swarm.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (`<config dir>/agent-swarm/settings.json`)
//! 3. Project config (`.agent-swarm/settings.json`)
//! 4. Environment variables
//! 5. CLI arguments (applied by the binary, highest priority)
//!
//! Settings files are partial: only the keys they contain override the
//! layers below. `model_overrides` objects are merged key by key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::agent::AgentMode;
use crate::error::{Error, Result};
use crate::models::ModelTable;

/// Complete agent-swarm configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Maximum number of agents in `running` state at once.
    pub max_concurrent: usize,
    /// Maximum number of finished agents kept on disk.
    pub max_retained: usize,
    /// Finished agents older than this are pruned at startup.
    pub retention_days: u32,
    /// Mode used when a spawn request does not name one.
    pub default_mode: AgentMode,
    /// Grace window between SIGTERM and SIGKILL when stopping an agent.
    pub stop_grace_ms: u64,
    /// Explicit agents directory; resolved automatically when unset.
    pub agents_dir: Option<PathBuf>,
    /// Only load agents whose cwd equals this path.
    pub filter_by_cwd: Option<PathBuf>,
    /// Claude settings file passed with `--settings`.
    pub claude_settings: Option<PathBuf>,
    /// Loose `{effort: {agent_type: model}}` object.
    pub model_overrides: Value,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_retained: 50,
            retention_days: 7,
            default_mode: AgentMode::Plan,
            stop_grace_ms: 2_000,
            agents_dir: None,
            filter_by_cwd: None,
            claude_settings: None,
            model_overrides: Value::Object(serde_json::Map::new()),
        }
    }
}

impl SwarmConfig {
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Built-in model table with this config's overrides merged in.
    pub fn model_table(&self) -> ModelTable {
        ModelTable::with_overrides(&self.model_overrides)
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<SwarmConfig> {
    let mut merged = serde_json::to_value(SwarmConfig::default())?;

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            merge_value(&mut merged, load_config_file(&global_path)?);
        }
    }

    if let Some(dir) = project_dir {
        let project_path = dir.join(".agent-swarm").join("settings.json");
        if project_path.exists() {
            merge_value(&mut merged, load_config_file(&project_path)?);
        }
    }

    let mut config: SwarmConfig = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid settings: {e}")))?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Get the global settings file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("agent-swarm").join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    if !value.is_object() {
        return Err(Error::Config(format!(
            "Config file {} must contain a JSON object",
            path.display()
        )));
    }
    Ok(value)
}

/// Overlay `overlay` onto `base`. Objects merge recursively, anything else replaces.
fn merge_value(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_value(existing, value);
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Apply `AGENT_SWARM_*` environment overrides read through `lookup`.
pub fn apply_env_overrides(config: &mut SwarmConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(dir) = lookup("AGENT_SWARM_DIR").filter(|v| !v.trim().is_empty()) {
        config.agents_dir = Some(PathBuf::from(dir));
    }

    for key in ["AGENT_SWARM_MODE", "AGENT_SWARM_DEFAULT_MODE"] {
        let Some(raw) = lookup(key) else { continue };
        match raw.parse::<AgentMode>() {
            Ok(mode) => {
                config.default_mode = mode;
                break;
            }
            Err(_) => {
                warn!(
                    var = key,
                    value = %raw,
                    fallback = %config.default_mode,
                    "Invalid default mode in environment, ignoring"
                );
            }
        }
    }

    if let Some(n) = lookup("AGENT_SWARM_MAX_CONCURRENT").and_then(|v| v.parse().ok()) {
        config.max_concurrent = n;
    }
    if let Some(n) = lookup("AGENT_SWARM_MAX_RETAINED").and_then(|v| v.parse().ok()) {
        config.max_retained = n;
    }
    if let Some(n) = lookup("AGENT_SWARM_RETENTION_DAYS").and_then(|v| v.parse().ok()) {
        config.retention_days = n;
    }
    if let Some(path) = lookup("AGENT_SWARM_CLAUDE_SETTINGS").filter(|v| !v.trim().is_empty()) {
        config.claude_settings = Some(PathBuf::from(path));
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::agent::{AgentType, Effort};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = SwarmConfig::default();
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.max_retained, 50);
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.default_mode, AgentMode::Plan);
        assert_eq!(config.stop_grace(), Duration::from_secs(2));
    }

    #[test]
    fn partial_overlay_keeps_other_defaults() {
        let mut merged = serde_json::to_value(SwarmConfig::default()).unwrap();
        merge_value(&mut merged, json!({"max_concurrent": 3}));
        merge_value(
            &mut merged,
            json!({"model_overrides": {"fast": {"claude": "claude-haiku-4-5"}}}),
        );
        merge_value(
            &mut merged,
            json!({"model_overrides": {"detailed": {"codex": "gpt-5.2"}}}),
        );
        let config: SwarmConfig = serde_json::from_value(merged).unwrap();
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.max_retained, 50);

        let table = config.model_table();
        assert_eq!(table.resolve(Effort::Fast, AgentType::Claude), "claude-haiku-4-5");
        assert_eq!(table.resolve(Effort::Detailed, AgentType::Codex), "gpt-5.2");
    }

    #[test]
    fn project_settings_file_is_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings_dir = dir.path().join(".agent-swarm");
        std::fs::create_dir_all(&settings_dir).unwrap();
        std::fs::write(
            settings_dir.join("settings.json"),
            r#"{"retention_days": 1, "default_mode": "edit"}"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.retention_days, 1);
    }

    #[test]
    fn non_object_settings_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(load_config_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn env_overrides_apply_and_invalid_mode_falls_through() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AGENT_SWARM_DIR", "/tmp/swarm-agents"),
            ("AGENT_SWARM_MODE", "turbo"),
            ("AGENT_SWARM_DEFAULT_MODE", "ralph"),
            ("AGENT_SWARM_MAX_CONCURRENT", "2"),
            ("AGENT_SWARM_RETENTION_DAYS", "not-a-number"),
        ]);
        let mut config = SwarmConfig::default();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.agents_dir, Some(PathBuf::from("/tmp/swarm-agents")));
        assert_eq!(config.default_mode, AgentMode::Ralph);
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.retention_days, 7);
    }
}
