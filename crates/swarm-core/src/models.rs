//! Effort tier × agent type model table.
//!
//! Every (effort, agent type) pair has a built-in model. Overrides come from
//! the `model_overrides` config object, shaped `{effort: {agent_type: model}}`,
//! and are merged once when the table is built.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::agent::{AgentType, Effort};

const fn builtin_model(effort: Effort, agent_type: AgentType) -> &'static str {
    match (effort, agent_type) {
        (Effort::Fast, AgentType::Codex) => "gpt-5.1-codex-mini",
        (Effort::Default, AgentType::Codex) => "gpt-5.1-codex",
        (Effort::Detailed, AgentType::Codex) => "gpt-5.1-codex-max",
        (Effort::Fast, AgentType::Cursor) => "composer-1",
        (Effort::Default, AgentType::Cursor) => "sonnet-4.5",
        (Effort::Detailed, AgentType::Cursor) => "opus-4.5",
        (Effort::Fast, AgentType::Gemini) => "gemini-2.5-flash",
        (Effort::Default, AgentType::Gemini) => "gemini-2.5-pro",
        (Effort::Detailed, AgentType::Gemini) => "gemini-3-pro-preview",
        (Effort::Fast, AgentType::Claude) => "haiku",
        (Effort::Default, AgentType::Claude) => "sonnet",
        (Effort::Detailed, AgentType::Claude) => "opus",
    }
}

/// Resolved model table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelTable {
    overrides: HashMap<(Effort, AgentType), String>,
}

impl ModelTable {
    /// The built-in table without overrides.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Build a table with every valid override in `overrides` merged in.
    ///
    /// Unknown tiers or agent types, non-object tiers and non-string or empty
    /// values are skipped with a warning.
    pub fn with_overrides(overrides: &Value) -> Self {
        let mut table = Self::builtin();
        table.merge(overrides);
        table
    }

    /// Merge overrides into this table (later merges win).
    pub fn merge(&mut self, overrides: &Value) {
        let Some(tiers) = overrides.as_object() else {
            if !overrides.is_null() {
                warn!("model_overrides is not an object, ignoring");
            }
            return;
        };

        for (tier, agents) in tiers {
            let Ok(effort) = tier.parse::<Effort>() else {
                warn!(tier = %tier, "Ignoring model override for unknown effort tier");
                continue;
            };
            let Some(agents) = agents.as_object() else {
                warn!(tier = %tier, "Ignoring model override tier that is not an object");
                continue;
            };
            for (agent, model) in agents {
                let Ok(agent_type) = agent.parse::<AgentType>() else {
                    warn!(tier = %tier, agent = %agent, "Ignoring model override for unknown agent type");
                    continue;
                };
                match model.as_str().map(str::trim) {
                    Some(model) if !model.is_empty() => {
                        self.overrides
                            .insert((effort, agent_type), model.to_string());
                    }
                    _ => {
                        warn!(tier = %tier, agent = %agent, "Ignoring empty or non-string model override");
                    }
                }
            }
        }
    }

    /// Model for an agent type at an effort tier.
    pub fn resolve(&self, effort: Effort, agent_type: AgentType) -> &str {
        self.overrides
            .get(&(effort, agent_type))
            .map_or_else(|| builtin_model(effort, agent_type), String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_covers_every_pair() {
        let table = ModelTable::builtin();
        for effort in Effort::ALL {
            for agent in AgentType::ALL {
                assert!(!table.resolve(effort, agent).is_empty());
            }
        }
        assert_eq!(table.resolve(Effort::Default, AgentType::Claude), "sonnet");
    }

    #[test]
    fn valid_override_replaces_builtin() {
        let table = ModelTable::with_overrides(&json!({
            "fast": {"claude": "claude-haiku-4-5"}
        }));
        assert_eq!(table.resolve(Effort::Fast, AgentType::Claude), "claude-haiku-4-5");
        assert_eq!(table.resolve(Effort::Fast, AgentType::Codex), "gpt-5.1-codex-mini");
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let table = ModelTable::with_overrides(&json!({
            "turbo": {"claude": "x"},
            "fast": {"claude": "", "codex": 42, "copilot": "y"},
            "detailed": "opus"
        }));
        assert_eq!(table, ModelTable::builtin());
    }

    #[test]
    fn null_overrides_keep_builtin() {
        assert_eq!(ModelTable::with_overrides(&Value::Null), ModelTable::builtin());
    }
}
