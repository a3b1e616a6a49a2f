//! Persisted agent metadata (`meta.json`).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swarm_core::{AgentMode, AgentStatus, AgentType};

/// Metadata file name inside an agent directory.
pub const META_FILE: &str = "meta.json";
/// Combined stdout/stderr log inside an agent directory.
pub const STDOUT_FILE: &str = "stdout.log";

fn default_task_name() -> String {
    "default".to_string()
}

/// Durable projection of an agent. Events and the read cursor are never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMeta {
    pub agent_id: String,
    #[serde(default = "default_task_name")]
    pub task_name: String,
    pub agent_type: AgentType,
    pub prompt: String,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub mode: AgentMode,
    #[serde(default)]
    pub pid: Option<u32>,
    pub status: AgentStatus,
    #[serde(with = "timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "optional_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_session_id: Option<String>,
}

impl AgentMeta {
    /// Write `meta.json` into `dir`, replacing any previous copy.
    pub fn write(&self, dir: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = dir.join(format!("{META_FILE}.tmp"));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, dir.join(META_FILE))
    }

    /// Read `meta.json` from `dir`.
    pub fn read(dir: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(dir.join(META_FILE))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// RFC 3339 on write. On read, also accepts offset-less ISO-8601 written by
/// older versions, interpreted in local time.
mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{s}'")))
    }
}

mod optional_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => super::timestamp::serialize(dt, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => super::timestamp::parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{s}'"))),
        }
    }
}
