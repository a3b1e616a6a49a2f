//! Agent orchestration: per-agent state and the registry that owns it.
//!
//! - [`AgentProcess`]: one agent's metadata, log tail and status reconciliation.
//! - [`AgentManager`]: spawn, query, stop and retention over all agents.

pub mod manager;
pub mod process;

pub use manager::{AgentManager, SpawnRequest, StopReport};
pub use process::{AgentProcess, AgentSummary};
