//! agent-swarm engine library
//!
//! Orchestration of detached third-party coding-agent CLIs:
//! - Argv construction, executable lookup and process-group signalling
//! - Per-agent directories with persisted metadata and a combined output log
//! - Incremental log tailing into normalized events
//! - Pull-based status reconciliation against OS process liveness
//! - A registry enforcing concurrency and retention limits

pub mod error;
pub mod orchestration;
pub mod storage;
pub mod subprocess;

pub use error::AgentError;
pub use orchestration::{AgentManager, AgentProcess, AgentSummary, SpawnRequest, StopReport};
