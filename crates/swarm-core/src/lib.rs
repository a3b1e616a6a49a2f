//! agent-swarm core library
//!
//! Shared functionality for the agent-swarm engine:
//! - Agent vocabulary (types, modes, statuses, effort tiers)
//! - Effort × agent-type model table with configurable overrides
//! - NDJSON event normalization for each supported agent CLI
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod agent;
pub mod config;
pub mod error;
pub mod models;
pub mod ndjson;
pub mod tracing_init;

pub use agent::{AgentMode, AgentStatus, AgentType, Effort};
pub use config::SwarmConfig;
pub use error::{Error, Result};
pub use models::ModelTable;
