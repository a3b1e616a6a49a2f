//! Subprocess plumbing for agent CLIs.
//!
//! - [`command`]: pure argv construction per agent type and mode
//! - [`probe`]: executable lookup on the search path
//! - [`signals`]: liveness probes, non-blocking reaping and group signalling

pub mod command;
pub mod probe;
pub mod signals;

pub use command::{CommandSpec, build_command};
pub use probe::{CliStatus, check_all_clis, check_cli_available};
