//! On-disk agent storage.
//!
//! One directory per agent id under a base directory, holding the combined
//! output log and a JSON metadata file.

mod locator;
mod meta;

pub use locator::{AgentsDir, default_candidates};
pub use meta::{AgentMeta, META_FILE, STDOUT_FILE};
