//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod dump;
pub mod flamegraph;
pub mod info;
pub mod query;

// Re-export main command functions
pub use dump::{execute_dump, DumpArgs};
pub use flamegraph::{execute_flamegraph, FlamegraphArgs};
pub use info::{execute_info, InfoArgs};
pub use query::{execute_query, QueryArgs};
