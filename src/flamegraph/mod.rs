//! Flamegraph generation using the inferno library.
//!
//! This module folds a database's scope trees into collapsed stacks and
//! renders them as interactive SVG flamegraphs. Flamegraphs provide a
//! visual representation of where time is spent.

pub mod generator;
pub mod stacks;

// Re-export main types
pub use generator::{generate_flamegraph, FlamegraphConfig};
pub use stacks::{build_collapsed_stacks, CollapsedStack};
