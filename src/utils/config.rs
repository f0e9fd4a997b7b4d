//! Constants for the trace database.

// Constants for time conversion
// Event times are stored as integer microseconds and surfaced as
// milliseconds; 1 ms = 1,000 us.
pub const TIME_SCALE: f64 = 1000.0;

/// Maximum scope nesting depth tracked during tree reconstruction.
/// Exceeding it truncates the rebuild pass; remaining records stay unscoped.
pub const MAX_SCOPE_DEPTH: usize = 1024;

/// Name assigned to generic scope enters that carry no name argument
pub const UNNAMED_SCOPE: &str = "unnamed.scope";

/// Name assigned to generic timestamps that carry no name argument
pub const UNNAMED_INSTANCE: &str = "unnamed.instance";
