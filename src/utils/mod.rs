//! Utility modules for configuration, error handling, and formatting.

pub mod error;
pub mod config;
pub mod format;

// Re-export commonly used error types for convenience
pub use error::{DatabaseError, FilterParseError, FlamegraphError, IngestError, OutputError,
                SignatureError};
