//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs.

use thiserror::Error;

/// Errors that can occur while parsing an event-type signature
#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("Malformed signature: {0}")]
    Malformed(String),

    #[error("Unknown argument type: {0}")]
    UnknownArgType(String),
}

/// Structured filter parse error, retained by the filter after a failed
/// `set_from_string` so callers can present it without re-parsing.
#[derive(Error, Debug, Clone)]
#[error("Filter parse error at line {line}, column {column}: {message}")]
pub struct FilterParseError {
    /// Human-readable description of what went wrong
    pub message: String,

    /// Byte offset into the source string
    pub offset: usize,

    /// 1-based line number
    pub line: usize,

    /// 1-based column number
    pub column: usize,

    /// Token kinds that would have been accepted at this point
    pub expected: Vec<String>,
}

/// Errors that can occur during database-level operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Mixing measurement units is not supported.")]
    UnitMismatch,

    #[error("An insertion transaction is already open")]
    AlreadyInserting,

    #[error("No insertion transaction is open")]
    NotInserting,
}

/// Errors that can occur while loading a trace document
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid trace document: {0}")]
    InvalidDocument(String),

    #[error("Bad event signature: {0}")]
    BadSignature(#[from] SignatureError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur during flamegraph generation
#[derive(Error, Debug)]
pub enum FlamegraphError {
    #[error("Empty stack data")]
    EmptyStacks,

    #[error("Failed to render flamegraph: {0}")]
    RenderFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
