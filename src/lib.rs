//! Trace DB Studio
//!
//! In-memory trace event database: zones of dense event records with
//! tree reconstruction, derived indices (frames, marks, time ranges),
//! a filter query language, and flamegraph export.
//!
//! This crate provides the core implementation for the
//! `tracedb` CLI tool.
//!
//! ## Getting Started
//!
//! Most users should install and use the CLI:
//!
//! ```bash
//! cargo install tracedb-studio
//! tracedb --help
//! ```
//!
//! Library users load a trace document and query it:
//!
//! ```ignore
//! let db = tracedb_studio::ingest::load_file(Path::new("trace.json"))?;
//! let mut result = db.zones()[0].query("render(frames > 2)")?;
//! println!("{}", result.dump(QueryDumpFormat::Csv));
//! ```

pub mod commands;
pub mod database;
pub mod event;
pub mod filter;
pub mod flamegraph;
pub mod index;
pub mod ingest;
pub mod output;
pub mod query;
pub mod store;
pub mod unit;
pub mod utils;
pub mod zone;
