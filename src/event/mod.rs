//! Event type definitions and the type registry.
//!
//! Every record in a store refers to an [`EventType`] by id. Types are
//! declared either from signature strings (`my.class#method(uint32 count)`)
//! during ingestion or on the fly when generic enter/timestamp records are
//! first seen during a rebuild.

pub mod table;
pub mod types;

pub use table::EventTypeTable;
pub use types::{event_flag, ArgSpec, ArgType, EventClass, EventType};
