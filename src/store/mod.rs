//! The columnar event store and its cursor.
//!
//! Records live in one dense vector; parent/sibling structure is expressed
//! as integer ids into that vector, reconstructed by the rescoping pass
//! after each insertion batch. Argument payloads live in a side table so
//! the records themselves stay fixed-size.

pub mod arguments;
pub mod event_store;
pub mod iterator;
pub mod record;
mod rescope;

pub use arguments::{ArgumentTable, Arguments};
pub use event_store::{EventStatistics, EventStore};
pub use iterator::EventIterator;
pub use record::EventRecord;
