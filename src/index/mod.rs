//! Ancillary indices derived from the event stream.
//!
//! Indices register the event types they care about and get fed matching
//! events during one shared scan in [`EventStore::rebuild`]. Each keeps a
//! generation counter consumers can poll to notice staleness instead of
//! holding callbacks into the store.
//!
//! [`EventStore::rebuild`]: crate::store::EventStore::rebuild

use crate::event::{EventType, EventTypeTable};
use crate::store::{EventIterator, EventStore};
use std::rc::Rc;

pub mod frames;
pub mod marks;
pub mod named;
pub mod ranges;

pub use frames::{Frame, FrameList};
pub use marks::{Mark, MarkList};
pub use named::EventIndex;
pub use ranges::{TimeRange, TimeRangeList};

/// A derived view rebuilt by scanning the event stream.
///
/// The store calls `begin_rebuild` to collect the types of interest, then
/// `handle_event` once per matching event with the slot the type was
/// returned in, then `end_rebuild`.
pub trait AncillaryIndex {
    /// Reset rebuild state and declare interesting event types by slot.
    /// Unresolvable names yield `None` and receive no events.
    fn begin_rebuild(&mut self, type_table: &EventTypeTable) -> Vec<Option<Rc<EventType>>>;

    /// One matching event, in stream order.
    fn handle_event(&mut self, slot: usize, event_type: &Rc<EventType>, it: &EventIterator<'_>);

    /// Finalize derived data after the scan.
    fn end_rebuild(&mut self, store: &EventStore);
}
