//! Zones: independent event streams within a database.
//!
//! A zone represents one logical stream, such as a thread or process. Each
//! owns its event store plus the derived views built from it (frames, marks,
//! time ranges and any shared name indices), all rebuilt together whenever
//! the store contents change.

use crate::event::EventTypeTable;
use crate::filter::{Filter, FilterResult};
use crate::index::{AncillaryIndex, EventIndex, FrameList, MarkList, TimeRangeList};
use crate::query::QueryResult;
use crate::store::EventStore;
use crate::utils::FilterParseError;
use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// One event stream and its derived views.
pub struct Zone {
    /// Human-readable zone name.
    name: String,
    /// Zone type, such as `script` or a custom value.
    zone_type: String,
    /// Zone location, such as the URI of the script.
    location: String,
    store: EventStore,
    frames: FrameList,
    marks: MarkList,
    time_ranges: TimeRangeList,
    /// Shared indices created for this zone. Callers that plan to keep an
    /// index around request it here so repeated lookups reuse one rebuild.
    indices: Vec<Rc<RefCell<EventIndex>>>,
}

impl Zone {
    pub fn new(
        type_table: Rc<EventTypeTable>,
        name: impl Into<String>,
        zone_type: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            zone_type: zone_type.into(),
            location: location.into(),
            store: EventStore::new(type_table),
            frames: FrameList::new(),
            marks: MarkList::new(),
            time_ranges: TimeRangeList::new(),
            indices: Vec::new(),
        }
    }

    /// Resets the zone information without clearing its contents.
    pub fn reset_info(
        &mut self,
        name: impl Into<String>,
        zone_type: impl Into<String>,
        location: impl Into<String>,
    ) {
        self.name = name.into();
        self.zone_type = zone_type.into();
        self.location = location.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn zone_type(&self) -> &str {
        &self.zone_type
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// An informative multi-line description of the zone.
    pub fn info_string(&self) -> String {
        let mut info = format!("{} ({})", self.name, self.zone_type);
        if !self.location.is_empty() {
            info.push('\n');
            info.push_str(&self.location);
        }
        info
    }

    /// The event store containing all event data for this zone.
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EventStore {
        &mut self.store
    }

    /// The frame list. May be empty if this zone has no frames.
    pub fn frame_list(&self) -> &FrameList {
        &self.frames
    }

    /// The mark list. May be empty if this zone has no marks.
    pub fn mark_list(&self) -> &MarkList {
        &self.marks
    }

    /// The time range list. May be empty if this zone has no time ranges.
    pub fn time_range_list(&self) -> &TimeRangeList {
        &self.time_ranges
    }

    /// Gets an event index over the given event types, creating it on first
    /// request. Callers must pass the names in a consistent order for the
    /// index to be shared. An index requested after events already exist is
    /// filled immediately.
    pub fn get_shared_index(&mut self, event_names: Vec<String>) -> Rc<RefCell<EventIndex>> {
        for index in &self.indices {
            if index.borrow().event_names() == event_names.as_slice() {
                return Rc::clone(index);
            }
        }

        let index = Rc::new(RefCell::new(EventIndex::new(event_names)));
        if self.store.count() > 0 {
            self.store.rebuild_index(&mut *index.borrow_mut());
        }
        self.indices.push(Rc::clone(&index));
        index
    }

    /// Rebuilds the store structure and every derived view in one scan.
    pub fn rebuild(&mut self) {
        let mut shared: Vec<RefMut<'_, EventIndex>> =
            self.indices.iter().map(|index| index.borrow_mut()).collect();
        let mut lists: Vec<&mut dyn AncillaryIndex> = vec![
            &mut self.frames,
            &mut self.marks,
            &mut self.time_ranges,
        ];
        for index in &mut shared {
            lists.push(&mut **index);
        }
        self.store.rebuild(&mut lists);
    }

    /// Queries the zone, returning the matching events plus metadata about
    /// the query execution.
    pub fn query(&self, expr: &str) -> Result<QueryResult<'_>, FilterParseError> {
        let start = Instant::now();

        let mut filter = Filter::new();
        if filter.set_from_string(expr) == FilterResult::Failed {
            if let Some(error) = filter.error() {
                return Err(error.clone());
            }
        }

        let result = filter.apply_to_event_list(&self.store);

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(QueryResult::new(
            expr.to_string(),
            filter.debug_string(),
            duration_ms,
            result,
        ))
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
