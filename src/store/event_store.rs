//! The dense columnar event store.

use crate::event::{EventType, EventTypeTable};
use crate::index::AncillaryIndex;
use crate::store::arguments::{ArgumentTable, Arguments};
use crate::store::iterator::EventIterator;
use crate::store::record::EventRecord;
use crate::store::rescope;
use crate::utils::config::TIME_SCALE;
use crate::utils::format;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Counters gathered during the rescoping pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventStatistics {
    /// Total records in the store, hidden ones included.
    pub total_count: u32,

    /// Generic `wtf.scope#enter` records promoted to named types.
    pub generic_enter_scope: u32,

    /// Generic `wtf.trace#timeStamp` records promoted to named types.
    pub generic_time_stamp: u32,

    /// Append-data records merged into their scopes.
    pub append_scope_data: u32,
}

/// Dense columnar storage for one zone's events.
///
/// Records are appended raw during an insertion transaction and carry no
/// tree structure until [`rebuild`](Self::rebuild) runs. Interior
/// mutability on the record vector and the argument table lets iterators
/// annotate events (tags, argument overrides) through shared references,
/// matching the single-threaded access model.
pub struct EventStore {
    type_table: Rc<EventTypeTable>,
    records: RefCell<Vec<EventRecord>>,
    arguments: RefCell<ArgumentTable>,

    resort_needed: bool,
    last_insert_time: u32,

    first_event_time: f64,
    last_event_time: f64,
    hidden_count: u32,
    maximum_scope_depth: usize,
    statistics: EventStatistics,
    invalidation: u64,
}

impl EventStore {
    pub fn new(type_table: Rc<EventTypeTable>) -> Self {
        Self {
            type_table,
            records: RefCell::new(Vec::with_capacity(1024)),
            arguments: RefCell::new(ArgumentTable::new()),
            resort_needed: false,
            last_insert_time: 0,
            first_event_time: 0.0,
            last_event_time: 0.0,
            hidden_count: 0,
            maximum_scope_depth: 0,
            statistics: EventStatistics::default(),
            invalidation: 0,
        }
    }

    /// The shared type registry this store resolves ids against.
    pub fn event_type_table(&self) -> &Rc<EventTypeTable> {
        &self.type_table
    }

    /// Total number of records, hidden ones included.
    pub fn count(&self) -> usize {
        self.records.borrow().len()
    }

    /// Number of records excluding scope leaves and other bookkeeping
    /// events hidden from normal views.
    pub fn total_event_count(&self) -> usize {
        self.count() - self.hidden_count as usize
    }

    /// Time of the first record, in milliseconds. 0 before any rebuild.
    pub fn first_event_time(&self) -> f64 {
        self.first_event_time
    }

    /// End of the last record (its end time when it is a scope), in
    /// milliseconds.
    pub fn last_event_time(&self) -> f64 {
        self.last_event_time
    }

    /// Deepest scope nesting seen by the last rebuild.
    pub fn maximum_scope_depth(&self) -> usize {
        self.maximum_scope_depth
    }

    /// Counters from the last rebuild.
    pub fn statistics(&self) -> EventStatistics {
        self.statistics
    }

    /// Bumped after every rebuild so views can notice staleness.
    pub fn invalidation(&self) -> u64 {
        self.invalidation
    }

    /// Append a raw record.
    ///
    /// The record stays unscoped (no parent/sibling/duration data) until
    /// the next [`rebuild`](Self::rebuild). Out-of-order times are
    /// tolerated and trigger a time sort during that rebuild.
    pub fn insert(&mut self, event_type: &EventType, time_micros: u32, args: Option<Arguments>) {
        let records = self.records.get_mut();
        let id = records.len() as u32;
        let args_id = match args {
            Some(args) => self.arguments.get_mut().insert(args),
            None => 0,
        };
        records.push(EventRecord::new(
            id,
            event_type.id,
            event_type.flags,
            time_micros,
            args_id,
        ));

        if time_micros < self.last_insert_time {
            self.resort_needed = true;
        }
        self.last_insert_time = time_micros;
    }

    /// Rebuild all derived state after an insertion batch: sort if needed,
    /// reconstruct the scope tree, then rebuild the given ancillary
    /// indices in one shared scan.
    pub fn rebuild(&mut self, indices: &mut [&mut dyn AncillaryIndex]) {
        if self.resort_needed {
            self.resort_events();
            self.resort_needed = false;
        }

        self.statistics = EventStatistics {
            total_count: self.count() as u32,
            ..EventStatistics::default()
        };
        self.first_event_time = 0.0;
        self.last_event_time = 0.0;
        if self.count() > 0 {
            let mut it = self.begin();
            self.first_event_time = it.time();
            it.seek(self.count() - 1);
            self.last_event_time = if it.is_scope() {
                it.end_time()
            } else {
                it.time()
            };
        }

        // Builds parenting relationships and computes times. Must run
        // after renumbering so record ids match positions.
        let type_table = Rc::clone(&self.type_table);
        let (hidden_count, maximum_scope_depth) = rescope::rescope_events(
            self.records.get_mut(),
            self.arguments.get_mut(),
            &type_table,
            &mut self.statistics,
        );
        self.hidden_count = hidden_count;
        self.maximum_scope_depth = maximum_scope_depth;

        self.rebuild_ancillary_lists(indices);
        self.invalidation += 1;
    }

    /// Rebuild one index against the current contents, outside of a full
    /// rebuild. Used when an index is registered after events already
    /// exist.
    pub fn rebuild_index(&self, index: &mut dyn AncillaryIndex) {
        self.rebuild_ancillary_lists(&mut [index]);
    }

    /// Stable-sort records into (time, id) order and renumber ids densely
    /// to match the new positions.
    fn resort_events(&mut self) {
        let records = self.records.get_mut();
        records.sort_by(|a, b| a.time.cmp(&b.time).then(a.id.cmp(&b.id)));
        for (n, record) in records.iter_mut().enumerate() {
            record.id = n as u32;
        }
    }

    /// One linear scan over all records dispatching to every index that
    /// registered an interest in the record's type.
    fn rebuild_ancillary_lists(&self, lists: &mut [&mut dyn AncillaryIndex]) {
        if lists.is_empty() {
            return;
        }

        // typeId -> [(list index, slot the list registered, type)]
        let mut type_map: HashMap<u16, Vec<(usize, usize, Rc<EventType>)>> = HashMap::new();
        for (list_index, list) in lists.iter_mut().enumerate() {
            let desired = list.begin_rebuild(&self.type_table);
            for (slot, desired_type) in desired.into_iter().enumerate() {
                if let Some(desired_type) = desired_type {
                    type_map
                        .entry(desired_type.id)
                        .or_default()
                        .push((list_index, slot, desired_type));
                }
            }
        }

        let count = self.count();
        let mut it = self.begin();
        for n in 0..count {
            let type_id = self.record(n).type_id;
            if let Some(handlers) = type_map.get(&type_id) {
                for (list_index, slot, event_type) in handlers {
                    // Fresh position per handler in case one moved it.
                    it.seek(n);
                    lists[*list_index].handle_event(*slot, event_type, &it);
                }
            }
        }

        for list in lists.iter_mut() {
            list.end_rebuild(self);
        }
    }

    /// Copy of the record at a position.
    pub(crate) fn record(&self, index: usize) -> EventRecord {
        self.records.borrow()[index]
    }

    pub(crate) fn set_record_tag(&self, index: usize, tag: u32) {
        self.records.borrow_mut()[index].tag = tag;
    }

    pub(crate) fn set_record_args_id(&self, index: usize, args_id: u32) {
        self.records.borrow_mut()[index].args_id = args_id;
    }

    /// Iterate the whole store.
    pub fn begin(&self) -> EventIterator<'_> {
        EventIterator::new(self, 0, self.count(), 0)
    }

    /// Iterate an inclusive position range.
    pub fn begin_event_range(&self, start_index: usize, end_index: usize) -> EventIterator<'_> {
        EventIterator::new(self, start_index, end_index + 1, start_index)
    }

    /// Iterate records overlapping a millisecond time window.
    ///
    /// With `start_at_root` the start is widened to the enclosing root
    /// scope so an interval query sees the scopes spanning its left edge.
    pub fn begin_time_range(
        &self,
        start_time: f64,
        end_time: f64,
        start_at_root: bool,
    ) -> EventIterator<'_> {
        if self.count() == 0 {
            return EventIterator::new(self, 0, 0, 0);
        }
        let start_index = if start_at_root {
            self.index_of_root_scope_including_time(start_time)
        } else {
            self.index_of_event_near_time(start_time)
        };
        let mut end_index = self.index_of_event_near_time(end_time);
        if end_index < start_index {
            end_index = start_index;
        }
        self.begin_event_range(start_index, end_index)
    }

    /// Iterator positioned on one record.
    pub fn get_event(&self, id: usize) -> EventIterator<'_> {
        EventIterator::new(self, id, id + 1, id)
    }

    /// Position of the record at or before the given millisecond time.
    ///
    /// Returns 0 for times before the first record and `count - 1` for
    /// times at or past the last; monotonic in the query time.
    pub fn index_of_event_near_time(&self, time: f64) -> usize {
        let records = self.records.borrow();
        if records.is_empty() {
            return 0;
        }
        let micros = (time * TIME_SCALE) as u32;
        let upper = records.partition_point(|r| r.time <= micros);
        upper.saturating_sub(1)
    }

    /// Iterator on the record at or before the given time.
    pub fn get_event_near_time(&self, time: f64) -> EventIterator<'_> {
        self.get_event(self.index_of_event_near_time(time))
    }

    /// Position of the first root scope whose interval covers the given
    /// time, falling back to near-time behavior when none does.
    pub fn index_of_root_scope_including_time(&self, time: f64) -> usize {
        let near = self.index_of_event_near_time(time);
        if near == 0 {
            return 0;
        }
        let micros = (time * TIME_SCALE) as u32;
        let records = self.records.borrow();

        let mut i = near as i64;
        while i >= 0 {
            // Walk up to the root of this record's parent chain.
            let mut index = i as usize;
            let mut depth = records[index].depth;
            while depth > 0 {
                let parent = records[index].parent;
                if parent < 0 {
                    break;
                }
                index = parent as usize;
                depth -= 1;
            }

            let root = records[index];
            if root.end_time != 0 {
                if root.end_time < micros {
                    // Root scope ends before the requested time.
                    return near;
                }
                return index;
            }

            i -= 1;
        }

        near
    }

    /// Id of a registered type by name, if any record could carry it.
    pub fn get_event_type_id(&self, name: &str) -> Option<u16> {
        self.type_table.get_by_name(name).map(|ty| ty.id)
    }

    /// Payload lookup. Id 0 and consumed slots yield `None`.
    pub fn get_argument_data(&self, args_id: u32) -> Option<Rc<Arguments>> {
        self.arguments.borrow().get(args_id)
    }

    /// Override a payload, allocating an id when 0 is passed. The first
    /// override stashes the original for [`reset_argument_data`].
    ///
    /// [`reset_argument_data`]: Self::reset_argument_data
    pub fn set_argument_data(&self, args_id: u32, values: Arguments) -> u32 {
        self.arguments.borrow_mut().set(args_id, values)
    }

    /// Restore an overridden payload to its original value.
    pub fn reset_argument_data(&self, args_id: u32) {
        self.arguments.borrow_mut().reset(args_id);
    }

    /// Indented text rendering of the event tree, for debugging.
    pub fn dump(&self) -> String {
        let mut lines = Vec::new();
        let mut it = self.begin();
        while !it.done() {
            lines.push(format!(
                "{}{} {}",
                "  ".repeat(it.depth() as usize),
                format::format_time(it.time()),
                it.name()
            ));
            it.next();
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::builtin_types;
    use crate::event::EventType;
    use serde_json::json;

    fn test_store() -> EventStore {
        let table = Rc::new(EventTypeTable::new());
        table.define_all(builtin_types());
        EventStore::new(table)
    }

    fn instance_type(store: &EventStore, signature: &str) -> Rc<EventType> {
        store
            .event_type_table()
            .define_type(EventType::create_instance(signature, 0).unwrap())
    }

    #[test]
    fn test_insert_keeps_raw_order() {
        let mut store = test_store();
        let ty = instance_type(&store, "a()");
        store.insert(&ty, 500, None);
        store.insert(&ty, 100, None);
        assert_eq!(store.count(), 2);
        assert_eq!(store.record(0).time, 500);
        assert_eq!(store.record(1).time, 100);
    }

    #[test]
    fn test_rebuild_resorts_and_renumbers() {
        let mut store = test_store();
        let ty = instance_type(&store, "a()");
        store.insert(&ty, 500, None);
        store.insert(&ty, 100, None);
        store.insert(&ty, 300, None);
        store.rebuild(&mut []);

        let times: Vec<u32> = (0..store.count()).map(|n| store.record(n).time).collect();
        assert_eq!(times, vec![100, 300, 500]);
        let ids: Vec<u32> = (0..store.count()).map(|n| store.record(n).id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_resort_is_stable_on_time_ties() {
        let mut store = test_store();
        let a = instance_type(&store, "a(uint32 n)");
        for n in 0..3u32 {
            store.insert(&a, 200, Some([("n".to_string(), json!(n))].into_iter().collect()));
        }
        store.insert(&a, 100, None);
        store.rebuild(&mut []);

        // The three tied records keep their insertion order after the
        // earlier event is sorted in front of them.
        let it = store.get_event(1);
        assert_eq!(it.argument("n"), Some(json!(0)));
        let it = store.get_event(3);
        assert_eq!(it.argument("n"), Some(json!(2)));
    }

    #[test]
    fn test_first_last_event_times() {
        let mut store = test_store();
        let ty = instance_type(&store, "a()");
        store.insert(&ty, 5_000, None);
        store.insert(&ty, 12_000, None);
        store.rebuild(&mut []);
        assert_eq!(store.first_event_time(), 5.0);
        assert_eq!(store.last_event_time(), 12.0);
    }

    #[test]
    fn test_index_of_event_near_time_bounds() {
        let mut store = test_store();
        let ty = instance_type(&store, "a()");
        for time in [10_000u32, 20_000, 30_000] {
            store.insert(&ty, time, None);
        }
        store.rebuild(&mut []);

        assert_eq!(store.index_of_event_near_time(0.0), 0);
        assert_eq!(store.index_of_event_near_time(10.0), 0);
        assert_eq!(store.index_of_event_near_time(15.0), 0);
        assert_eq!(store.index_of_event_near_time(20.0), 1);
        assert_eq!(store.index_of_event_near_time(25.0), 1);
        assert_eq!(store.index_of_event_near_time(30.0), 2);
        assert_eq!(store.index_of_event_near_time(99.0), 2);
    }

    #[test]
    fn test_index_of_event_near_time_is_monotonic() {
        let mut store = test_store();
        let ty = instance_type(&store, "a()");
        for time in [10_000u32, 20_000, 20_000, 30_000, 45_000] {
            store.insert(&ty, time, None);
        }
        store.rebuild(&mut []);

        let mut last = 0;
        for tenth_ms in 0..500 {
            let index = store.index_of_event_near_time(tenth_ms as f64 / 10.0);
            assert!(index >= last);
            last = index;
        }
    }

    #[test]
    fn test_empty_store_queries() {
        let store = test_store();
        assert_eq!(store.count(), 0);
        assert_eq!(store.index_of_event_near_time(10.0), 0);
        assert!(store.begin().done());
        assert!(store.begin_time_range(0.0, 100.0, false).done());
    }
}
