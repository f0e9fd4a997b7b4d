//! Time range index.
//!
//! Pairs `wtf.timeRange#begin`/`wtf.timeRange#end` events by range id.
//! Ranges may overlap arbitrarily; each gets assigned a display level so
//! overlapping ranges stack instead of drawing on top of each other.

use crate::event::{EventType, EventTypeTable};
use crate::index::AncillaryIndex;
use crate::store::{EventIterator, EventStore};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// One span between a begin and end pair.
#[derive(Debug, Clone, Default)]
pub struct TimeRange {
    begin_event_id: Option<u32>,
    end_event_id: Option<u32>,
    name: String,
    value: Option<Value>,
    time: f64,
    end_time: f64,
    level: usize,
    overlap: u32,
}

impl TimeRange {
    pub fn begin_event_id(&self) -> Option<u32> {
        self.begin_event_id
    }

    pub fn end_event_id(&self) -> Option<u32> {
        self.end_event_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Start time in milliseconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// End time in milliseconds.
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.time
    }

    /// Display row for stacking overlapping ranges.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Ranges still open when this one began. Bookkeeping for the
    /// intersection scan.
    pub fn overlap(&self) -> u32 {
        self.overlap
    }
}

/// All time ranges in a zone, in begin order.
#[derive(Default)]
pub struct TimeRangeList {
    ranges: Vec<TimeRange>,
    by_id: HashMap<u32, usize>,
    maximum_level: usize,
    invalidation: u64,

    // Rebuild state: open range per level, and how many are open.
    levels: Vec<Option<usize>>,
    open_overlap: u32,
}

impl TimeRangeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.ranges.len()
    }

    pub fn all_time_ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    /// Lookup by the id the trace assigned the range.
    pub fn time_range(&self, id: u32) -> Option<&TimeRange> {
        self.by_id.get(&id).map(|&n| &self.ranges[n])
    }

    /// Number of display rows needed to stack all overlapping ranges.
    pub fn maximum_level(&self) -> usize {
        self.maximum_level
    }

    /// Bumped every rebuild so consumers can notice staleness.
    pub fn invalidation(&self) -> u64 {
        self.invalidation
    }

    /// All ranges containing the given time.
    pub fn time_ranges_at_time(&self, time: f64) -> Vec<&TimeRange> {
        let mut matches = Vec::new();
        self.for_each_intersecting(time, time, |range| matches.push(range));
        matches
    }

    /// Visit every range intersecting the time range, in begin order.
    pub fn for_each_intersecting<'a, F: FnMut(&'a TimeRange)>(
        &'a self,
        time_start: f64,
        time_end: f64,
        mut callback: F,
    ) {
        if self.ranges.is_empty() {
            return;
        }

        let upper = self.ranges.partition_point(|range| range.time <= time_start);
        let mut index = upper.saturating_sub(1);

        // Overlapping ranges can start long before the window; back up to
        // the first range that began with nothing else open.
        while index > 0 && self.ranges[index].overlap != 0 {
            index -= 1;
        }

        for range in &self.ranges[index..] {
            if range.time > time_end {
                break;
            }
            if range.end_time >= time_start {
                callback(range);
            }
        }
    }
}

impl AncillaryIndex for TimeRangeList {
    fn begin_rebuild(&mut self, type_table: &EventTypeTable) -> Vec<Option<Rc<EventType>>> {
        self.ranges.clear();
        self.by_id.clear();
        self.levels.clear();
        self.open_overlap = 0;
        self.maximum_level = 0;
        vec![
            type_table.get_by_name("wtf.timeRange#begin"),
            type_table.get_by_name("wtf.timeRange#end"),
        ]
    }

    fn handle_event(&mut self, slot: usize, _event_type: &Rc<EventType>, it: &EventIterator<'_>) {
        let Some(id) = it.argument("id").and_then(|v| v.as_u64()) else {
            return;
        };
        let id = id as u32;
        let index = *self.by_id.entry(id).or_insert_with(|| {
            self.ranges.push(TimeRange::default());
            self.ranges.len() - 1
        });

        match slot {
            0 => {
                // First free display level.
                let level = self
                    .levels
                    .iter()
                    .position(|slot| slot.is_none())
                    .unwrap_or_else(|| {
                        self.levels.push(None);
                        self.levels.len() - 1
                    });
                self.levels[level] = Some(index);

                let range = &mut self.ranges[index];
                range.begin_event_id = Some(it.id());
                range.name = match it.argument("name") {
                    Some(Value::String(name)) => name,
                    _ => String::new(),
                };
                range.value = it.argument("value");
                range.time = it.time();
                range.level = level;
                range.overlap = self.open_overlap;
                self.open_overlap += 1;
            }
            1 => {
                let level = self.ranges[index].level;
                if self.levels.get(level).copied().flatten() == Some(index) {
                    self.levels[level] = None;
                    self.open_overlap = self.open_overlap.saturating_sub(1);
                }
                let range = &mut self.ranges[index];
                range.end_event_id = Some(it.id());
                range.end_time = it.time();
            }
            _ => {}
        }
    }

    fn end_rebuild(&mut self, _store: &EventStore) {
        self.maximum_level = self.levels.len();
        self.invalidation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::builtin_types;
    use crate::store::Arguments;
    use serde_json::json;

    fn build_ranges(events: &[(u32, &str, u32, bool)]) -> TimeRangeList {
        let table = Rc::new(EventTypeTable::new());
        table.define_all(builtin_types());
        let mut store = EventStore::new(table);
        let begin = store
            .event_type_table()
            .get_by_name("wtf.timeRange#begin")
            .unwrap();
        let end = store
            .event_type_table()
            .get_by_name("wtf.timeRange#end")
            .unwrap();
        for &(id, name, time, is_begin) in events {
            let mut args: Arguments = [("id".to_string(), json!(id))].into_iter().collect();
            if is_begin {
                args.insert("name".to_string(), json!(name));
                store.insert(&begin, time, Some(args));
            } else {
                store.insert(&end, time, Some(args));
            }
        }
        let mut list = TimeRangeList::new();
        store.rebuild(&mut [&mut list]);
        list
    }

    #[test]
    fn test_pairs_ranges_by_id() {
        let list = build_ranges(&[
            (1, "load", 0, true),
            (1, "", 10_000, false),
            (2, "run", 20_000, true),
            (2, "", 30_000, false),
        ]);
        assert_eq!(list.count(), 2);
        let load = list.time_range(1).unwrap();
        assert_eq!(load.name(), "load");
        assert_eq!(load.time(), 0.0);
        assert_eq!(load.end_time(), 10.0);
        assert_eq!(load.level(), 0);
        // Non-overlapping ranges reuse level 0.
        assert_eq!(list.time_range(2).unwrap().level(), 0);
        assert_eq!(list.maximum_level(), 1);
    }

    #[test]
    fn test_overlapping_ranges_stack() {
        let list = build_ranges(&[
            (1, "outer", 0, true),
            (2, "inner", 5_000, true),
            (2, "", 15_000, false),
            (1, "", 20_000, false),
        ]);
        assert_eq!(list.time_range(1).unwrap().level(), 0);
        assert_eq!(list.time_range(2).unwrap().level(), 1);
        assert_eq!(list.time_range(2).unwrap().overlap(), 1);
        assert_eq!(list.maximum_level(), 2);
    }

    #[test]
    fn test_time_ranges_at_time() {
        let list = build_ranges(&[
            (1, "outer", 0, true),
            (2, "inner", 5_000, true),
            (2, "", 15_000, false),
            (1, "", 20_000, false),
        ]);
        let at_ten = list.time_ranges_at_time(10.0);
        assert_eq!(at_ten.len(), 2);
        let at_eighteen = list.time_ranges_at_time(18.0);
        assert_eq!(at_eighteen.len(), 1);
        assert_eq!(at_eighteen[0].name(), "outer");
        assert!(list.time_ranges_at_time(25.0).is_empty());
    }

    #[test]
    fn test_unpaired_end_is_tolerated() {
        let list = build_ranges(&[(9, "", 1_000, false)]);
        assert_eq!(list.count(), 1);
        let range = list.time_range(9).unwrap();
        assert!(range.begin_event_id().is_none());
        assert_eq!(range.end_time(), 1.0);
    }
}
