//! Navigation mark index.
//!
//! Marks are instantaneous `wtf.trace#mark` events; each one's extent
//! runs until the next mark begins, with the last mark reaching the end
//! of the zone.

use crate::event::{EventType, EventTypeTable};
use crate::index::AncillaryIndex;
use crate::store::{EventIterator, EventStore};
use serde_json::Value;
use std::rc::Rc;

/// One named mark on the timeline.
#[derive(Debug, Clone)]
pub struct Mark {
    event_id: u32,
    name: String,
    value: Option<Value>,
    time: f64,
    end_time: f64,
}

impl Mark {
    pub fn event_id(&self) -> u32 {
        self.event_id
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

    /// Extent end in milliseconds, inferred from the following mark.
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.time
    }
}

/// All marks in a zone, in time order.
#[derive(Default)]
pub struct MarkList {
    marks: Vec<Mark>,
    invalidation: u64,
}

impl MarkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.marks.len()
    }

    pub fn all_marks(&self) -> &[Mark] {
        &self.marks
    }

    /// Bumped every rebuild so consumers can notice staleness.
    pub fn invalidation(&self) -> u64 {
        self.invalidation
    }

    fn index_near_time(&self, time: f64) -> usize {
        let upper = self.marks.partition_point(|mark| mark.time <= time);
        upper.saturating_sub(1)
    }

    /// The mark whose extent contains the given time, if any.
    pub fn mark_at_time(&self, time: f64) -> Option<&Mark> {
        if self.marks.is_empty() {
            return None;
        }
        let mark = &self.marks[self.index_near_time(time)];
        if mark.time <= time && mark.end_time >= time {
            Some(mark)
        } else {
            None
        }
    }

    /// Visit every mark whose extent intersects the time range, in order.
    pub fn for_each_intersecting<F: FnMut(&Mark)>(
        &self,
        time_start: f64,
        time_end: f64,
        mut callback: F,
    ) {
        if self.marks.is_empty() {
            return;
        }
        for mark in &self.marks[self.index_near_time(time_start)..] {
            if mark.end_time < time_start {
                continue;
            }
            if mark.time > time_end {
                break;
            }
            callback(mark);
        }
    }
}

impl AncillaryIndex for MarkList {
    fn begin_rebuild(&mut self, type_table: &EventTypeTable) -> Vec<Option<Rc<EventType>>> {
        self.marks.clear();
        vec![type_table.get_by_name("wtf.trace#mark")]
    }

    fn handle_event(&mut self, _slot: usize, _event_type: &Rc<EventType>, it: &EventIterator<'_>) {
        // Extents are fixed up at the end once all marks are known.
        let name = match it.argument("name") {
            Some(Value::String(name)) => name,
            _ => String::new(),
        };
        self.marks.push(Mark {
            event_id: it.id(),
            name,
            value: it.argument("value"),
            time: it.time(),
            end_time: f64::MAX,
        });
    }

    fn end_rebuild(&mut self, store: &EventStore) {
        // Each mark runs until the next one begins.
        for n in 1..self.marks.len() {
            let time = self.marks[n].time;
            self.marks[n - 1].end_time = time;
        }
        if let Some(last) = self.marks.last_mut() {
            last.end_time = store.last_event_time();
        }
        self.invalidation += 1;
    }
}
