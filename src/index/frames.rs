//! Frame pairing index.
//!
//! Pairs `wtf.timing#frameStart`/`wtf.timing#frameEnd` events by frame
//! number into time intervals. Frames missing either endpoint are pruned
//! at the end of the rebuild.

use crate::event::{EventType, EventTypeTable};
use crate::index::AncillaryIndex;
use crate::store::{EventIterator, EventStore};
use std::collections::HashMap;
use std::rc::Rc;

/// One rendered frame interval.
#[derive(Debug, Clone)]
pub struct Frame {
    ordinal: usize,
    number: u32,
    start_event_id: u32,
    end_event_id: u32,
    // Option so a frame starting at time 0 still counts as started.
    time: Option<f64>,
    end_time: Option<f64>,
}

impl Frame {
    fn new(number: u32) -> Self {
        Self {
            ordinal: 0,
            number,
            start_event_id: 0,
            end_event_id: 0,
            time: None,
            end_time: None,
        }
    }

    /// Position in the packed frame list.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Frame number from the trace, which may be sparse.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn start_event_id(&self) -> u32 {
        self.start_event_id
    }

    pub fn end_event_id(&self) -> u32 {
        self.end_event_id
    }

    /// Start time in milliseconds. Valid on frames that survived the
    /// rebuild prune.
    pub fn time(&self) -> f64 {
        self.time.unwrap_or(0.0)
    }

    /// End time in milliseconds.
    pub fn end_time(&self) -> f64 {
        self.end_time.unwrap_or(0.0)
    }

    pub fn duration(&self) -> f64 {
        self.end_time() - self.time()
    }
}

/// All frames in a zone, packed in time order.
#[derive(Default)]
pub struct FrameList {
    frames: Vec<Frame>,
    by_number: HashMap<u32, usize>,
    invalidation: u64,
}

impl FrameList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.frames.len()
    }

    /// Packed list of complete frames. Positions are ordinals, not frame
    /// numbers.
    pub fn all_frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Lookup by trace frame number.
    pub fn frame(&self, number: u32) -> Option<&Frame> {
        self.by_number.get(&number).map(|&n| &self.frames[n])
    }

    pub fn previous_frame(&self, frame: &Frame) -> Option<&Frame> {
        frame.ordinal.checked_sub(1).map(|n| &self.frames[n])
    }

    pub fn next_frame(&self, frame: &Frame) -> Option<&Frame> {
        self.frames.get(frame.ordinal + 1)
    }

    /// Bumped every rebuild so consumers can notice staleness.
    pub fn invalidation(&self) -> u64 {
        self.invalidation
    }

    /// Index of the last frame starting at or before the given time.
    fn index_near_time(&self, time: f64) -> usize {
        let upper = self.frames.partition_point(|frame| frame.time() <= time);
        upper.saturating_sub(1)
    }

    /// The frame whose interval contains the given time, if any.
    pub fn frame_at_time(&self, time: f64) -> Option<&Frame> {
        if self.frames.is_empty() {
            return None;
        }
        let frame = &self.frames[self.index_near_time(time)];
        if frame.time() <= time && frame.end_time() >= time {
            Some(frame)
        } else {
            None
        }
    }

    /// The frames surrounding a time that falls between frames, as
    /// `(previous, next)`. Undefined when the time is inside a frame.
    pub fn intra_frame_at_time(&self, time: f64) -> (Option<&Frame>, Option<&Frame>) {
        if self.frames.is_empty() {
            return (None, None);
        }
        let upper = self.frames.partition_point(|frame| frame.time() <= time);
        if upper == 0 {
            // Before all frames.
            return (None, self.frames.first());
        }
        let previous = &self.frames[upper - 1];
        (Some(previous), self.next_frame(previous))
    }

    /// Visit every frame intersecting the time range, in order.
    pub fn for_each_intersecting<F: FnMut(&Frame)>(
        &self,
        time_start: f64,
        time_end: f64,
        mut callback: F,
    ) {
        if self.frames.is_empty() {
            return;
        }
        for frame in &self.frames[self.index_near_time(time_start)..] {
            if frame.end_time() < time_start {
                continue;
            }
            if frame.time() > time_end {
                break;
            }
            callback(frame);
        }
    }
}

impl AncillaryIndex for FrameList {
    fn begin_rebuild(&mut self, type_table: &EventTypeTable) -> Vec<Option<Rc<EventType>>> {
        self.frames.clear();
        self.by_number.clear();
        vec![
            type_table.get_by_name("wtf.timing#frameStart"),
            type_table.get_by_name("wtf.timing#frameEnd"),
        ]
    }

    fn handle_event(&mut self, slot: usize, _event_type: &Rc<EventType>, it: &EventIterator<'_>) {
        let Some(number) = it.argument("number").and_then(|v| v.as_u64()) else {
            return;
        };
        let number = number as u32;
        let index = *self.by_number.entry(number).or_insert_with(|| {
            self.frames.push(Frame::new(number));
            self.frames.len() - 1
        });
        let frame = &mut self.frames[index];
        match slot {
            0 => {
                frame.start_event_id = it.id();
                frame.time = Some(it.time());
            }
            1 => {
                frame.end_event_id = it.id();
                frame.end_time = Some(it.time());
            }
            _ => {}
        }
    }

    fn end_rebuild(&mut self, _store: &EventStore) {
        // Partial frames are not worth rendering; drop them and renumber.
        self.frames
            .retain(|frame| frame.time.is_some() && frame.end_time.is_some());
        self.by_number.clear();
        for (n, frame) in self.frames.iter_mut().enumerate() {
            frame.ordinal = n;
            self.by_number.insert(frame.number, n);
        }
        self.invalidation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::builtin_types;
    use crate::store::Arguments;
    use serde_json::json;

    fn frame_args(number: u32) -> Arguments {
        [("number".to_string(), json!(number))].into_iter().collect()
    }

    fn build_frames(pairs: &[(u32, u32, u32)]) -> (EventStore, FrameList) {
        let table = Rc::new(EventTypeTable::new());
        table.define_all(builtin_types());
        let mut store = EventStore::new(table);
        let start = store
            .event_type_table()
            .get_by_name("wtf.timing#frameStart")
            .unwrap();
        let end = store
            .event_type_table()
            .get_by_name("wtf.timing#frameEnd")
            .unwrap();
        for &(number, start_time, end_time) in pairs {
            store.insert(&start, start_time, Some(frame_args(number)));
            store.insert(&end, end_time, Some(frame_args(number)));
        }
        let mut frames = FrameList::new();
        store.rebuild(&mut [&mut frames]);
        (store, frames)
    }

    #[test]
    fn test_pairs_frames_by_number() {
        let (_store, frames) = build_frames(&[(1, 0, 16_000), (2, 16_000, 33_000)]);
        assert_eq!(frames.count(), 2);
        let first = frames.frame(1).unwrap();
        assert_eq!(first.time(), 0.0);
        assert_eq!(first.end_time(), 16.0);
        assert_eq!(first.ordinal(), 0);
        let second = frames.frame(2).unwrap();
        assert_eq!(second.duration(), 17.0);
    }

    #[test]
    fn test_prunes_partial_frames() {
        let table = Rc::new(EventTypeTable::new());
        table.define_all(builtin_types());
        let mut store = EventStore::new(table);
        let start = store
            .event_type_table()
            .get_by_name("wtf.timing#frameStart")
            .unwrap();
        let end = store
            .event_type_table()
            .get_by_name("wtf.timing#frameEnd")
            .unwrap();
        store.insert(&start, 0, Some(frame_args(1)));
        store.insert(&end, 16_000, Some(frame_args(1)));
        // Frame 2 never ends.
        store.insert(&start, 16_000, Some(frame_args(2)));

        let mut frames = FrameList::new();
        store.rebuild(&mut [&mut frames]);
        assert_eq!(frames.count(), 1);
        assert!(frames.frame(2).is_none());
    }

    #[test]
    fn test_keeps_frame_starting_at_time_zero() {
        let (_store, frames) = build_frames(&[(0, 0, 10_000)]);
        assert_eq!(frames.count(), 1);
        assert_eq!(frames.frame(0).unwrap().time(), 0.0);
    }

    #[test]
    fn test_frame_at_time() {
        let (_store, frames) = build_frames(&[(1, 0, 16_000), (2, 20_000, 33_000)]);
        assert_eq!(frames.frame_at_time(8.0).unwrap().number(), 1);
        assert_eq!(frames.frame_at_time(16.0).unwrap().number(), 1);
        // Between frames.
        assert!(frames.frame_at_time(18.0).is_none());
        assert!(frames.frame_at_time(99.0).is_none());
    }

    #[test]
    fn test_intra_frame_at_time() {
        let (_store, frames) = build_frames(&[(1, 0, 16_000), (2, 20_000, 33_000)]);
        let (previous, next) = frames.intra_frame_at_time(18.0);
        assert_eq!(previous.unwrap().number(), 1);
        assert_eq!(next.unwrap().number(), 2);
        let (previous, next) = frames.intra_frame_at_time(50.0);
        assert_eq!(previous.unwrap().number(), 2);
        assert!(next.is_none());
    }

    #[test]
    fn test_for_each_intersecting() {
        let (_store, frames) =
            build_frames(&[(1, 0, 16_000), (2, 20_000, 33_000), (3, 40_000, 50_000)]);
        let mut seen = Vec::new();
        frames.for_each_intersecting(10.0, 45.0, |frame| seen.push(frame.number()));
        assert_eq!(seen, vec![1, 2, 3]);
        let mut seen = Vec::new();
        frames.for_each_intersecting(17.0, 19.0, |frame| seen.push(frame.number()));
        assert!(seen.is_empty());
    }
}
