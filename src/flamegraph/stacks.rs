//! Build collapsed stack format from a loaded database.
//!
//! Collapsed stacks are the input format for flamegraph generation.
//! Format: "zone;parent;child weight"
//!
//! Example: "main;frame;render 1500"
//! This means: zone main ran frame which ran render, which spent 1500
//! microseconds of its own time there.

use crate::database::Database;
use log::debug;
use std::collections::HashMap;

/// A single collapsed stack entry.
#[derive(Debug, Clone)]
pub struct CollapsedStack {
    /// Stack trace as semicolon-separated string.
    pub stack: String,

    /// Weight (own-time microseconds consumed by this stack).
    pub weight: u64,
}

impl CollapsedStack {
    pub fn new(stack: String, weight: u64) -> Self {
        Self { stack, weight }
    }
}

/// Folds every zone's scope tree into weighted collapsed stacks.
///
/// Each scope contributes its own time, so a parent's total in the
/// rendered graph accumulates naturally from its children's lines.
/// Bookkeeping records and events outside any scope carry no weight and
/// are skipped.
pub fn build_collapsed_stacks(db: &Database) -> Vec<CollapsedStack> {
    let mut stack_map: HashMap<String, u64> = HashMap::new();

    for zone in db.zones() {
        let zone_label = if zone.name().is_empty() {
            "default"
        } else {
            zone.name()
        };

        // Scope ancestry by depth, rebuilt as the scan walks the stream.
        let mut frames: Vec<String> = Vec::new();
        let mut it = zone.store().begin();
        while !it.done() {
            if it.is_scope() && !it.is_hidden() {
                frames.truncate(it.depth() as usize);
                frames.push(it.name());

                let own_micros = (it.own_duration() * 1000.0).round().max(0.0) as u64;
                if own_micros > 0 {
                    let stack = format!("{};{}", zone_label, frames.join(";"));
                    *stack_map.entry(stack).or_insert(0) += own_micros;
                }
            }
            it.next();
        }
    }

    // Convert map to vector and sort by weight (descending).
    let mut stacks: Vec<CollapsedStack> = stack_map
        .into_iter()
        .map(|(stack, weight)| CollapsedStack::new(stack, weight))
        .collect();
    stacks.sort_by(|a, b| b.weight.cmp(&a.weight));

    debug!("Built {} unique collapsed stacks", stacks.len());

    stacks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::unit::Unit;

    fn build_db() -> Database {
        let mut db = Database::new();
        db.begin_inserting_events(Unit::TimeMilliseconds).unwrap();
        let index = db.create_or_get_zone("main", "script", "");
        let zone = db.zone_mut(index).unwrap();
        let frame = zone
            .store()
            .event_type_table()
            .define_type(EventType::create_scope("frame()", 0).unwrap());
        let render = zone
            .store()
            .event_type_table()
            .define_type(EventType::create_scope("render()", 0).unwrap());
        let leave = zone
            .store()
            .event_type_table()
            .get_by_name("wtf.scope#leave")
            .unwrap();

        // frame [0,10ms] containing render [1ms,5ms], then a second
        // frame [20ms,26ms] with no children.
        let store = zone.store_mut();
        store.insert(&frame, 0, None);
        store.insert(&render, 1_000, None);
        store.insert(&leave, 5_000, None);
        store.insert(&leave, 10_000, None);
        store.insert(&frame, 20_000, None);
        store.insert(&leave, 26_000, None);
        db.end_inserting_events().unwrap();
        db
    }

    fn weight_of<'a>(stacks: &'a [CollapsedStack], stack: &str) -> Option<u64> {
        stacks.iter().find(|s| s.stack == stack).map(|s| s.weight)
    }

    #[test]
    fn test_own_time_weighting() {
        let db = build_db();
        let stacks = build_collapsed_stacks(&db);
        assert_eq!(stacks.len(), 2);

        // 6ms own from the first frame plus 6ms from the second.
        assert_eq!(weight_of(&stacks, "main;frame"), Some(12_000));
        assert_eq!(weight_of(&stacks, "main;frame;render"), Some(4_000));
    }

    #[test]
    fn test_sorted_by_weight_descending() {
        let db = build_db();
        let stacks = build_collapsed_stacks(&db);
        assert!(stacks.windows(2).all(|w| w[0].weight >= w[1].weight));
    }

    #[test]
    fn test_empty_database_yields_no_stacks() {
        let db = Database::new();
        assert!(build_collapsed_stacks(&db).is_empty());
    }
}
