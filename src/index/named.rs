//! Custom event index.
//!
//! Collects the ids of every event matching a caller-supplied set of type
//! names, in stream order, for cheap repeated iteration.

use crate::event::{EventType, EventTypeTable};
use crate::index::AncillaryIndex;
use crate::store::{EventIterator, EventStore};
use std::mem;
use std::rc::Rc;

/// Index over events of specific named types.
pub struct EventIndex {
    event_names: Vec<String>,
    ids: Rc<Vec<u32>>,
    building: Vec<u32>,
    invalidation: u64,
}

impl EventIndex {
    pub fn new(event_names: Vec<String>) -> Self {
        Self {
            event_names,
            ids: Rc::new(Vec::new()),
            building: Vec::new(),
            invalidation: 0,
        }
    }

    /// The type names this index tracks.
    pub fn event_names(&self) -> &[String] {
        &self.event_names
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    /// Bumped every rebuild so consumers can notice staleness.
    pub fn invalidation(&self) -> u64 {
        self.invalidation
    }

    /// Iterate every indexed event in stream order.
    pub fn begin<'a>(&self, store: &'a EventStore) -> EventIterator<'a> {
        EventIterator::with_indirection(store, Rc::clone(&self.ids))
    }
}

impl AncillaryIndex for EventIndex {
    fn begin_rebuild(&mut self, type_table: &EventTypeTable) -> Vec<Option<Rc<EventType>>> {
        self.building.clear();
        self.event_names
            .iter()
            .map(|name| type_table.get_by_name(name))
            .collect()
    }

    fn handle_event(&mut self, _slot: usize, _event_type: &Rc<EventType>, it: &EventIterator<'_>) {
        self.building.push(it.id());
    }

    fn end_rebuild(&mut self, _store: &EventStore) {
        self.ids = Rc::new(mem::take(&mut self.building));
        self.invalidation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::builtin_types;
    use crate::event::EventType as Type;
    use crate::store::Arguments;
    use serde_json::json;

    fn build_store() -> EventStore {
        let table = Rc::new(EventTypeTable::new());
        table.define_all(builtin_types());
        let mut store = EventStore::new(table);
        let tick = store
            .event_type_table()
            .define_type(Type::create_instance("app#tick(uint32 n)", 0).unwrap());
        let tock = store
            .event_type_table()
            .define_type(Type::create_instance("app#tock()", 0).unwrap());
        for n in 0..3u32 {
            let args: Arguments = [("n".to_string(), json!(n))].into_iter().collect();
            store.insert(&tick, n * 1_000, Some(args));
            store.insert(&tock, n * 1_000 + 500, None);
        }
        store
    }

    #[test]
    fn test_collects_matching_events_in_order() {
        let mut store = build_store();
        let mut index = EventIndex::new(vec!["app#tick".to_string()]);
        store.rebuild(&mut [&mut index]);

        assert_eq!(index.count(), 3);
        let mut it = index.begin(&store);
        let mut values = Vec::new();
        while !it.done() {
            values.push(it.argument("n").unwrap());
            it.next();
        }
        assert_eq!(values, vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_multiple_names_share_one_index() {
        let mut store = build_store();
        let mut index = EventIndex::new(vec!["app#tick".to_string(), "app#tock".to_string()]);
        store.rebuild(&mut [&mut index]);
        assert_eq!(index.count(), 6);
        let mut it = index.begin(&store);
        assert_eq!(it.name(), "app#tick");
        it.next();
        assert_eq!(it.name(), "app#tock");
    }

    #[test]
    fn test_unknown_name_matches_nothing() {
        let mut store = build_store();
        let mut index = EventIndex::new(vec!["missing#type".to_string()]);
        let generation = index.invalidation();
        store.rebuild(&mut [&mut index]);
        assert_eq!(index.count(), 0);
        assert!(index.begin(&store).done());
        assert_eq!(index.invalidation(), generation + 1);
    }
}
