//! The event type registry.

use crate::event::types::{EventClass, EventType};
use regex::Regex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Registry of event types, shared between a database and its stores.
///
/// Registration is idempotent: defining a name twice hands back the first
/// instance. Uses interior mutability because generic enter/timestamp
/// records register types on the fly in the middle of a rebuild pass.
#[derive(Debug, Default)]
pub struct EventTypeTable {
    inner: RefCell<TableInner>,
}

#[derive(Debug, Default)]
struct TableInner {
    /// Types in id order; ids are 1-based, so `types[id - 1]`.
    types: Vec<Rc<EventType>>,
    by_name: HashMap<String, Rc<EventType>>,
}

impl EventTypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, or return the existing registration for its name.
    ///
    /// Assigns the next 1-based id on first registration; ids are never
    /// reused for the lifetime of the table.
    pub fn define_type(&self, event_type: EventType) -> Rc<EventType> {
        let mut inner = self.inner.borrow_mut();
        if let Some(existing) = inner.by_name.get(&event_type.name) {
            return Rc::clone(existing);
        }
        let mut event_type = event_type;
        event_type.id = (inner.types.len() + 1) as u16;
        let shared = Rc::new(event_type);
        inner.types.push(Rc::clone(&shared));
        inner
            .by_name
            .insert(shared.name.clone(), Rc::clone(&shared));
        shared
    }

    /// Register every type in a list, keeping the first registration when
    /// names collide.
    pub fn define_all(&self, types: Vec<EventType>) {
        for event_type in types {
            self.define_type(event_type);
        }
    }

    pub fn get_by_id(&self, id: u16) -> Option<Rc<EventType>> {
        let inner = self.inner.borrow();
        inner.types.get((id as usize).wrapping_sub(1)).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Rc<EventType>> {
        self.inner.borrow().by_name.get(name).cloned()
    }

    /// All registered types in id order.
    pub fn get_all(&self) -> Vec<Rc<EventType>> {
        self.inner.borrow().types.clone()
    }

    /// Types whose names match the regex, optionally restricted to a class.
    pub fn get_all_matching(
        &self,
        regex: &Regex,
        class: Option<EventClass>,
    ) -> Vec<Rc<EventType>> {
        self.inner
            .borrow()
            .types
            .iter()
            .filter(|ty| class.map_or(true, |c| ty.class == c))
            .filter(|ty| regex.is_match(&ty.name))
            .cloned()
            .collect()
    }

    /// Ids of types whose names match the regex.
    pub fn get_set_matching(&self, regex: &Regex) -> HashSet<u16> {
        self.inner
            .borrow()
            .types
            .iter()
            .filter(|ty| regex.is_match(&ty.name))
            .map(|ty| ty.id)
            .collect()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.inner.borrow().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::builtin_types;

    #[test]
    fn test_define_assigns_sequential_ids() {
        let table = EventTypeTable::new();
        let a = table.define_type(EventType::create_instance("a()", 0).unwrap());
        let b = table.define_type(EventType::create_instance("b()", 0).unwrap());
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(Rc::ptr_eq(&table.get_by_id(1).unwrap(), &a));
        assert!(Rc::ptr_eq(&table.get_by_id(2).unwrap(), &b));
    }

    #[test]
    fn test_define_is_idempotent() {
        let table = EventTypeTable::new();
        let first = table.define_type(EventType::create_scope("dup(uint32 n)", 0).unwrap());
        let second = table.define_type(EventType::create_scope("dup(uint32 n)", 0).unwrap());
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.id, second.id);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_get_by_name() {
        let table = EventTypeTable::new();
        table.define_all(builtin_types());
        assert!(table.get_by_name("wtf.scope#enter").is_some());
        assert!(table.get_by_name("no.such#event").is_none());
        assert!(table.get_by_id(0).is_none());
    }

    #[test]
    fn test_get_all_matching() {
        let table = EventTypeTable::new();
        table.define_type(EventType::create_scope("render.frame()", 0).unwrap());
        table.define_type(EventType::create_instance("render.flush()", 0).unwrap());
        table.define_type(EventType::create_scope("layout.pass()", 0).unwrap());

        let re = Regex::new("render").unwrap();
        assert_eq!(table.get_all_matching(&re, None).len(), 2);
        assert_eq!(
            table
                .get_all_matching(&re, Some(EventClass::Scope))
                .len(),
            1
        );
        assert_eq!(table.get_set_matching(&re).len(), 2);
    }
}
