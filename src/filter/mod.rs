//! Query filter compilation and evaluation.
//!
//! This module turns a filter string like `"render" (frames > 2)` into a
//! pair of predicates:
//! - a type query matched against event type names (substring or regex)
//! - an argument predicate evaluated per record against its decoded
//!   arguments and `@`-prefixed pseudo-attributes
//!
//! and applies them to a store with one linear scan, producing an
//! index-backed iterator over the matching records.

pub mod expression;
mod lexer;
mod parser;

pub use expression::{
    Access, ArgumentClause, CompareOp, FilterExpression, Operand, Reference, RegexLiteral,
    TypeQuery, PSEUDO_ATTRIBUTES,
};

use crate::event::{event_flag, EventType, EventTypeTable};
use crate::store::{EventIterator, EventStore};
use crate::utils::error::FilterParseError;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Outcome of a filter mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Updated,
    Failed,
    NoChange,
}

/// Event filter state manager.
///
/// An application creates one filter and manipulates it over the course of
/// a run; consumers re-test event types against it whenever it reports
/// [`FilterResult::Updated`]. An inactive filter passes everything.
#[derive(Debug, Default)]
pub struct Filter {
    source_string: String,
    expression: Option<FilterExpression>,
    error: Option<FilterParseError>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from an initial expression string.
    pub fn from_string(value: &str) -> Self {
        let mut filter = Self::new();
        filter.set_from_string(value);
        filter
    }

    /// Whether the filter currently restricts anything.
    pub fn is_active(&self) -> bool {
        self.expression.is_some()
    }

    /// The string the active expression was compiled from.
    pub fn source_string(&self) -> &str {
        &self.source_string
    }

    /// The parse error from the last failed [`Filter::set_from_string`],
    /// kept until the next successful update or clear.
    pub fn error(&self) -> Option<&FilterParseError> {
        self.error.as_ref()
    }

    pub fn expression(&self) -> Option<&FilterExpression> {
        self.expression.as_ref()
    }

    /// Rendering of the compiled expression, for query result inspection.
    pub fn debug_string(&self) -> String {
        match &self.expression {
            Some(expression) => expression.to_string(),
            None => String::new(),
        }
    }

    /// Reset to the inactive state.
    pub fn clear(&mut self) -> FilterResult {
        self.error = None;
        if self.expression.is_none() {
            return FilterResult::NoChange;
        }
        self.source_string.clear();
        self.expression = None;
        FilterResult::Updated
    }

    /// Update the filter from an expression string.
    ///
    /// An empty string clears the filter. A string that fails to parse
    /// leaves the previously compiled expression in place and records the
    /// error for [`Filter::error`].
    pub fn set_from_string(&mut self, value: &str) -> FilterResult {
        let value = value.trim();
        if self.source_string == value {
            return FilterResult::NoChange;
        }

        if value.is_empty() {
            self.clear();
            return FilterResult::Updated;
        }

        match parser::parse_filter(value) {
            Ok(expression) => {
                self.source_string = value.to_string();
                self.expression = Some(expression);
                self.error = None;
                FilterResult::Updated
            }
            Err(error) => {
                self.error = Some(error);
                FilterResult::Failed
            }
        }
    }

    /// Whether the given type passes the type-name predicate.
    pub fn match_event_type(&self, event_type: &EventType) -> bool {
        self.expression
            .as_ref()
            .map_or(true, |e| e.match_event_type(event_type))
    }

    /// Whether the record under the iterator passes the argument clauses.
    pub fn match_arguments(&self, it: &EventIterator<'_>) -> bool {
        self.expression
            .as_ref()
            .map_or(true, |e| e.match_arguments(it))
    }

    pub fn has_argument_clauses(&self) -> bool {
        self.expression
            .as_ref()
            .is_some_and(|e| e.has_argument_clauses())
    }

    /// Per-type match map for every non-internal registered type.
    ///
    /// Internal types never appear in the map, so lookups for them read as
    /// non-matches.
    pub fn matched_event_types(&self, table: &EventTypeTable) -> HashMap<u16, bool> {
        let mut result = HashMap::new();
        for event_type in table.get_all() {
            if event_type.flags & event_flag::INTERNAL != 0 {
                continue;
            }
            result.insert(event_type.id, self.match_event_type(&event_type));
        }
        result
    }

    /// Run the filter over every record in the store, collecting matches
    /// into an index-backed iterator.
    ///
    /// The type predicate is evaluated once per registered type, then each
    /// record pays only a map lookup plus the argument clauses.
    pub fn apply_to_event_list<'a>(&self, store: &'a EventStore) -> EventIterator<'a> {
        let matched = self.matched_event_types(store.event_type_table());
        let mut ids = Vec::new();
        let mut it = store.begin();
        while !it.done() {
            if matched.get(&it.type_id()).copied().unwrap_or(false) && self.match_arguments(&it) {
                ids.push(it.id());
            }
            it.next();
        }
        EventIterator::with_indirection(store, Rc::new(ids))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::builtin_types;
    use crate::store::Arguments;
    use serde_json::json;

    fn build_store() -> EventStore {
        let table = Rc::new(EventTypeTable::new());
        table.define_all(builtin_types());
        let mut store = EventStore::new(table);

        let frame = store
            .event_type_table()
            .define_type(EventType::create_instance("render.frame(uint32 frames)", 0).unwrap());
        let pass = store
            .event_type_table()
            .define_type(EventType::create_scope("work.pass()", 0).unwrap());
        let tick = store
            .event_type_table()
            .define_type(EventType::create_instance("app.tick()", 0).unwrap());
        let leave = store
            .event_type_table()
            .get_by_name("wtf.scope#leave")
            .unwrap();

        // work.pass scopes: 10ms at t=0, 4ms at t=20ms.
        store.insert(&pass, 0, None);
        store.insert(&leave, 10_000, None);
        store.insert(&pass, 20_000, None);
        store.insert(&leave, 24_000, None);
        for n in 1..=4u32 {
            let args: Arguments = [("frames".to_string(), json!(n))].into_iter().collect();
            store.insert(&frame, 30_000 + n * 1_000, Some(args));
        }
        store.insert(&tick, 40_000, None);
        store.rebuild(&mut []);
        store
    }

    #[test]
    fn test_round_trip_and_activity() {
        let mut filter = Filter::new();
        assert!(!filter.is_active());
        assert_eq!(filter.to_string(), "");

        assert_eq!(filter.set_from_string("render"), FilterResult::Updated);
        assert!(filter.is_active());
        assert_eq!(filter.to_string(), "render");

        assert_eq!(filter.set_from_string("render"), FilterResult::NoChange);
        assert_eq!(filter.set_from_string("  render  "), FilterResult::NoChange);

        assert_eq!(filter.set_from_string(""), FilterResult::Updated);
        assert!(!filter.is_active());
        assert_eq!(filter.set_from_string(""), FilterResult::NoChange);
    }

    #[test]
    fn test_parse_failure_keeps_prior_state() {
        let mut filter = Filter::new();
        assert_eq!(filter.set_from_string("render"), FilterResult::Updated);

        assert_eq!(filter.set_from_string("a(foo<)"), FilterResult::Failed);
        assert!(filter.is_active());
        assert_eq!(filter.to_string(), "render");
        let error = filter.error().unwrap();
        assert_eq!(error.offset, 6);

        assert_eq!(filter.set_from_string("work"), FilterResult::Updated);
        assert!(filter.error().is_none());
    }

    #[test]
    fn test_invalid_string_on_fresh_filter_stays_inactive() {
        let mut filter = Filter::new();
        assert_eq!(filter.set_from_string("a(foo<)"), FilterResult::Failed);
        assert!(!filter.is_active());
        assert!(filter.error().is_some());
    }

    #[test]
    fn test_clear() {
        let mut filter = Filter::from_string("render");
        assert_eq!(filter.clear(), FilterResult::Updated);
        assert_eq!(filter.clear(), FilterResult::NoChange);
        assert_eq!(filter.to_string(), "");
    }

    #[test]
    fn test_matched_types_skip_internal() {
        let store = build_store();
        let filter = Filter::new();
        let matched = filter.matched_event_types(store.event_type_table());

        let frame_id = store.get_event_type_id("render.frame").unwrap();
        let leave_id = store.get_event_type_id("wtf.scope#leave").unwrap();
        assert_eq!(matched.get(&frame_id), Some(&true));
        assert!(!matched.contains_key(&leave_id));
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        let store = build_store();
        let filter = Filter::from_string("RENDER");
        let matched = filter.matched_event_types(store.event_type_table());

        let frame_id = store.get_event_type_id("render.frame").unwrap();
        let pass_id = store.get_event_type_id("work.pass").unwrap();
        assert_eq!(matched.get(&frame_id), Some(&true));
        assert_eq!(matched.get(&pass_id), Some(&false));
    }

    #[test]
    fn test_scenario_render_frames_above_two() {
        let store = build_store();
        let filter = Filter::from_string("\"render\" (frames > 2)");

        let mut it = filter.apply_to_event_list(&store);
        assert_eq!(it.count(), 2);
        assert_eq!(it.argument("frames"), Some(json!(3)));
        it.next();
        assert_eq!(it.argument("frames"), Some(json!(4)));
        it.next();
        assert!(it.done());
    }

    #[test]
    fn test_regex_type_query() {
        let store = build_store();
        let filter = Filter::from_string("/^work\\./");
        let mut it = filter.apply_to_event_list(&store);
        assert_eq!(it.count(), 2);
        assert_eq!(it.name(), "work.pass");
        it.next();
        assert_eq!(it.name(), "work.pass");
    }

    #[test]
    fn test_pseudo_attribute_duration() {
        let store = build_store();
        let filter = Filter::from_string("(@duration >= 5)");
        let mut it = filter.apply_to_event_list(&store);
        assert_eq!(it.count(), 1);
        assert_eq!(it.name(), "work.pass");
        assert_eq!(it.time(), 0.0);
        it.next();
        assert!(it.done());
    }

    #[test]
    fn test_empty_argument_list_matches_like_bare_query() {
        let store = build_store();
        let bare = Filter::from_string("work");
        let with_parens = Filter::from_string("work()");
        assert_eq!(
            bare.apply_to_event_list(&store).count(),
            with_parens.apply_to_event_list(&store).count()
        );
    }

    #[test]
    fn test_missing_argument_comparisons() {
        let store = build_store();

        // Ordering against a missing argument never matches.
        let filter = Filter::from_string("render(bogus > 0)");
        assert_eq!(filter.apply_to_event_list(&store).count(), 0);

        // Equality against null treats a missing argument as null.
        let filter = Filter::from_string("render(bogus == null)");
        assert_eq!(filter.apply_to_event_list(&store).count(), 4);
    }

    #[test]
    fn test_regex_argument_match() {
        let table = Rc::new(EventTypeTable::new());
        table.define_all(builtin_types());
        let mut store = EventStore::new(table);
        let fetch = store
            .event_type_table()
            .define_type(EventType::create_instance("net.fetch(ascii url)", 0).unwrap());
        for url in ["http://a/x.png", "http://a/y.css"] {
            let args: Arguments = [("url".to_string(), json!(url))].into_iter().collect();
            store.insert(&fetch, 0, Some(args));
        }
        store.rebuild(&mut []);

        let filter = Filter::from_string("fetch(url =~ /\\.png$/)");
        let mut it = filter.apply_to_event_list(&store);
        assert_eq!(it.count(), 1);
        assert_eq!(it.argument("url"), Some(json!("http://a/x.png")));

        let filter = Filter::from_string("fetch(url !~ /\\.png$/)");
        assert_eq!(filter.apply_to_event_list(&store).count(), 1);
    }
}
