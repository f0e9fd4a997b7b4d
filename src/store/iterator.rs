//! Cursor over event records.
//!
//! One iterator type serves every access pattern: whole-store scans,
//! time-window queries, single-event lookups, and filtered views driven
//! by an indirection table. Navigation never allocates; only
//! [`EventIterator::parent`] hands out a new cursor.

use crate::event::{event_flag, EventType};
use crate::store::arguments::Arguments;
use crate::store::event_store::EventStore;
use crate::store::record::EventRecord;
use crate::unit::Unit;
use crate::utils::config::TIME_SCALE;
use crate::utils::format;
use serde_json::Value;
use std::collections::HashSet;
use std::rc::Rc;

/// A movable cursor over a range of events.
///
/// The range is fixed at construction; `seek` positions are absolute
/// store indices. When an indirection table is present the cursor walks
/// that table instead of raw positions, which is how filtered views
/// reuse all of the navigation and accessor logic.
#[derive(Clone)]
pub struct EventIterator<'a> {
    store: &'a EventStore,
    first: usize,
    /// One past the last visitable position.
    end: usize,
    pos: usize,
    indirection: Option<Rc<Vec<u32>>>,
}

impl<'a> EventIterator<'a> {
    pub(crate) fn new(store: &'a EventStore, first: usize, end: usize, pos: usize) -> Self {
        Self {
            store,
            first,
            end,
            pos,
            indirection: None,
        }
    }

    /// Cursor over an explicit list of record ids, in list order.
    pub(crate) fn with_indirection(store: &'a EventStore, table: Rc<Vec<u32>>) -> Self {
        let end = table.len();
        Self {
            store,
            first: 0,
            end,
            pos: 0,
            indirection: Some(table),
        }
    }

    fn record_index(&self) -> usize {
        match &self.indirection {
            Some(table) => table[self.pos] as usize,
            None => self.pos,
        }
    }

    fn record(&self) -> EventRecord {
        self.store.record(self.record_index())
    }

    /// Number of positions this cursor can visit.
    pub fn count(&self) -> usize {
        self.end - self.first
    }

    /// Whether the cursor has moved past its range.
    pub fn done(&self) -> bool {
        self.pos >= self.end
    }

    /// Jump to an absolute position.
    pub fn seek(&mut self, index: usize) {
        self.pos = index;
    }

    /// Advance one event.
    pub fn next(&mut self) {
        self.pos += 1;
    }

    /// Advance to the next scope event, or to the end.
    pub fn next_scope(&mut self) {
        while self.pos < self.end {
            self.pos += 1;
            if self.pos >= self.end || self.record().end_time != 0 {
                break;
            }
        }
    }

    /// Advance to the next instance event, or to the end.
    pub fn next_instance(&mut self) {
        while self.pos < self.end {
            self.pos += 1;
            if self.pos >= self.end || self.record().end_time == 0 {
                break;
            }
        }
    }

    /// Move to the next sibling, skipping all descendants.
    pub fn next_sibling(&mut self) {
        if self.done() {
            return;
        }
        let next_id = self.record().next_sibling;
        if next_id == 0 {
            self.pos = self.end;
        } else {
            self.seek(next_id as usize);
        }
    }

    /// Move to the next sibling that is a scope, skipping descendants.
    pub fn next_sibling_scope(&mut self) {
        self.next_sibling();
        if !self.done() && self.record().end_time == 0 {
            self.next_scope();
        }
    }

    /// Rewind to the first scope event in the range.
    pub fn move_to_first_scope(&mut self) {
        self.seek(self.first);
        if !self.done() && !self.is_scope() {
            self.next_scope();
        }
    }

    /// Rewind to the first instance event in the range.
    pub fn move_to_first_instance(&mut self) {
        self.seek(self.first);
        if !self.done() && !self.is_instance() {
            self.next_instance();
        }
    }

    /// Move to the parent scope, or to the end when at the root.
    pub fn move_to_parent(&mut self) {
        if self.done() {
            return;
        }
        let parent = self.record().parent;
        if parent >= 0 {
            self.seek(parent as usize);
        } else {
            self.pos = self.end;
        }
    }

    /// Fresh full-range cursor positioned on the parent scope.
    pub fn parent(&self) -> Option<EventIterator<'a>> {
        if self.done() {
            return None;
        }
        let parent = self.record().parent;
        if parent >= 0 {
            Some(EventIterator::new(
                self.store,
                0,
                self.store.count(),
                parent as usize,
            ))
        } else {
            None
        }
    }

    /// Record id of the current event.
    pub fn id(&self) -> u32 {
        self.record().id
    }

    /// Current absolute position.
    pub fn index(&self) -> usize {
        self.pos
    }

    pub fn type_id(&self) -> u16 {
        self.record().type_id
    }

    pub fn event_type(&self) -> Option<Rc<EventType>> {
        self.store.event_type_table().get_by_id(self.type_id())
    }

    /// Type name, or empty for an unregistered type id.
    pub fn name(&self) -> String {
        self.event_type()
            .map(|ty| ty.name.clone())
            .unwrap_or_default()
    }

    /// Flags cached on the record at rescope time.
    pub fn type_flags(&self) -> u16 {
        self.record().flags
    }

    /// Whether the event is bookkeeping rather than trace content.
    pub fn is_hidden(&self) -> bool {
        self.type_flags()
            & (event_flag::INTERNAL | event_flag::APPEND_SCOPE_DATA | event_flag::APPEND_FLOW_DATA)
            != 0
    }

    pub fn is_scope(&self) -> bool {
        self.record().is_scope()
    }

    pub fn is_instance(&self) -> bool {
        !self.is_scope()
    }

    /// End time of the parent scope in milliseconds, or 0 at the root.
    pub fn parent_end_time(&self) -> f64 {
        let parent = self.record().parent;
        if parent >= 0 {
            self.store.record(parent as usize).end_time as f64 / TIME_SCALE
        } else {
            0.0
        }
    }

    /// Distance from the root.
    pub fn depth(&self) -> u16 {
        self.record().depth
    }

    /// Deepest depth of any descendant of this event.
    pub fn max_descendant_depth(&self) -> u16 {
        self.record().max_descendant_depth
    }

    /// Event time in milliseconds. For scopes this is the entry time.
    pub fn time(&self) -> f64 {
        self.record().time as f64 / TIME_SCALE
    }

    /// Scope end time in milliseconds. Only meaningful for scopes.
    pub fn end_time(&self) -> f64 {
        self.record().end_time as f64 / TIME_SCALE
    }

    /// Wall time spent in the scope, children and overhead included.
    pub fn total_duration(&self) -> f64 {
        let record = self.record();
        (record.end_time as i64 - record.time as i64) as f64 / TIME_SCALE
    }

    /// Scope duration minus tracing overhead.
    pub fn user_duration(&self) -> f64 {
        let record = self.record();
        (record.end_time as i64 - record.time as i64 - record.system_time as i64) as f64
            / TIME_SCALE
    }

    /// Scope duration minus time spent in child scopes and tracing
    /// overhead.
    pub fn own_duration(&self) -> f64 {
        let record = self.record();
        (record.end_time as i64
            - record.time as i64
            - record.child_time as i64
            - record.system_time as i64) as f64
            / TIME_SCALE
    }

    /// Argument payload, if any.
    pub fn arguments(&self) -> Option<Rc<Arguments>> {
        self.store.get_argument_data(self.record().args_id)
    }

    /// Override the argument payload. The original values can be restored
    /// with [`reset_arguments`](Self::reset_arguments).
    pub fn set_arguments(&self, values: Arguments) {
        let record_index = self.record_index();
        let args_id = self.store.record(record_index).args_id;
        let new_id = self.store.set_argument_data(args_id, values);
        self.store.set_record_args_id(record_index, new_id);
    }

    /// Restore the argument payload to its as-loaded values.
    pub fn reset_arguments(&self) {
        let args_id = self.record().args_id;
        if args_id != 0 {
            self.store.reset_argument_data(args_id);
        }
    }

    /// One argument value by key.
    pub fn argument(&self, key: &str) -> Option<Value> {
        self.arguments().and_then(|args| args.get(key).cloned())
    }

    /// Application-defined tag slot.
    pub fn tag(&self) -> u32 {
        self.record().tag
    }

    pub fn set_tag(&self, value: u32) {
        self.store.set_record_tag(self.record_index(), value);
    }

    fn build_argument_string(&self, s: &mut String, include_names: bool) {
        let Some(ty) = self.event_type() else {
            return;
        };
        let Some(arg_data) = self.arguments() else {
            return;
        };
        if ty.args.is_empty() {
            return;
        }

        // Schema arguments first, in declared order.
        let mut first = true;
        for spec in &ty.args {
            append_argument(s, &mut first, include_names, &spec.name, arg_data.get(&spec.name));
        }

        // Appended arguments carry keys outside the schema.
        if ty.may_have_appended_args.get() {
            let seen: HashSet<&str> = ty.args.iter().map(|spec| spec.name.as_str()).collect();
            for (key, value) in arg_data.iter() {
                if !seen.contains(key.as_str()) {
                    append_argument(s, &mut first, include_names, key, Some(value));
                }
            }
        }
    }

    /// Arguments as `123, 'hello'`, or `foo=123, bar='hello'` when names
    /// are requested.
    pub fn argument_string(&self, include_names: bool) -> String {
        let mut s = String::new();
        self.build_argument_string(&mut s, include_names);
        s
    }

    /// Event and arguments as `my#event(123, 'hello')`.
    pub fn long_string(&self, include_names: bool) -> String {
        let mut s = String::new();
        s.push_str(&self.name());
        s.push('(');
        self.build_argument_string(&mut s, include_names);
        s.push(')');
        s
    }

    /// Multi-line description of the current event, or `None` at the end
    /// of the range.
    pub fn info_string(&self, units: Unit) -> Option<String> {
        if self.done() {
            return None;
        }
        if self.is_scope() {
            Some(self.scope_info_string(units))
        } else {
            Some(self.instance_info_string())
        }
    }

    fn scope_info_string(&self, units: Unit) -> String {
        let total = self.total_duration();
        let own = self.own_duration();
        let mut times = units.format(total, false);
        if total - own != 0.0 {
            times.push_str(" (");
            times.push_str(&units.format(own, false));
            times.push(')');
        }

        let mut lines = vec![format!("{}: {}", times, self.name())];
        if let Some(args) = self.arguments() {
            format::add_argument_lines(&mut lines, &args, 1);
        }
        for flow in self.child_flows() {
            lines.push(format!("  {}", flow.name()));
            if let Some(args) = flow.arguments() {
                format::add_argument_lines(&mut lines, &args, 2);
            }
        }
        lines.join("\n")
    }

    fn instance_info_string(&self) -> String {
        let mut lines = vec![self.name()];
        if let Some(args) = self.arguments() {
            format::add_argument_lines(&mut lines, &args, 1);
        }
        lines.join("\n")
    }

    /// The enclosing scope chain as numbered lines, innermost first.
    pub fn scope_stack_string(&self) -> String {
        let mut names = Vec::new();
        let mut it = EventIterator::new(self.store, 0, self.store.count(), self.record_index());
        while !it.done() {
            names.push(it.name());
            match it.parent() {
                Some(parent) => it = parent,
                None => break,
            }
        }
        let total = names.len();
        names
            .iter()
            .enumerate()
            .map(|(n, name)| format!("{}: {}", total - n - 1, name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Flow events immediately parented by this event.
    fn child_flows(&self) -> Vec<EventIterator<'a>> {
        let branch_id = self.store.get_event_type_id("wtf.flow#branch");
        let extend_id = self.store.get_event_type_id("wtf.flow#extend");
        let terminate_id = self.store.get_event_type_id("wtf.flow#terminate");

        let mut flows = Vec::new();
        let mut it = self.store.begin_time_range(self.time(), self.end_time(), false);
        let own_id = self.id();
        while !it.done() {
            // Only immediate children so a flow associates with one scope.
            if it.parent().map(|parent| parent.id()) == Some(own_id) {
                let type_id = Some(it.type_id());
                if type_id == branch_id || type_id == extend_id || type_id == terminate_id {
                    flows.push(self.store.get_event(it.id() as usize));
                }
            }
            it.next();
        }
        flows
    }

    /// Id of the first flow branched or extended under this event, or -1.
    pub fn child_flow_id(&self) -> i64 {
        let flows = self.child_flows();
        match flows.first().and_then(|flow| flow.argument("id")) {
            Some(Value::Number(id)) => id.as_i64().unwrap_or(-1),
            _ => -1,
        }
    }
}

fn append_argument(
    s: &mut String,
    first: &mut bool,
    include_names: bool,
    name: &str,
    value: Option<&Value>,
) {
    if !*first {
        s.push_str(", ");
    }
    *first = false;
    if include_names {
        s.push_str(name);
        s.push('=');
    }
    match value {
        Some(Value::String(text)) => {
            s.push('\'');
            s.push_str(text);
            s.push('\'');
        }
        Some(other) => s.push_str(&format::format_value(other)),
        None => {}
    }
}
