//! Scope tree reconstruction.
//!
//! A single forward pass over the sorted records assigns parents, depths,
//! and sibling links, closes scopes when their leave events arrive,
//! promotes generic enter/timeStamp events to named types, and folds
//! append-data payloads into the enclosing scope.

use crate::event::{event_flag, EventClass, EventType, EventTypeTable};
use crate::store::arguments::{ArgumentTable, Arguments};
use crate::store::event_store::EventStatistics;
use crate::store::record::EventRecord;
use crate::utils::config::{MAX_SCOPE_DEPTH, UNNAMED_INSTANCE, UNNAMED_SCOPE};
use serde_json::Value;
use std::rc::Rc;

/// Run the rescoping pass. Returns the hidden record count and the
/// deepest nesting level seen.
pub(crate) fn rescope_events(
    records: &mut [EventRecord],
    arguments: &mut ArgumentTable,
    type_table: &EventTypeTable,
    statistics: &mut EventStatistics,
) -> (u32, usize) {
    let enter_scope_id = type_table.get_by_name("wtf.scope#enter").map(|ty| ty.id);
    let leave_scope_id = type_table.get_by_name("wtf.scope#leave").map(|ty| ty.id);
    let append_data_id = type_table.get_by_name("wtf.scope#appendData").map(|ty| ty.id);
    let time_stamp_id = type_table.get_by_name("wtf.trace#timeStamp").map(|ty| ty.id);

    // Scope stack tracking the currently open scopes. One spare slot past
    // the cap so the push that trips the depth check still lands in
    // bounds. A scope's child/system accumulators live at the slot equal
    // to its depth, one below its own frame.
    let mut stack = vec![-1i32; MAX_SCOPE_DEPTH + 1];
    let mut type_stack: Vec<Option<Rc<EventType>>> = vec![None; MAX_SCOPE_DEPTH + 1];
    let mut max_depth_stack = vec![0u16; MAX_SCOPE_DEPTH + 1];
    let mut child_time_stack = vec![0u32; MAX_SCOPE_DEPTH + 1];
    let mut system_time_stack = vec![0u32; MAX_SCOPE_DEPTH + 1];
    let mut stack_top = 0usize;
    let mut stack_max = 0usize;

    let mut hidden_count = 0u32;

    let count = records.len();
    for n in 0..count {
        let parent_id = stack[stack_top];
        records[n].parent = parent_id;
        records[n].depth = stack_top as u16;
        records[n].max_descendant_depth = stack_top as u16;

        // Next sibling defaults to the next event; a scope's leave fixes
        // the scope up to skip over its children.
        let next_event_id = if n + 1 < count { records[n + 1].id } else { 0 };
        records[n].next_sibling = next_event_id;

        let type_id = records[n].type_id;
        let args_id = records[n].args_id;
        let mut delete_args = false;

        if enter_scope_id == Some(type_id) {
            // Generic scope enter. Promote to an on-demand named type.
            let name = generic_name(arguments, args_id, UNNAMED_SCOPE);
            let new_type = match type_table.get_by_name(&name) {
                Some(ty) => ty,
                None => type_table.define_type(EventType::new(
                    name,
                    EventClass::Scope,
                    0,
                    Vec::new(),
                )),
            };
            records[n].type_id = new_type.id;
            records[n].flags = new_type.flags;

            stack_top += 1;
            stack[stack_top] = records[n].id as i32;
            max_depth_stack[stack_top] = (stack_top - 1) as u16;
            type_stack[stack_top] = Some(new_type);
            if stack_top > stack_max {
                stack_max = stack_top;
            }
            delete_args = true;
            statistics.generic_enter_scope += 1;
        } else if leave_scope_id == Some(type_id) {
            // Scope leave. Closes the scope on top of the stack.
            records[n].next_sibling = 0;
            if stack_top > 0 {
                stack_top -= 1;

                // parent_id latched above still names the scope being left.
                let scope_index = parent_id as usize;
                records[scope_index].next_sibling = next_event_id;
                let time = records[n].time;
                let duration = time - records[scope_index].time;
                records[scope_index].end_time = time;

                // Fold the closed frame's deepest descendant into the
                // parent frame and onto the scope record.
                if max_depth_stack[stack_top] < max_depth_stack[stack_top + 1] {
                    max_depth_stack[stack_top] = max_depth_stack[stack_top + 1];
                }
                records[scope_index].max_descendant_depth = max_depth_stack[stack_top + 1];

                // Timing accumulators were gathered on the stack while the
                // scope's children closed.
                records[scope_index].child_time = child_time_stack[stack_top];
                records[scope_index].system_time = system_time_stack[stack_top];
                child_time_stack[stack_top] = 0;
                system_time_stack[stack_top] = 0;
                if stack_top > 0 {
                    child_time_stack[stack_top - 1] += duration;
                    // Time spent inside tracing scopes counts against the
                    // parent as overhead.
                    let popped_is_system = type_stack[stack_top + 1]
                        .as_ref()
                        .is_some_and(|ty| ty.has_flag(event_flag::SYSTEM_TIME));
                    if popped_is_system {
                        system_time_stack[stack_top - 1] += duration;
                    }
                }
            }
            hidden_count += 1;
        } else if append_data_id == Some(type_id) {
            append_scope_data(
                records,
                arguments,
                type_stack[stack_top].as_ref(),
                stack[stack_top],
                args_id,
                true,
            );
            hidden_count += 1;
            delete_args = true;
            statistics.append_scope_data += 1;
        } else if time_stamp_id == Some(type_id) {
            // Generic timestamp. Promote to an on-demand named type.
            let name = generic_name(arguments, args_id, UNNAMED_INSTANCE);
            let new_type = match type_table.get_by_name(&name) {
                Some(ty) => ty,
                None => type_table.define_type(EventType::new(
                    name,
                    EventClass::Instance,
                    0,
                    Vec::new(),
                )),
            };
            records[n].type_id = new_type.id;
            records[n].flags = new_type.flags;
            delete_args = true;
            statistics.generic_time_stamp += 1;
        } else if let Some(ty) = type_table.get_by_id(type_id) {
            if ty.class == EventClass::Scope {
                stack_top += 1;
                stack[stack_top] = records[n].id as i32;
                max_depth_stack[stack_top] = (stack_top - 1) as u16;
                type_stack[stack_top] = Some(Rc::clone(&ty));
                if stack_top > stack_max {
                    stack_max = stack_top;
                }
            }
            if ty.flags & (event_flag::INTERNAL | event_flag::BUILTIN) != 0 {
                hidden_count += 1;
            }
            if ty.has_flag(event_flag::APPEND_SCOPE_DATA) {
                append_scope_data(
                    records,
                    arguments,
                    type_stack[stack_top].as_ref(),
                    stack[stack_top],
                    args_id,
                    false,
                );
                hidden_count += 1;
                delete_args = true;
                statistics.append_scope_data += 1;
            }
        }

        if delete_args && records[n].args_id != 0 {
            arguments.consume(records[n].args_id);
            records[n].args_id = 0;
        }

        if stack_top >= MAX_SCOPE_DEPTH {
            log::warn!("Max scope depth exceeded, aborting!");
            break;
        }
    }

    (hidden_count, stack_max)
}

/// Pull the `name` argument used to promote a generic event, falling back
/// when it is missing or empty.
fn generic_name(arguments: &ArgumentTable, args_id: u32, fallback: &str) -> String {
    arguments
        .get(args_id)
        .and_then(|args| match args.get("name") {
            Some(Value::String(name)) if !name.is_empty() => Some(name.clone()),
            _ => None,
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Merge an append-data payload into the open scope's arguments.
///
/// Builtin append events carry `name`/`value` pairs; custom types flagged
/// for appending merge their whole payload.
fn append_scope_data(
    records: &mut [EventRecord],
    arguments: &mut ArgumentTable,
    scope_type: Option<&Rc<EventType>>,
    scope_id: i32,
    args_id: u32,
    is_builtin: bool,
) {
    let Some(scope_type) = scope_type else {
        log::warn!("appendScopeData on root?");
        return;
    };

    let scope_index = scope_id as usize;
    let mut scope_args_id = records[scope_index].args_id;
    if scope_args_id == 0 {
        // Scope had no args; give it an empty payload to merge into.
        scope_args_id = arguments.insert(Arguments::new());
        records[scope_index].args_id = scope_args_id;
    }

    let Some(src_args) = arguments.get(args_id) else {
        return;
    };
    let src_args = (*src_args).clone();
    let Some(scope_args) = arguments.get_mut(scope_args_id) else {
        return;
    };

    if is_builtin {
        let Some(name) = src_args.get("name") else {
            return;
        };
        let key = match name {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        };
        let value = src_args.get("value").cloned().unwrap_or(Value::Null);
        scope_args.insert(key, value);
    } else {
        for (key, value) in src_args {
            scope_args.insert(key, value);
        }
    }

    // Argument rendering checks this to know the scope may carry keys
    // outside its schema.
    scope_type.may_have_appended_args.set(true);
}
