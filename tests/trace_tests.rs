use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use tracedb_studio::database::{Database, DatabaseEvent};
use tracedb_studio::event::types::builtin_types;
use tracedb_studio::event::{EventType, EventTypeTable};
use tracedb_studio::flamegraph::{build_collapsed_stacks, generate_flamegraph, FlamegraphConfig};
use tracedb_studio::ingest::{self, TraceDocument};
use tracedb_studio::query::QueryDumpFormat;
use tracedb_studio::store::{Arguments, EventStore};
use tracedb_studio::unit::Unit;

/// One zone exercising scopes, instances, marks, frames, and time ranges.
const FULL_TRACE: &str = r#"{
    "units": "microseconds",
    "zones": [
        {
            "name": "main",
            "type": "script",
            "location": "trace://app",
            "scopeEventTypes": [
                "render.frame(uint32 number)",
                "render.draw(ascii pass)"
            ],
            "instanceEventTypes": [
                "net.request(ascii url, uint32 bytes)"
            ],
            "events": [
                [0, "wtf.timing#frameStart", 1],
                [0, "wtf.trace#mark", "load", null],
                [1, "render.frame", 7],
                [2, "render.draw", "opaque"],
                [6, "wtf.scope#leave"],
                [7, "net.request", "http://a/x.png", 1024],
                [9, "wtf.scope#leave"],
                [10, "wtf.timeRange#begin", 1, "loading", null],
                [12, "wtf.timeRange#begin", 2, "decoding", null],
                [14, "wtf.timeRange#end", 2],
                [16, "wtf.timing#frameEnd", 1],
                [16, "wtf.timeRange#end", 1],
                [17, "wtf.timing#frameStart", 2],
                [30, "wtf.trace#mark", "run", null],
                [40, "net.request", "http://a/y.css", 2048]
            ]
        }
    ]
}"#;

#[test]
fn test_load_full_document() {
    let db = ingest::load_str(FULL_TRACE).unwrap();

    assert_eq!(db.units(), Unit::TimeMilliseconds);
    assert_eq!(db.zones().len(), 1);
    assert_eq!(db.first_event_time(), 0.0);
    assert_eq!(db.last_event_time(), 40.0);
    // render.frame, render.draw, and the two net.request instances; all
    // mark/frame/range bookkeeping stays hidden.
    assert_eq!(db.get_total_event_count(), 4);

    let zone = &db.zones()[0];
    assert_eq!(zone.info_string(), "main (script)\ntrace://app");
    assert_eq!(zone.store().maximum_scope_depth(), 2);
}

#[test]
fn test_scope_durations_after_load() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let store = db.zones()[0].store();

    let mut it = store.begin();
    while it.name() != "render.frame" {
        it.next();
    }
    assert_eq!(it.time(), 1.0);
    assert_eq!(it.end_time(), 9.0);
    assert_eq!(it.total_duration(), 8.0);
    // The render.draw child runs 2..6; its 4ms come out of the parent.
    assert_eq!(it.own_duration(), 4.0);
    assert_eq!(it.argument("number"), Some(json!(7)));

    let mut child = it.clone();
    child.next_scope();
    assert_eq!(child.name(), "render.draw");
    assert_eq!(child.total_duration(), 4.0);
    assert_eq!(child.own_duration(), 4.0);
    assert_eq!(child.depth(), 1);
    assert_eq!(child.parent().unwrap().name(), "render.frame");
}

#[test]
fn test_nested_scope_duration_accounting() {
    let table = Rc::new(EventTypeTable::new());
    table.define_all(builtin_types());
    let mut store = EventStore::new(table);
    let outer = store
        .event_type_table()
        .define_type(EventType::create_scope("scopeA()", 0).unwrap());
    let inner = store
        .event_type_table()
        .define_type(EventType::create_scope("scopeB()", 0).unwrap());
    let leave = store
        .event_type_table()
        .get_by_name("wtf.scope#leave")
        .unwrap();

    store.insert(&outer, 0, None);
    store.insert(&inner, 1_000, None);
    store.insert(&leave, 5_000, None);
    store.insert(&leave, 10_000, None);
    store.rebuild(&mut []);

    let mut it = store.begin();
    assert_eq!(it.name(), "scopeA");
    assert_eq!(it.total_duration(), 10.0);
    assert_eq!(it.own_duration(), 6.0);
    it.next();
    assert_eq!(it.name(), "scopeB");
    assert_eq!(it.total_duration(), 4.0);
    assert_eq!(it.own_duration(), 4.0);
}

#[test]
fn test_mark_extents() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let marks = db.zones()[0].mark_list();

    assert_eq!(marks.count(), 2);
    let load = &marks.all_marks()[0];
    assert_eq!(load.name(), "load");
    assert_eq!(load.time(), 0.0);
    assert_eq!(load.end_time(), 30.0);
    // The last mark runs to the end of the zone.
    let run = &marks.all_marks()[1];
    assert_eq!(run.name(), "run");
    assert_eq!(run.end_time(), 40.0);

    assert_eq!(marks.mark_at_time(35.0).unwrap().name(), "run");
}

#[test]
fn test_frames_prune_missing_endpoints() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let frames = db.zones()[0].frame_list();

    // Frame 2 never ends, so only frame 1 survives.
    assert_eq!(frames.count(), 1);
    assert!(frames.frame(2).is_none());
    let first = frames.frame(1).unwrap();
    assert_eq!(first.time(), 0.0);
    assert_eq!(first.end_time(), 16.0);
    assert_eq!(first.duration(), 16.0);
    assert_eq!(first.ordinal(), 0);

    assert!(db.get_first_frame_list().is_some());
}

#[test]
fn test_time_range_levels() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let ranges = db.zones()[0].time_range_list();

    assert_eq!(ranges.count(), 2);
    let loading = ranges.time_range(1).unwrap();
    assert_eq!(loading.name(), "loading");
    assert_eq!(loading.time(), 10.0);
    assert_eq!(loading.end_time(), 16.0);
    assert_eq!(loading.level(), 0);
    // "decoding" overlaps "loading" and stacks onto the next level.
    let decoding = ranges.time_range(2).unwrap();
    assert_eq!(decoding.level(), 1);
    assert_eq!(ranges.maximum_level(), 2);

    assert_eq!(ranges.time_ranges_at_time(13.0).len(), 2);
    assert_eq!(ranges.time_ranges_at_time(15.0).len(), 1);
}

#[test]
fn test_query_to_csv_dump() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let zone = &db.zones()[0];

    let mut result = zone.query("render").unwrap();
    assert_eq!(result.expression(), "render");
    assert_eq!(result.count(), 2);
    assert!(result.duration_ms() >= 0.0);

    let dump = result.dump(QueryDumpFormat::Csv);
    let lines: Vec<&str> = dump.split("\r\n").collect();
    assert_eq!(
        lines,
        vec![
            "Time,Value,\"Total Time\",\"Own Time\",Depth,Arguments",
            "1,render.frame,8,4,0,number=7",
            "2,render.draw,4,4,1,pass='opaque'",
        ]
    );
}

#[test]
fn test_query_with_argument_clause() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let zone = &db.zones()[0];

    let mut result = zone.query("net(bytes > 1500)").unwrap();
    assert_eq!(result.compiled_expression(), "/net/i(bytes > 1500)");
    assert_eq!(result.count(), 1);
    let it = result.value();
    assert_eq!(it.argument("url"), Some(json!("http://a/y.css")));
    assert_eq!(it.time(), 40.0);
}

#[test]
fn test_query_json_dump() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let zone = &db.zones()[0];

    let mut result = zone.query("render.draw").unwrap();
    let rows: serde_json::Value =
        serde_json::from_str(&result.dump(QueryDumpFormat::Json)).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("render.draw"));
    assert_eq!(rows[0]["time"], json!(2.0));
    assert_eq!(rows[0]["totalTime"], json!(4.0));
    assert_eq!(rows[0]["arguments"]["pass"], json!("opaque"));
}

#[test]
fn test_query_parse_error_reports_position() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let zone = &db.zones()[0];

    let error = zone.query("render(number >").unwrap_err();
    assert_eq!(error.offset, 15);
    assert!(error.expected.iter().any(|e| e.contains("value")));
}

#[test]
fn test_appended_data_merges_into_scope() {
    let db = ingest::load_str(
        r#"{
            "zones": [{
                "name": "z", "type": "script", "location": "",
                "scopeEventTypes": ["task.run(uint32 n)"],
                "events": [
                    [0, "task.run", 3],
                    [1, "wtf.scope#appendData", "note", "hello"],
                    [5, "wtf.scope#leave"]
                ]
            }]
        }"#,
    )
    .unwrap();

    let store = db.zones()[0].store();
    assert_eq!(store.total_event_count(), 1);
    assert_eq!(store.statistics().append_scope_data, 1);

    let it = store.begin();
    assert_eq!(it.name(), "task.run");
    assert_eq!(it.argument("note"), Some(json!("hello")));
    assert_eq!(it.argument_string(true), "n=3, note='hello'");
    assert!(it.event_type().unwrap().may_have_appended_args.get());
}

#[test]
fn test_set_and_reset_arguments() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let store = db.zones()[0].store();

    let mut it = store.begin();
    while it.name() != "render.frame" {
        it.next();
    }
    let replacement: Arguments = [("number".to_string(), json!(99))].into_iter().collect();
    it.set_arguments(replacement);
    assert_eq!(it.argument("number"), Some(json!(99)));

    it.reset_arguments();
    assert_eq!(it.argument("number"), Some(json!(7)));
}

#[test]
fn test_type_registration_is_idempotent() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let table = db.zones()[0].store().event_type_table();

    let existing = table.get_by_name("render.frame").unwrap();
    let redefined =
        table.define_type(EventType::create_scope("render.frame(uint32 number)", 0).unwrap());
    assert!(Rc::ptr_eq(&existing, &redefined));
    assert_eq!(existing.id, redefined.id);
}

#[test]
fn test_units_flow_through() {
    let db = ingest::load_str(r#"{"units": "bytes", "zones": []}"#).unwrap();
    assert_eq!(db.units(), Unit::SizeKilobytes);
    assert_eq!(db.units().format(1.024, true), "1kb");
    assert_eq!(db.units().format(0.0, false), "0b");
}

#[test]
fn test_database_events_during_load() {
    let document: TraceDocument = serde_json::from_str(FULL_TRACE).unwrap();
    let mut db = Database::new();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    db.add_listener(Box::new(move |event| sink.borrow_mut().push(event.clone())));

    ingest::load_document(&mut db, &document).unwrap();

    let events = events.borrow();
    assert!(events.contains(&DatabaseEvent::SourcesChanged));
    assert!(events.contains(&DatabaseEvent::ZonesAdded {
        zone_indices: vec![0]
    }));
    assert_eq!(events.last(), Some(&DatabaseEvent::Invalidated));
}

#[test]
fn test_flamegraph_from_document() {
    let db = ingest::load_str(FULL_TRACE).unwrap();
    let stacks = build_collapsed_stacks(&db);

    // Scope own time only; instances and bookkeeping carry no weight.
    assert_eq!(stacks.len(), 2);
    let weight_of = |name: &str| {
        stacks
            .iter()
            .find(|stack| stack.stack == name)
            .map(|stack| stack.weight)
    };
    assert_eq!(weight_of("main;render.frame"), Some(4_000));
    assert_eq!(weight_of("main;render.frame;render.draw"), Some(4_000));

    let config = FlamegraphConfig::new().with_title("app trace");
    let svg = generate_flamegraph(&stacks, Some(&config)).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("app trace"));
}
