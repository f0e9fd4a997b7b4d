//! Trace document loading.
//!
//! Reads the JSON document format into a [`Database`]: registers the
//! declared event types, streams the rows into their zones inside one
//! insertion transaction, and lets the end-of-transaction rebuild derive
//! everything else. Row times are milliseconds and are converted to the
//! store's integer microseconds on insert.

use crate::database::Database;
use crate::event::EventType;
use crate::store::Arguments;
use crate::unit::Unit;
use crate::utils::IngestError;
use log::{debug, warn};
use serde_json::Value;
use std::fs;
use std::path::Path;

pub mod document;

pub use document::{TraceDocument, ZoneDocument};

/// Loads a trace document from disk into a fresh database.
pub fn load_file(path: &Path) -> Result<Database, IngestError> {
    debug!("Loading trace document from {}", path.display());
    let text = fs::read_to_string(path)?;
    load_str(&text)
}

/// Loads a trace document from JSON text into a fresh database.
pub fn load_str(text: &str) -> Result<Database, IngestError> {
    let document: TraceDocument = serde_json::from_str(text)?;
    let mut db = Database::new();
    load_document(&mut db, &document)?;
    Ok(db)
}

/// Loads a parsed document into an existing database as one source.
///
/// Type declaration errors are fatal; bad event rows and unknown event
/// names are skipped with a warning so one stray row cannot sink a trace.
pub fn load_document(db: &mut Database, document: &TraceDocument) -> Result<(), IngestError> {
    let units = Unit::parse(document.units.as_deref());
    db.begin_inserting_events(units)?;

    for zone_doc in &document.zones {
        let index =
            db.create_or_get_zone(&zone_doc.name, &zone_doc.zone_type, &zone_doc.location);
        let Some(zone) = db.zone_mut(index) else {
            continue;
        };

        for signature in &zone_doc.scope_event_types {
            zone.store()
                .event_type_table()
                .define_type(EventType::create_scope(signature, 0)?);
        }
        for signature in &zone_doc.instance_event_types {
            zone.store()
                .event_type_table()
                .define_type(EventType::create_instance(signature, 0)?);
        }

        for row in &zone_doc.events {
            let Some(cells) = row.as_array() else {
                warn!("Skipping malformed event row: {}", row);
                continue;
            };
            let time = cells.first().and_then(Value::as_f64);
            let name = cells.get(1).and_then(Value::as_str);
            let (Some(time), Some(name)) = (time, name) else {
                warn!("Skipping malformed event row: {}", row);
                continue;
            };

            let Some(event_type) = zone.store().event_type_table().get_by_name(name) else {
                warn!("Skipping event with unknown type '{}'", name);
                continue;
            };

            let args = if cells.len() > 2 && !event_type.args.is_empty() {
                let args: Arguments = event_type
                    .args
                    .iter()
                    .zip(cells[2..].iter())
                    .map(|(spec, value)| (spec.name.clone(), value.clone()))
                    .collect();
                Some(args)
            } else {
                None
            };

            let time_micros = (time * 1000.0).round() as u32;
            zone.store_mut().insert(&event_type, time_micros, args);
        }
    }

    db.end_inserting_events()?;
    Ok(())
}
