//! Info command implementation.
//!
//! Loads a trace document and prints a summary of the database: units,
//! event counts, time extents, and per-zone statistics.

use crate::ingest::load_file;
use crate::unit::Unit;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Arguments for the info command
#[derive(Debug, Clone)]
pub struct InfoArgs {
    /// Path to the trace document
    pub input: PathBuf,
}

/// Execute the info command
pub fn execute_info(args: InfoArgs) -> Result<()> {
    let db = load_file(&args.input)
        .with_context(|| format!("Failed to load trace document {}", args.input.display()))?;

    let units = db.units();
    let units_label = match units {
        Unit::TimeMilliseconds => "time (milliseconds)",
        Unit::SizeKilobytes => "size (kilobytes)",
        Unit::Count => "count",
    };

    println!("Trace: {}", args.input.display());
    println!("Units: {}", units_label);
    println!(
        "Events: {} ({} - {})",
        db.get_total_event_count(),
        units.format(db.first_event_time(), false),
        units.format(db.last_event_time(), false)
    );
    println!("Zones: {}", db.zones().len());

    for zone in db.zones() {
        println!();
        println!("{}", zone.info_string());
        let store = zone.store();
        let statistics = store.statistics();
        println!("  events:       {}", store.total_event_count());
        println!("  scope depth:  {}", store.maximum_scope_depth());
        println!("  frames:       {}", zone.frame_list().count());
        println!("  marks:        {}", zone.mark_list().count());
        println!("  time ranges:  {}", zone.time_range_list().count());
        if statistics.generic_enter_scope > 0 || statistics.generic_time_stamp > 0 {
            println!(
                "  promoted:     {} scopes, {} timestamps",
                statistics.generic_enter_scope, statistics.generic_time_stamp
            );
        }
    }

    Ok(())
}
