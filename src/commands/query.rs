//! Query command implementation.
//!
//! Runs a filter expression against one zone and prints or writes the
//! result dump.

use crate::ingest::load_file;
use crate::output::write_text;
use crate::query::QueryDumpFormat;
use crate::zone::Zone;
use anyhow::{bail, Context, Result};
use log::debug;
use std::path::PathBuf;

/// Arguments for the query command
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// Path to the trace document
    pub input: PathBuf,

    /// Filter expression
    pub expression: String,

    /// Zone to query; the first zone when not given
    pub zone: Option<String>,

    /// Dump format
    pub format: QueryDumpFormat,

    /// Write the dump here instead of stdout
    pub output: Option<PathBuf>,
}

/// Execute the query command
pub fn execute_query(args: QueryArgs) -> Result<()> {
    let db = load_file(&args.input)
        .with_context(|| format!("Failed to load trace document {}", args.input.display()))?;

    let zone = select_zone(db.zones(), args.zone.as_deref())?;
    let mut result = zone
        .query(&args.expression)
        .with_context(|| format!("Invalid query expression '{}'", args.expression))?;

    debug!("Compiled query: {}", result.compiled_expression());

    let dump = result.dump(args.format);
    match &args.output {
        Some(path) => {
            write_text(&dump, path)?;
            println!("Dump written to {}", path.display());
        }
        None => println!("{}", dump),
    }
    println!(
        "{} matches in {:.3}ms",
        result.count(),
        result.duration_ms()
    );

    Ok(())
}

/// Pick the queried zone by name, or default to the first
///
/// **Private** - internal helper
fn select_zone<'a>(zones: &'a [Zone], name: Option<&str>) -> Result<&'a Zone> {
    match name {
        Some(name) => match zones.iter().find(|zone| zone.name() == name) {
            Some(zone) => Ok(zone),
            None => bail!("No zone named '{}'", name),
        },
        None => match zones.first() {
            Some(zone) => Ok(zone),
            None => bail!("Trace document contains no zones"),
        },
    }
}
