//! Dump command implementation.
//!
//! Prints every visible event of every zone, indented by scope depth.

use crate::ingest::load_file;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Arguments for the dump command
#[derive(Debug, Clone)]
pub struct DumpArgs {
    /// Path to the trace document
    pub input: PathBuf,
}

/// Execute the dump command
pub fn execute_dump(args: DumpArgs) -> Result<()> {
    let db = load_file(&args.input)
        .with_context(|| format!("Failed to load trace document {}", args.input.display()))?;
    let units = db.units();

    for zone in db.zones() {
        println!("[{}]", zone.info_string().replace('\n', " "));
        let mut it = zone.store().begin();
        while !it.done() {
            if !it.is_hidden() {
                let indent = "  ".repeat(it.depth() as usize);
                println!(
                    "{}{}  {}",
                    indent,
                    units.format(it.time(), false),
                    it.long_string(true)
                );
            }
            it.next();
        }
    }

    Ok(())
}
