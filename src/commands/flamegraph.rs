//! Flamegraph command implementation.
//!
//! The flamegraph command:
//! 1. Loads the trace document
//! 2. Folds every zone's scope tree into collapsed stacks
//! 3. Renders the SVG
//! 4. Writes it to disk

use crate::flamegraph::{build_collapsed_stacks, generate_flamegraph, FlamegraphConfig};
use crate::ingest::load_file;
use crate::output::write_svg;
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

/// Arguments for the flamegraph command
#[derive(Debug, Clone)]
pub struct FlamegraphArgs {
    /// Path to the trace document
    pub input: PathBuf,

    /// Output path for the SVG
    pub output: PathBuf,

    /// Flamegraph title; the input file name when not given
    pub title: Option<String>,

    /// Flamegraph width in pixels
    pub width: usize,
}

/// Execute the flamegraph command
pub fn execute_flamegraph(args: FlamegraphArgs) -> Result<()> {
    let db = load_file(&args.input)
        .with_context(|| format!("Failed to load trace document {}", args.input.display()))?;

    let stacks = build_collapsed_stacks(&db);
    info!("Folded {} unique stacks", stacks.len());

    let title = args.title.clone().unwrap_or_else(|| {
        args.input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trace".to_string())
    });
    let mut config = FlamegraphConfig::new().with_title(title);
    config.width = args.width;

    let svg =
        generate_flamegraph(&stacks, Some(&config)).context("Failed to generate flamegraph")?;
    write_svg(&svg, &args.output)?;

    println!("Flamegraph written to {}", args.output.display());

    Ok(())
}
