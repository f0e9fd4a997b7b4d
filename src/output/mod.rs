//! Output writers for flamegraphs and query dumps.
//!
//! This module handles writing generated content to disk:
//! - SVG flamegraphs
//! - Query result dumps (CSV or JSON text)

use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write SVG content to a file
///
/// # Arguments
/// * `svg_content` - SVG string from the flamegraph generator
/// * `output_path` - Path to output SVG file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::InvalidPath` - Path is invalid
pub fn write_svg(svg_content: &str, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    if let Some(ext) = output_path.extension() {
        if ext != "svg" {
            debug!(
                "Warning: File does not have .svg extension: {}",
                output_path.display()
            );
        }
    }
    write_file(svg_content, output_path)
}

/// Write dump text (CSV or JSON) to a file
pub fn write_text(content: &str, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    write_file(content, output_path.as_ref())
}

/// Shared write path: validate, create parent directories, buffered write
///
/// **Private** - internal helper
fn write_file(content: &str, output_path: &Path) -> Result<(), OutputError> {
    info!("Writing output to: {}", output_path.display());

    validate_output_path(output_path)?;

    if let Some(parent) = output_path.parent() {
        if !parent.exists() && !parent.as_os_str().is_empty() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(content.as_bytes())
        .map_err(OutputError::WriteFailed)?;
    writer.flush().map_err(OutputError::WriteFailed)?;

    info!(
        "Output written successfully ({} bytes, {:.2} KB)",
        content.len(),
        content.len() as f64 / 1024.0
    );

    Ok(())
}

/// Validate that the output path is writable
///
/// **Private** - internal validation
fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.exists() && path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}
