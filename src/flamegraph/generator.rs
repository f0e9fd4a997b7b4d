//! SVG flamegraph generation using the inferno library.

use crate::flamegraph::stacks::CollapsedStack;
use crate::utils::error::FlamegraphError;
use chrono::Utc;
use inferno::flamegraph::{self, Options};
use log::info;

/// Flamegraph configuration
#[derive(Debug, Clone)]
pub struct FlamegraphConfig {
    pub title: String,
    /// Label for the weight unit shown in frame tooltips.
    pub count_name: String,
    pub width: usize,
}

impl Default for FlamegraphConfig {
    fn default() -> Self {
        Self {
            title: "Trace Profile".to_string(),
            count_name: "us".to_string(),
            width: 1200,
        }
    }
}

impl FlamegraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_count_name(mut self, count_name: impl Into<String>) -> Self {
        self.count_name = count_name.into();
        self
    }
}

/// Generate SVG flamegraph from collapsed stacks
pub fn generate_flamegraph(
    stacks: &[CollapsedStack],
    config: Option<&FlamegraphConfig>,
) -> Result<String, FlamegraphError> {
    if stacks.is_empty() {
        return Err(FlamegraphError::EmptyStacks);
    }

    let config = config.cloned().unwrap_or_default();
    info!("Generating flamegraph with {} stacks", stacks.len());

    let lines: Vec<String> = stacks
        .iter()
        .map(|stack| format!("{} {}", stack.stack, stack.weight))
        .collect();

    let mut options = Options::default();
    options.title = config.title.clone();
    options.subtitle = Some(format!("generated {}", Utc::now().to_rfc3339()));
    options.count_name = config.count_name.clone();
    options.image_width = Some(config.width);

    let mut svg = Vec::new();
    flamegraph::from_lines(&mut options, lines.iter().map(String::as_str), &mut svg)
        .map_err(|error| FlamegraphError::RenderFailed(error.to_string()))?;
    let svg = String::from_utf8(svg)
        .map_err(|error| FlamegraphError::RenderFailed(error.to_string()))?;

    info!("Flamegraph generated successfully ({} bytes)", svg.len());
    Ok(svg)
}
