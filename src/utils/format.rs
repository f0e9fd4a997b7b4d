//! Human-readable value formatting shared by info strings and dumps.

use serde_json::Value;

/// Format a millisecond duration with full precision, e.g. `12.345ms`.
pub fn format_time(value: f64) -> String {
    format!("{:.3}ms", value)
}

/// Format a millisecond duration in its shortest readable form.
/// Sub-millisecond values render as whole microseconds, second-scale
/// values collapse to seconds.
pub fn format_small_time(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value < 1.0 {
        return format!("{}us", (value * 1000.0).round() as i64);
    }
    if value < 1000.0 {
        if value < 10.0 {
            return format!("{:.1}ms", value);
        }
        return format!("{:.0}ms", value);
    }
    format!("{:.1}s", value / 1000.0)
}

/// Render a JSON value the way it reads in argument lists: strings bare,
/// everything else in JSON notation.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Append `key: value` lines for every argument, indented two spaces per
/// level, onto an output line list.
pub fn add_argument_lines(
    lines: &mut Vec<String>,
    args: &serde_json::Map<String, Value>,
    indent_level: usize,
) {
    let indent = "  ".repeat(indent_level);
    for (key, value) in args {
        lines.push(format!("{}{}: {}", indent, key, format_value(value)));
    }
}
