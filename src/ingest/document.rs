//! Serde model of the trace document format.
//!
//! A document declares the measurement units, the zones it contains and the
//! event types each zone uses, then lists events as compact rows:
//! `[time_ms, "event.name", arg0, arg1, ...]` with arguments in schema
//! order.

use serde::Deserialize;
use serde_json::Value;

/// Top-level trace document.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceDocument {
    /// Measurement units of the source ("microseconds", "bytes", "count").
    /// Missing means time.
    #[serde(default)]
    pub units: Option<String>,

    /// Zones with their type declarations and event rows.
    #[serde(default)]
    pub zones: Vec<ZoneDocument>,
}

/// One zone's declarations and events.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDocument {
    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "type")]
    pub zone_type: String,

    #[serde(default)]
    pub location: String,

    /// Scope type signatures, e.g. `"my.class#method(uint32 count)"`.
    #[serde(default)]
    pub scope_event_types: Vec<String>,

    /// Instance type signatures.
    #[serde(default)]
    pub instance_event_types: Vec<String>,

    /// Event rows. Kept as raw values so one malformed row cannot fail the
    /// whole document.
    #[serde(default)]
    pub events: Vec<Value>,
}
