//! Measurement units for database values.
//!
//! Trace sources declare what one unit of "time" means for their values.
//! Most traces measure real time, but the same storage and query machinery
//! works over byte counts or plain tallies.

use crate::utils::format;

/// The unit of measure of values in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// Each unit value is 1 millisecond.
    #[default]
    TimeMilliseconds,
    /// Each unit value is 1000 bytes.
    SizeKilobytes,
    /// Each unit value is 1000 counts.
    Count,
}

impl Unit {
    /// Resolve a source-provided unit name.
    ///
    /// Missing or unknown names fall back to time, which is generally
    /// still usable for display.
    pub fn parse(value: Option<&str>) -> Unit {
        match value {
            None | Some("") => Unit::TimeMilliseconds,
            Some("microseconds") => Unit::TimeMilliseconds,
            Some("bytes") => Unit::SizeKilobytes,
            Some("count") => Unit::Count,
            Some(other) => {
                log::warn!("Unknown unit type '{}', assuming time", other);
                Unit::TimeMilliseconds
            }
        }
    }

    /// Format a value as a human-readable string. `small` prefers a more
    /// compact rendering where the unit supports one.
    pub fn format(self, value: f64, small: bool) -> String {
        match self {
            Unit::TimeMilliseconds => {
                if small {
                    format::format_small_time(value)
                } else {
                    format::format_time(value)
                }
            }
            Unit::SizeKilobytes => {
                let places = if small { 0 } else { 3 };
                let value = (value * 1000.0).round();
                if value == 0.0 {
                    "0b".to_string()
                } else if value < 1024.0 {
                    format!("{}b", value)
                } else if value < 1024.0 * 1024.0 {
                    format!("{:.*}kb", places, value / 1024.0)
                } else {
                    format!("{:.*}mb", places, value / (1024.0 * 1024.0))
                }
            }
            Unit::Count => {
                let places = if small { 0 } else { 3 };
                let value = (value * 1000.0).round();
                if value == 0.0 {
                    "0".to_string()
                } else if value < 1000.0 {
                    format!("{}", value)
                } else if value < 1000.0 * 1000.0 {
                    format!("{:.*}k", places, value / 1000.0)
                } else {
                    format!("{:.*}m", places, value / (1000.0 * 1000.0))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Unit::parse(None), Unit::TimeMilliseconds);
        assert_eq!(Unit::parse(Some("")), Unit::TimeMilliseconds);
        assert_eq!(Unit::parse(Some("microseconds")), Unit::TimeMilliseconds);
        assert_eq!(Unit::parse(Some("bytes")), Unit::SizeKilobytes);
        assert_eq!(Unit::parse(Some("count")), Unit::Count);
        assert_eq!(Unit::parse(Some("furlongs")), Unit::TimeMilliseconds);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(Unit::TimeMilliseconds.format(1.5, false), "1.500ms");
        assert_eq!(Unit::TimeMilliseconds.format(0.0, true), "0");
    }

    #[test]
    fn test_format_size_boundaries() {
        let unit = Unit::SizeKilobytes;
        assert_eq!(unit.format(0.0, false), "0b");
        assert_eq!(unit.format(0.5, false), "500b");
        assert_eq!(unit.format(1.024, false), "1.000kb");
        assert_eq!(unit.format(1.024, true), "1kb");
        assert_eq!(unit.format(2048.0, false), "1.953mb");
    }

    #[test]
    fn test_format_count_boundaries() {
        let unit = Unit::Count;
        assert_eq!(unit.format(0.0, false), "0");
        assert_eq!(unit.format(0.5, false), "500");
        assert_eq!(unit.format(5.0, false), "5.000k");
        assert_eq!(unit.format(5.0, true), "5k");
        assert_eq!(unit.format(5000.0, false), "5.000m");
    }
}
