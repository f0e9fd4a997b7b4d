//! Query results and result dumping.

use crate::store::EventIterator;
use serde_json::json;

/// Text formats a query result can be dumped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryDumpFormat {
    Csv,
    Json,
}

/// The outcome of [`crate::zone::Zone::query`]: the matching events plus
/// metadata about the query execution itself.
pub struct QueryResult<'a> {
    expression: String,
    compiled_expression: String,
    duration_ms: f64,
    value: EventIterator<'a>,
}

impl<'a> QueryResult<'a> {
    pub fn new(
        expression: String,
        compiled_expression: String,
        duration_ms: f64,
        value: EventIterator<'a>,
    ) -> Self {
        Self {
            expression,
            compiled_expression,
            duration_ms,
            value,
        }
    }

    /// The original expression string the query ran.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Description of the compiled predicates, for debugging output.
    pub fn compiled_expression(&self) -> &str {
        &self.compiled_expression
    }

    /// Wall-clock time the parse+apply took, in milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    /// Number of matching events.
    pub fn count(&self) -> usize {
        self.value.count()
    }

    /// The matching events as an index-backed iterator.
    pub fn value(&mut self) -> &mut EventIterator<'a> {
        &mut self.value
    }

    pub fn into_value(self) -> EventIterator<'a> {
        self.value
    }

    /// Render the result rows in the requested format.
    pub fn dump(&mut self, format: QueryDumpFormat) -> String {
        match format {
            QueryDumpFormat::Csv => self.dump_csv(),
            QueryDumpFormat::Json => self.dump_json(),
        }
    }

    /// One row per match, comma separated, CRLF line endings. Instances
    /// leave the duration columns blank.
    fn dump_csv(&mut self) -> String {
        let it = &mut self.value;
        let mut csv = vec![r#"Time,Value,"Total Time","Own Time",Depth,Arguments"#.to_string()];
        it.seek(0);
        while !it.done() {
            let total = if it.is_scope() {
                it.total_duration().to_string()
            } else {
                String::new()
            };
            let own = if it.is_scope() {
                it.own_duration().to_string()
            } else {
                String::new()
            };
            csv.push(format!(
                "{},{},{},{},{},{}",
                it.time(),
                it.name(),
                total,
                own,
                it.depth(),
                it.argument_string(true)
            ));
            it.next();
        }
        it.seek(0);
        csv.join("\r\n")
    }

    /// The same rows as objects in a JSON array.
    fn dump_json(&mut self) -> String {
        let it = &mut self.value;
        let mut rows = Vec::new();
        it.seek(0);
        while !it.done() {
            let arguments = it
                .arguments()
                .map(|args| serde_json::Value::Object((*args).clone()));
            let mut row = json!({
                "time": it.time(),
                "name": it.name(),
                "depth": it.depth(),
                "arguments": arguments,
            });
            if it.is_scope() {
                row["totalTime"] = json!(it.total_duration());
                row["ownTime"] = json!(it.own_duration());
            }
            rows.push(row);
            it.next();
        }
        it.seek(0);
        serde_json::Value::Array(rows).to_string()
    }
}
