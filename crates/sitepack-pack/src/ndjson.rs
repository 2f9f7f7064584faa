//! # Record Stream Validation
//!
//! Validates a newline-delimited JSON file one line at a time.
//!
//! Per 1-based line:
//!
//! - blank (whitespace only): optional `NDJSON_EMPTY_LINE` warning, not
//!   counted
//! - unparseable: `NDJSON_PARSE_ERROR`, not counted
//! - parsed: counted, handed to the record hook, then checked against
//!   the schema with one `NDJSON_SCHEMA_ERROR` per violation
//!
//! Lines are processed strictly in file order because the hook may
//! perform blocking I/O whose findings must stay attached to their line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;
use sitepack_core::{Detail, SchemaName};
use sitepack_schema::SchemaGate;

/// Findings and line count for one stream.
#[derive(Debug, Default)]
pub struct RecordStreamOutcome {
    pub details: Vec<Detail>,
    /// Lines that parsed as JSON.
    pub lines_validated: u64,
}

/// Validates NDJSON streams against one record schema.
pub struct RecordStreamValidator<'a, G: SchemaGate + ?Sized> {
    gate: &'a G,
    schema: SchemaName,
    warn_on_blank_line: bool,
}

impl<'a, G: SchemaGate + ?Sized> RecordStreamValidator<'a, G> {
    pub fn new(gate: &'a G, schema: SchemaName) -> Self {
        Self {
            gate,
            schema,
            warn_on_blank_line: true,
        }
    }

    pub fn warn_on_blank_line(mut self, warn: bool) -> Self {
        self.warn_on_blank_line = warn;
        self
    }

    /// Validate the stream at `path`. `on_record` receives every parsed
    /// record with its line number; details it returns without a line are
    /// attached to the current one.
    pub fn validate<F>(&self, path: &Path, mut on_record: F) -> RecordStreamOutcome
    where
        F: FnMut(&Value, u64) -> Vec<Detail>,
    {
        let mut outcome = RecordStreamOutcome::default();

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                outcome.details.push(Detail::error(
                    "NDJSON_READ_ERROR",
                    format!("Failed to read NDJSON stream: {e}"),
                ));
                return outcome;
            }
        };

        for (idx, raw) in BufReader::new(file).split(b'\n').enumerate() {
            let line_no = idx as u64 + 1;
            let mut bytes = match raw {
                Ok(b) => b,
                Err(e) => {
                    outcome.details.push(
                        Detail::error(
                            "NDJSON_READ_ERROR",
                            format!("Failed to read NDJSON stream: {e}"),
                        )
                        .at_line(line_no),
                    );
                    break;
                }
            };
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }

            let line = match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(e) => {
                    outcome.details.push(parse_error(line_no, &e));
                    continue;
                }
            };

            if line.trim().is_empty() {
                if self.warn_on_blank_line {
                    outcome.details.push(
                        Detail::warning("NDJSON_EMPTY_LINE", "Empty NDJSON line skipped")
                            .at_line(line_no),
                    );
                }
                continue;
            }

            let record: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    outcome.details.push(parse_error(line_no, &e));
                    continue;
                }
            };
            outcome.lines_validated += 1;

            for mut extra in on_record(&record, line_no) {
                extra.line.get_or_insert(line_no);
                outcome.details.push(extra);
            }

            for violation in self.gate.violations(self.schema, &record) {
                outcome.details.push(
                    Detail::error(
                        "NDJSON_SCHEMA_ERROR",
                        format!("Schema violation on line {line_no}: {}", violation.rendered()),
                    )
                    .at_line(line_no),
                );
            }
        }

        outcome
    }
}

fn parse_error(line_no: u64, err: &dyn std::fmt::Display) -> Detail {
    Detail::error(
        "NDJSON_PARSE_ERROR",
        format!("Invalid JSON on line {line_no}: {err}"),
    )
    .at_line(line_no)
}
