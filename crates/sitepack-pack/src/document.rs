//! Loading JSON documents and turning schema violations into messages.

use std::fs;
use std::path::Path;

use serde_json::Value;
use sitepack_core::{Detail, Message, SchemaName};
use sitepack_schema::SchemaGate;

use crate::error::DocumentError;

/// Read and parse a whole JSON file.
pub(crate) fn read_json(path: &Path) -> Result<Value, DocumentError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// One `code` error message per schema violation, each carrying the
/// violation's schema path. `context` entries are attached to every
/// message.
pub(crate) fn schema_messages<G: SchemaGate + ?Sized>(
    gate: &G,
    schema: SchemaName,
    document: &Value,
    code: &str,
    context: &[(&str, &str)],
) -> Vec<Message> {
    gate.violations(schema, document)
        .into_iter()
        .map(|v| {
            let mut message = Message::error(code, v.rendered());
            for (key, value) in context {
                message = message.with(key, *value);
            }
            message.with("schemaPath", v.schema_path)
        })
        .collect()
}

/// One `code` error detail per schema violation.
pub(crate) fn schema_details<G: SchemaGate + ?Sized>(
    gate: &G,
    schema: SchemaName,
    document: &Value,
    code: &str,
) -> Vec<Detail> {
    gate.violations(schema, document)
        .into_iter()
        .map(|v| Detail::error(code, v.rendered()))
        .collect()
}

/// Outcome of loading a top-level document such as the manifest.
pub(crate) struct Loaded {
    pub value: Option<Value>,
    pub messages: Vec<Message>,
}

/// Load `path` and validate it against `schema`. Codes are
/// `<prefix>_MISSING`, `<prefix>_PARSE_ERROR` and `<prefix>_SCHEMA_ERROR`.
/// A schema-invalid document is still returned.
pub(crate) fn load_validated<G: SchemaGate + ?Sized>(
    gate: &G,
    path: &Path,
    schema: SchemaName,
    prefix: &str,
    label: &str,
    file_name: &str,
) -> Loaded {
    let shown = path.display().to_string();
    if !path.exists() {
        return Loaded {
            value: None,
            messages: vec![
                Message::error(format!("{prefix}_MISSING"), format!("{file_name} not found"))
                    .with("path", shown),
            ],
        };
    }
    match read_json(path) {
        Err(e) => Loaded {
            value: None,
            messages: vec![Message::error(
                format!("{prefix}_PARSE_ERROR"),
                format!("Failed to read {label}: {e}"),
            )
            .with("path", shown)],
        },
        Ok(value) => {
            let messages = schema_messages(
                gate,
                schema,
                &value,
                &format!("{prefix}_SCHEMA_ERROR"),
                &[("path", shown.as_str())],
            );
            Loaded {
                value: Some(value),
                messages,
            }
        }
    }
}
