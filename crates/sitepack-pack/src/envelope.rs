//! Encrypted envelope header validation.
//!
//! Only the `*.enc.json` header is inspected. The encrypted payload is
//! never opened; with `check_payload_file` set, its existence is checked.

use std::path::Path;

use sitepack_core::model::non_blank;
use sitepack_core::{
    safe_path, EnvelopeHeader, Message, Report, ReportBuilder, SchemaName, TargetKind, ToolInfo,
};
use sitepack_schema::SchemaGate;

use crate::document::{load_validated, Loaded};
use crate::error::PackResult;
use crate::persist::{parent_dir, write_report};

#[derive(Debug, Clone, Default)]
pub struct EnvelopeOptions {
    /// Require `payload.file` to exist next to the header.
    pub check_payload_file: bool,
    pub tool: ToolInfo,
}

pub struct EnvelopeValidator<'a, G: SchemaGate + ?Sized> {
    gate: &'a G,
    options: EnvelopeOptions,
}

impl<'a, G: SchemaGate + ?Sized> EnvelopeValidator<'a, G> {
    pub fn new(gate: &'a G, options: EnvelopeOptions) -> Self {
        Self { gate, options }
    }

    /// Validate the header at `header_path` and persist the report under
    /// the header's directory.
    pub fn validate(&self, header_path: &Path) -> PackResult<Report> {
        let base_dir = parent_dir(header_path);
        let shown = header_path.display().to_string();
        let mut report =
            ReportBuilder::new(self.options.tool.clone(), TargetKind::Envelope, shown.as_str());
        tracing::info!(path = %shown, "validating envelope");

        let Loaded { value, messages } = load_validated(
            self.gate,
            header_path,
            SchemaName::Envelope,
            "ENVELOPE",
            "envelope",
            "Envelope header file",
        );
        report.extend_messages(messages);

        if let (Some(value), true) = (value, self.options.check_payload_file) {
            let header = EnvelopeHeader::from_value(&value);
            report.extend_messages(check_payload(&base_dir, &shown, &header));
        }

        let report = report.finish();
        write_report(&report, &base_dir)?;
        Ok(report)
    }
}

fn check_payload(base_dir: &Path, header_shown: &str, header: &EnvelopeHeader) -> Option<Message> {
    let Some(payload) = non_blank(header.payload_file.as_deref()) else {
        return Some(
            Message::error(
                "ENVELOPE_PAYLOAD_FILE_MISSING",
                "payload.file is missing or not a string",
            )
            .with("path", header_shown),
        );
    };
    match safe_path::resolve(base_dir, payload) {
        Err(e) => Some(Message::error(e.code(), e.to_string()).with("payloadFile", payload)),
        Ok(p) if !p.exists() => Some(
            Message::error("ENVELOPE_PAYLOAD_FILE_NOT_FOUND", "payload.file not found")
                .with("payloadFile", payload),
        ),
        Ok(_) => None,
    }
}
