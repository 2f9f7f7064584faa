//! Report rendering and exit-code mapping shared by the validation
//! subcommands. Reports go to stdout; logs go to stderr.

use std::fmt::Write as _;

use anyhow::Result;
use clap::ValueEnum;
use sitepack_core::Report;

use crate::GlobalArgs;

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// 0 when the report passes, 1 otherwise.
pub fn exit_code(report: &Report, strict: bool) -> u8 {
    if report.passed(strict) {
        0
    } else {
        1
    }
}

/// Human-readable rendering. With `quiet`, only the three summary lines.
pub fn render_text(report: &Report, quiet: bool) -> String {
    let s = &report.summary;
    let mut out = String::new();
    let _ = writeln!(out, "Errors: {}, warnings: {}", s.errors, s.warnings);
    let _ = writeln!(
        out,
        "Artifacts: total {}, validated {}, skipped {}",
        s.artifacts_total, s.artifacts_validated, s.artifacts_skipped
    );
    let _ = writeln!(out, "NDJSON lines validated: {}", s.ndjson_lines_validated);
    if quiet {
        return out;
    }

    if !report.messages.is_empty() {
        out.push_str("\nMessages:\n");
        for m in &report.messages {
            let _ = writeln!(out, "- [{}] {}: {}", m.level, m.code, m.message);
        }
    }

    if !report.artifacts.is_empty() {
        out.push_str("\nArtifacts:\n");
        for a in &report.artifacts {
            let mut title = format!("- {} ({})", a.id.as_deref().unwrap_or(""), a.status);
            if let Some(media_type) = a.media_type.as_deref().filter(|m| !m.is_empty()) {
                title.push(' ');
                title.push_str(media_type);
            }
            let _ = writeln!(out, "{title}");
            for d in &a.details {
                let line = d.line.map(|n| format!(" (line {n})")).unwrap_or_default();
                let _ = writeln!(out, "  - [{}] {}: {}{line}", d.level, d.code, d.message);
            }
        }
    }
    out
}

/// Print `report` in the requested format and return the exit code.
pub fn emit(report: &Report, global: &GlobalArgs) -> Result<u8> {
    match global.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => print!("{}", render_text(report, global.quiet)),
    }
    Ok(exit_code(report, global.strict))
}
