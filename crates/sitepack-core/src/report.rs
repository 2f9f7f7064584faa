//! # Validation Report
//!
//! The report model persisted as `reports/validate.json`, plus
//! [`ReportBuilder`], the accumulator owned by a top-level validator.
//!
//! Lower-level validators never touch a builder. They return `Detail`
//! and `Message` values and the orchestrator folds them in, which is also
//! where the summary counters are maintained: every detail or message
//! pushed through the builder is counted exactly once.
//!
//! A report is open while its builder exists and closed by
//! [`ReportBuilder::finish`], which stamps `finishedAt`.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ArtifactDescriptor;

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding attached to one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    pub level: Level,
    pub code: String,
    pub message: String,
    /// 1-based line number for findings inside an NDJSON stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
}

impl Detail {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            code: code.into(),
            message: message.into(),
            line: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            ..Self::error(code, message)
        }
    }

    pub fn at_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }
}

/// A finding about the target as a whole, with free-form context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: Level,
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl Message {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            ..Self::error(code, message)
        }
    }

    /// Attach a context entry.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Artifact results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Ok,
    Warning,
    Error,
    Skipped,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one catalog artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResult {
    pub id: Option<String>,
    pub media_type: Option<String>,
    pub path: Option<String>,
    pub size_expected: Option<u64>,
    pub size_actual: Option<u64>,
    pub digest_expected: Option<String>,
    pub digest_actual: Option<String>,
    pub status: ArtifactStatus,
    pub details: Vec<Detail>,
}

impl ArtifactResult {
    /// A result for an artifact about to be checked.
    pub fn pending(descriptor: &ArtifactDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            media_type: descriptor.media_type.clone(),
            path: descriptor.path.clone(),
            size_expected: descriptor.size,
            size_actual: None,
            digest_expected: descriptor.digest.clone(),
            digest_actual: None,
            status: ArtifactStatus::Ok,
            details: Vec::new(),
        }
    }

    /// A result for an artifact excluded by the active profile.
    pub fn skipped(descriptor: &ArtifactDescriptor) -> Self {
        Self {
            status: ArtifactStatus::Skipped,
            ..Self::pending(descriptor)
        }
    }

    pub fn push(&mut self, detail: Detail) {
        self.details.push(detail);
    }

    /// Derive `status` from the accumulated details. Skipped stays skipped.
    pub fn finalize(&mut self) {
        if self.status == ArtifactStatus::Skipped {
            return;
        }
        self.status = if self.details.iter().any(|d| d.level == Level::Error) {
            ArtifactStatus::Error
        } else if self.details.iter().any(|d| d.level == Level::Warning) {
            ArtifactStatus::Warning
        } else {
            ArtifactStatus::Ok
        };
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Tool identity recorded in every report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            name: "sitepack".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    Package,
    Envelope,
    VolumeSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub errors: u64,
    pub warnings: u64,
    pub artifacts_total: u64,
    pub artifacts_validated: u64,
    pub artifacts_skipped: u64,
    pub ndjson_lines_validated: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub tool: ToolInfo,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub target: Target,
    pub summary: Summary,
    pub artifacts: Vec<ArtifactResult>,
    pub messages: Vec<Message>,
}

impl Report {
    /// True when the run produced no errors and, under `strict`, no
    /// warnings either.
    pub fn passed(&self, strict: bool) -> bool {
        self.summary.errors == 0 && (!strict || self.summary.warnings == 0)
    }

    /// Messages with the given code, in report order.
    pub fn messages_with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Message> {
        self.messages.iter().filter(move |m| m.code == code)
    }
}

/// Accumulates findings for one validation run.
#[derive(Debug)]
pub struct ReportBuilder {
    report: Report,
}

impl ReportBuilder {
    pub fn new(tool: ToolInfo, kind: TargetKind, path: impl Into<String>) -> Self {
        Self {
            report: Report {
                tool,
                started_at: now_rfc3339(),
                finished_at: None,
                target: Target {
                    kind,
                    path: path.into(),
                },
                summary: Summary::default(),
                artifacts: Vec::new(),
                messages: Vec::new(),
            },
        }
    }

    fn count(&mut self, level: Level) {
        match level {
            Level::Error => self.report.summary.errors += 1,
            Level::Warning => self.report.summary.warnings += 1,
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.count(message.level);
        self.report.messages.push(message);
    }

    pub fn extend_messages(&mut self, messages: impl IntoIterator<Item = Message>) {
        for message in messages {
            self.push_message(message);
        }
    }

    /// Fold in a finished artifact. Skipped artifacts count toward
    /// `artifactsSkipped`, all others toward `artifactsValidated`.
    pub fn push_artifact(&mut self, mut artifact: ArtifactResult) {
        artifact.finalize();
        if artifact.status == ArtifactStatus::Skipped {
            self.report.summary.artifacts_skipped += 1;
        } else {
            self.report.summary.artifacts_validated += 1;
        }
        for detail in &artifact.details {
            self.count(detail.level);
        }
        self.report.artifacts.push(artifact);
    }

    pub fn set_artifacts_total(&mut self, total: u64) {
        self.report.summary.artifacts_total = total;
    }

    pub fn add_ndjson_lines(&mut self, lines: u64) {
        self.report.summary.ndjson_lines_validated += lines;
    }

    /// Point the report at a different target, e.g. a volume set whose
    /// package was validated from a scratch directory.
    pub fn retarget(&mut self, kind: TargetKind, path: impl Into<String>) {
        self.report.target = Target {
            kind,
            path: path.into(),
        };
    }

    pub fn started_at(&self) -> &str {
        &self.report.started_at
    }

    /// Carry over the start time of an enclosing run.
    pub fn set_started_at(&mut self, started_at: impl Into<String>) {
        self.report.started_at = started_at.into();
    }

    pub fn error_count(&self) -> u64 {
        self.report.summary.errors
    }

    pub fn warning_count(&self) -> u64 {
        self.report.summary.warnings
    }

    pub fn messages(&self) -> &[Message] {
        &self.report.messages
    }

    /// Discard the report and keep only its messages.
    pub fn into_messages(self) -> Vec<Message> {
        self.report.messages
    }

    /// Close the report.
    pub fn finish(mut self) -> Report {
        self.report.finished_at = Some(now_rfc3339());
        self.report
    }
}
