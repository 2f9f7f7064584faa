//! # Volume Set Validation
//!
//! Validates a package distributed as numbered zip volumes described by
//! `sitepack.volumes.json`.
//!
//! Volume-level checks run first. Any error there ends the run with a
//! partial report and nothing is extracted. Otherwise the volumes are
//! extracted into a private scratch directory in ascending `index` order
//! and the reconstructed package goes through [`PackageValidator`]. The
//! volume messages are merged into that report, which is then retargeted
//! at the descriptor.
//!
//! The scratch directory is a [`tempfile::TempDir`] and is removed on
//! every exit path.

use std::fs;
use std::path::{Path, PathBuf};

use sitepack_core::model::non_blank;
use sitepack_core::{
    safe_path, Message, Report, ReportBuilder, SchemaName, TargetKind, VolumeEntry,
    VolumeSetDescriptor,
};
use sitepack_crypto::digest_file_hex;
use sitepack_schema::SchemaGate;

use crate::archive::{extract_archive, UnsafeEntryPolicy};
use crate::document::{load_validated, Loaded};
use crate::error::PackResult;
use crate::package::{PackageValidator, ValidateOptions};
use crate::persist::{parent_dir, write_report};

pub const VOLUMES_FILE: &str = "sitepack.volumes.json";

/// A volume that passed the volume-level checks.
struct StagedVolume {
    sort_key: i64,
    file: String,
    path: PathBuf,
}

/// Validates a volume set descriptor and the package it reconstructs.
pub struct VolumeSetValidator<'a, G: SchemaGate + ?Sized> {
    gate: &'a G,
    options: ValidateOptions,
}

impl<'a, G: SchemaGate + ?Sized> VolumeSetValidator<'a, G> {
    pub fn new(gate: &'a G, options: ValidateOptions) -> Self {
        Self { gate, options }
    }

    /// Validate the set described by `descriptor_path` and persist the
    /// report next to it under `reports/validate.json`.
    pub fn validate(&self, descriptor_path: &Path) -> PackResult<Report> {
        let base_dir = parent_dir(descriptor_path);
        let report = ReportBuilder::new(
            self.options.tool.clone(),
            TargetKind::VolumeSet,
            descriptor_path.display().to_string(),
        );
        let report = self.run(report, descriptor_path, &base_dir).finish();
        write_report(&report, &base_dir)?;
        Ok(report)
    }

    fn run(
        &self,
        mut report: ReportBuilder,
        descriptor_path: &Path,
        base_dir: &Path,
    ) -> ReportBuilder {
        let shown = descriptor_path.display().to_string();
        tracing::info!(path = %shown, "validating volume set");

        let Loaded { value, messages } = load_validated(
            self.gate,
            descriptor_path,
            SchemaName::VolumeSet,
            "VOLUME_SET",
            "volume set",
            "Volume set descriptor",
        );
        report.extend_messages(messages);
        let Some(value) = value else {
            return report;
        };

        let descriptor = VolumeSetDescriptor::from_value(&value);
        let mut staged = Vec::new();
        for entry in &descriptor.volumes {
            let (volume, messages) = check_volume(base_dir, entry.as_ref());
            report.extend_messages(messages);
            staged.extend(volume);
        }
        if report.error_count() > 0 {
            tracing::info!(errors = report.error_count(), "volume checks failed, not extracting");
            return report;
        }

        let scratch = match tempfile::Builder::new().prefix("sitepack-volumes-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                report.push_message(Message::error(
                    "VOLUME_TEMP_DIR_ERROR",
                    format!("Failed to create scratch directory: {e}"),
                ));
                return report;
            }
        };

        // Stable sort: equal indices keep descriptor order.
        staged.sort_by_key(|v| v.sort_key);
        let mut extraction = Vec::new();
        let mut extract_failed = false;
        for volume in &staged {
            tracing::debug!(file = %volume.file, index = volume.sort_key, "extracting volume");
            match extract_archive(&volume.path, scratch.path(), UnsafeEntryPolicy::Skip) {
                Ok(outcome) => {
                    extraction.extend(outcome.skipped_entries.into_iter().map(|entry| {
                        Message::error(
                            "VOLUME_ENTRY_PATH_UNSAFE",
                            format!("Unsafe entry path: {entry}"),
                        )
                        .with("entryPath", entry.as_str())
                        .with("volume", volume.file.as_str())
                    }));
                }
                Err(e) => {
                    extract_failed = true;
                    extraction.push(
                        Message::error(
                            "VOLUME_EXTRACT_ERROR",
                            format!("Failed to extract volume: {e}"),
                        )
                        .with("file", volume.file.as_str()),
                    );
                }
            }
        }

        let report = if extract_failed {
            report.extend_messages(extraction);
            report
        } else {
            let mut package =
                PackageValidator::new(self.gate, self.options.clone()).run(scratch.path());
            package.set_started_at(report.started_at());
            package.extend_messages(report.into_messages());
            package.extend_messages(extraction);
            package.retarget(TargetKind::VolumeSet, shown);
            package
        };

        if let Err(e) = scratch.close() {
            tracing::warn!(error = %e, "failed to remove scratch directory");
        }
        report
    }
}

/// Volume-level checks for one descriptor entry. Returns the volume when
/// it can be extracted.
fn check_volume(
    base_dir: &Path,
    entry: Option<&VolumeEntry>,
) -> (Option<StagedVolume>, Vec<Message>) {
    let Some(entry) = entry else {
        return (
            None,
            vec![Message::error("VOLUME_ENTRY_INVALID", "Volume entry must be an object")],
        );
    };
    let Some(file) = non_blank(entry.file.as_deref()) else {
        return (
            None,
            vec![Message::error(
                "VOLUME_FILE_INVALID",
                "Volume file name is missing or invalid",
            )],
        );
    };
    let path = match safe_path::resolve(base_dir, file) {
        Ok(p) => p,
        Err(e) => return (None, vec![Message::error(e.code(), e.to_string()).with("file", file)]),
    };
    let meta = match fs::metadata(&path) {
        Ok(m) => m,
        Err(_) => {
            return (
                None,
                vec![Message::error(
                    "VOLUME_FILE_MISSING",
                    format!("Volume file not found: {file}"),
                )
                .with("file", file)],
            )
        }
    };
    if !meta.is_file() {
        return (
            None,
            vec![Message::error(
                "VOLUME_FILE_NOT_REGULAR",
                format!("Volume is not a regular file: {file}"),
            )
            .with("file", file)],
        );
    }

    let mut messages = Vec::new();
    if let Some(expected) = entry.size {
        if meta.len() != expected {
            messages.push(
                Message::error(
                    "VOLUME_SIZE_MISMATCH",
                    format!("Volume size mismatch: {} != {expected}", meta.len()),
                )
                .with("file", file),
            );
        }
    }
    if let Some(expected) = entry.sha256.as_deref() {
        match digest_file_hex(&path) {
            Ok(actual) if !actual.eq_ignore_ascii_case(expected) => messages.push(
                Message::error(
                    "VOLUME_DIGEST_MISMATCH",
                    format!("Volume digest mismatch: {actual} != {expected}"),
                )
                .with("file", file),
            ),
            Ok(_) => {}
            Err(e) => messages.push(
                Message::error("VOLUME_DIGEST_ERROR", format!("Volume digest error: {e}"))
                    .with("file", file),
            ),
        }
    }

    if let Some(encryption) = entry.encryption.as_ref().filter(|e| e.is_age()) {
        match non_blank(encryption.envelope_file.as_deref()) {
            None => messages.push(
                Message::error(
                    "VOLUME_ENVELOPE_MISSING",
                    "encryption.envelopeFile is required for age volumes",
                )
                .with("file", file),
            ),
            Some(envelope) => match safe_path::resolve(base_dir, envelope) {
                Err(e) => messages
                    .push(Message::error(e.code(), e.to_string()).with("envelopeFile", envelope)),
                Ok(p) if !p.exists() => messages.push(
                    Message::error("VOLUME_ENVELOPE_NOT_FOUND", "Envelope file not found")
                        .with("envelopeFile", envelope),
                ),
                Ok(_) => {}
            },
        }
        messages.push(
            Message::error(
                "VOLUME_ENCRYPTION_UNSUPPORTED",
                "Encrypted volumes are not supported by this validator",
            )
            .with("file", file),
        );
    }

    let staged = StagedVolume {
        sort_key: entry.sort_key(),
        file: file.to_string(),
        path,
    };
    (Some(staged), messages)
}
