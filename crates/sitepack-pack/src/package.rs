//! # Package Validation
//!
//! The orchestrator for an unpacked package directory. Owns the
//! [`ReportBuilder`] for the run; every lower-level component returns
//! findings that are folded in here.
//!
//! ## Sequence
//!
//! 1. Load and schema-check `sitepack.manifest.json` and
//!    `sitepack.catalog.json`. A missing or broken document is reported
//!    and then treated as empty, so the run always yields one report.
//! 2. Cross-check manifest and catalog membership.
//! 3. Resolve the requested profile, if any, into a selection.
//! 4. Check every catalog artifact in catalog order: path, file, size,
//!    digest, then media-type dispatch.
//! 5. Run the object graph checks.
//! 6. Close and persist the report.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use sitepack_core::{
    safe_path, ArtifactDescriptor, ArtifactResult, Catalog, Detail, Manifest, MediaKind, Message,
    Profiles, RecordHook, Report, ReportBuilder, SchemaName, TargetKind, ToolInfo,
};
use sitepack_crypto::digest_file;
use sitepack_schema::SchemaGate;

use crate::asset::verify_asset_record;
use crate::document::{load_validated, read_json, schema_details, Loaded};
use crate::error::PackResult;
use crate::ndjson::RecordStreamValidator;
use crate::objects::ObjectGraphValidator;
use crate::persist::write_report;

pub const MANIFEST_FILE: &str = "sitepack.manifest.json";
pub const CATALOG_FILE: &str = "sitepack.catalog.json";

/// Per-run configuration shared by package and volume-set validation.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Restrict artifact checks to this manifest profile.
    pub profile: Option<String>,
    /// Skip whole-artifact digest computation.
    pub skip_digest: bool,
    /// Verify the blobs and chunks referenced by asset-index records.
    pub check_blobs: bool,
    pub tool: ToolInfo,
}

/// Validates one unpacked package directory.
pub struct PackageValidator<'a, G: SchemaGate + ?Sized> {
    gate: &'a G,
    options: ValidateOptions,
}

impl<'a, G: SchemaGate + ?Sized> PackageValidator<'a, G> {
    pub fn new(gate: &'a G, options: ValidateOptions) -> Self {
        Self { gate, options }
    }

    /// Validate `package_root` and persist the report under
    /// `<package_root>/reports/validate.json`.
    pub fn validate(&self, package_root: &Path) -> PackResult<Report> {
        let report = self.run(package_root).finish();
        write_report(&report, package_root)?;
        Ok(report)
    }

    /// Validate `package_root` and return the still-open report without
    /// persisting it.
    pub fn run(&self, package_root: &Path) -> ReportBuilder {
        let mut report = ReportBuilder::new(
            self.options.tool.clone(),
            TargetKind::Package,
            package_root.display().to_string(),
        );
        tracing::info!(
            path = %package_root.display(),
            profile = self.options.profile.as_deref().unwrap_or("-"),
            "validating package"
        );

        let manifest = self.load(&mut report, package_root, SchemaName::Manifest);
        let catalog = self.load(&mut report, package_root, SchemaName::Catalog);
        let manifest = manifest.as_ref().map(Manifest::from_value);
        let catalog = catalog
            .as_ref()
            .map(Catalog::from_value)
            .unwrap_or_default();
        report.set_artifacts_total(catalog.artifacts.len() as u64);

        report.extend_messages(cross_check(manifest.as_ref(), &catalog));

        let selection = match &self.options.profile {
            Some(profile) => {
                let (selected, messages) = select_profile(manifest.as_ref(), &catalog, profile);
                report.extend_messages(messages);
                Some(selected)
            }
            None => None,
        };

        let mut validated_ids = HashSet::new();
        for descriptor in &catalog.artifacts {
            let selected = match &selection {
                Some(ids) => descriptor.id.as_ref().is_some_and(|id| ids.contains(id)),
                None => true,
            };
            if !selected {
                tracing::debug!(artifact = ?descriptor.id, "skipped by profile");
                report.push_artifact(ArtifactResult::skipped(descriptor));
                continue;
            }
            if let Some(id) = &descriptor.id {
                validated_ids.insert(id.clone());
            }
            let (result, lines) = self.check_artifact(package_root, descriptor);
            report.add_ndjson_lines(lines);
            report.push_artifact(result);
        }

        report.extend_messages(ObjectGraphValidator::new(self.gate).validate(
            package_root,
            &catalog,
            &validated_ids,
        ));

        tracing::info!(
            errors = report.error_count(),
            warnings = report.warning_count(),
            "package validated"
        );
        report
    }

    fn load(
        &self,
        report: &mut ReportBuilder,
        package_root: &Path,
        schema: SchemaName,
    ) -> Option<serde_json::Value> {
        let (file, prefix, label) = match schema {
            SchemaName::Manifest => (MANIFEST_FILE, "MANIFEST", "manifest"),
            _ => (CATALOG_FILE, "CATALOG", "catalog"),
        };
        let Loaded { value, messages } = load_validated(
            self.gate,
            &package_root.join(file),
            schema,
            prefix,
            label,
            file,
        );
        report.extend_messages(messages);
        value
    }

    /// Check one selected artifact. Returns the result and the number of
    /// NDJSON lines validated.
    fn check_artifact(
        &self,
        package_root: &Path,
        descriptor: &ArtifactDescriptor,
    ) -> (ArtifactResult, u64) {
        let mut result = ArtifactResult::pending(descriptor);
        tracing::debug!(artifact = ?descriptor.id, path = ?descriptor.path, "checking artifact");

        let resolved = match safe_path::resolve_declared(package_root, descriptor.path.as_deref()) {
            Ok(p) => p,
            Err(e) => {
                result.push(Detail::error(e.code(), e.to_string()));
                return (result, 0);
            }
        };
        let shown = descriptor.path.as_deref().unwrap_or_default();
        let meta = match fs::metadata(&resolved) {
            Ok(m) => m,
            Err(_) => {
                result.push(Detail::error(
                    "FILE_MISSING",
                    format!("Artifact file not found: {shown}"),
                ));
                return (result, 0);
            }
        };
        if !meta.is_file() {
            result.push(Detail::error("FILE_NOT_REGULAR", "Artifact is not a regular file"));
            return (result, 0);
        }

        result.size_actual = Some(meta.len());
        if let Some(expected) = descriptor.size {
            if meta.len() != expected {
                result.push(Detail::error(
                    "SIZE_MISMATCH",
                    format!("File size mismatch: {} != {expected}", meta.len()),
                ));
            }
        }

        if let Some(expected) = descriptor.digest.as_deref() {
            if !self.options.skip_digest {
                match digest_file(&resolved) {
                    Ok(actual) => {
                        let actual = actual.to_string();
                        if actual != expected {
                            result.push(Detail::error(
                                "DIGEST_MISMATCH",
                                format!("Digest mismatch: {actual} != {expected}"),
                            ));
                        }
                        result.digest_actual = Some(actual);
                    }
                    Err(e) => result.push(Detail::error(
                        "DIGEST_ERROR",
                        format!("Digest calculation error: {e}"),
                    )),
                }
            }
        }

        let media_type = descriptor.media_type.as_deref().unwrap_or_default();
        let mut lines = 0;
        match MediaKind::classify(media_type) {
            MediaKind::Ndjson { schema, hook } => {
                let stream = RecordStreamValidator::new(self.gate, schema);
                let check_blobs = hook == RecordHook::AssetBlobs && self.options.check_blobs;
                let outcome = stream.validate(&resolved, |record, _line| {
                    if check_blobs {
                        verify_asset_record(package_root, record)
                    } else {
                        Vec::new()
                    }
                });
                lines = outcome.lines_validated;
                result.details.extend(outcome.details);
            }
            MediaKind::Json { schema } => match read_json(&resolved) {
                Ok(document) => result.details.extend(schema_details(
                    self.gate,
                    schema,
                    &document,
                    "JSON_ARTIFACT_SCHEMA_ERROR",
                )),
                Err(e) => result.push(Detail::error(
                    "JSON_ARTIFACT_PARSE_ERROR",
                    format!("Failed to read JSON artifact: {e}"),
                )),
            },
            MediaKind::Unknown => result.push(Detail::warning(
                "UNKNOWN_MEDIA_TYPE",
                format!("Unknown mediaType: {media_type}"),
            )),
        }

        (result, lines)
    }
}

// ---------------------------------------------------------------------------
// Manifest / catalog membership
// ---------------------------------------------------------------------------

fn cross_check(manifest: Option<&Manifest>, catalog: &Catalog) -> Vec<Message> {
    let catalog_ids: HashSet<&str> = catalog.ids().collect();
    let manifest_ids: HashSet<&str> = manifest
        .map(|m| m.artifacts.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let mut messages = Vec::new();
    for id in manifest.map(|m| m.artifacts.as_slice()).unwrap_or_default() {
        if !catalog_ids.contains(id.as_str()) {
            messages.push(
                Message::error(
                    "MANIFEST_ARTIFACT_MISSING",
                    format!("Artifact '{id}' is listed in manifest but missing in catalog"),
                )
                .with("artifactId", id),
            );
        }
    }
    for id in catalog.ids() {
        if !manifest_ids.contains(id) {
            messages.push(
                Message::warning(
                    "CATALOG_ARTIFACT_EXTRA",
                    format!("Artifact '{id}' is missing from manifest.artifacts"),
                )
                .with("artifactId", id),
            );
        }
    }
    messages
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Resolve `profile` into the set of artifact ids to validate.
///
/// Without a manifest every catalog artifact stays selected. On any other
/// profile error the selection falls back to the manifest artifact list.
fn select_profile(
    manifest: Option<&Manifest>,
    catalog: &Catalog,
    profile: &str,
) -> (BTreeSet<String>, Vec<Message>) {
    let Some(manifest) = manifest else {
        let all = catalog.ids().map(str::to_string).collect();
        let message = Message::error(
            "PROFILE_NO_MANIFEST",
            "Cannot apply profile filter without manifest",
        )
        .with("profile", profile);
        return (all, vec![message]);
    };

    let fallback: BTreeSet<String> = manifest.artifacts.iter().cloned().collect();
    let not_declared = || {
        Message::error(
            "PROFILE_NOT_DECLARED",
            format!("Profile '{profile}' is not listed in manifest.profiles"),
        )
        .with("profile", profile)
    };

    match &manifest.profiles {
        None => (
            fallback,
            vec![Message::error(
                "PROFILE_FIELD_MISSING",
                "manifest.profiles is required when a profile is requested",
            )
            .with("profile", profile)],
        ),
        Some(Profiles::List(names)) => {
            let messages = if names.iter().any(|n| n == profile) {
                Vec::new()
            } else {
                vec![not_declared()]
            };
            (fallback, messages)
        }
        Some(Profiles::Map(map)) => match map.get(profile) {
            None => (fallback, vec![not_declared()]),
            Some(None) => (
                fallback,
                vec![Message::error(
                    "PROFILE_MAP_INVALID",
                    format!("manifest.profiles['{profile}'] must be an array of artifact.id"),
                )
                .with("profile", profile)],
            ),
            Some(Some(ids)) => {
                let catalog_ids: HashSet<&str> = catalog.ids().collect();
                let selected: BTreeSet<String> = ids.iter().cloned().collect();
                let messages = selected
                    .iter()
                    .filter(|id| !catalog_ids.contains(id.as_str()))
                    .map(|id| {
                        Message::error(
                            "PROFILE_ARTIFACT_MISSING",
                            format!("Artifact '{id}' is missing in catalog for profile '{profile}'"),
                        )
                        .with("artifactId", id.as_str())
                        .with("profile", profile)
                    })
                    .collect();
                (selected, messages)
            }
        },
        Some(Profiles::Invalid) => (
            fallback,
            vec![Message::error(
                "PROFILE_FIELD_INVALID",
                "manifest.profiles has an invalid type",
            )
            .with("profile", profile)],
        ),
    }
}
