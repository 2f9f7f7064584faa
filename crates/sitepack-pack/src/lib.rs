//! # sitepack-pack — SitePack Validation Engine
//!
//! Validates unpacked packages, encrypted envelope headers, and sharded
//! volume sets, and builds or extracts volume sets.
//!
//! ## Components
//!
//! - [`ndjson::RecordStreamValidator`]: line-by-line NDJSON validation
//!   with a per-record hook.
//! - [`asset::verify_asset_record`]: the asset-index hook that checks
//!   blobs and reassembles chunked assets in index order.
//! - [`objects::ObjectGraphValidator`]: object index / passport / catalog
//!   cross-references.
//! - [`package::PackageValidator`]: the package orchestrator. Owns the
//!   report builder and folds in every other component's findings.
//! - [`volumes::VolumeSetValidator`]: volume checks, scratch extraction,
//!   then package validation of the reconstructed tree.
//! - [`envelope::EnvelopeValidator`]: `*.enc.json` header checks.
//! - [`builder`]: `create_volumes` / `extract_volumes`.
//!
//! ## Design
//!
//! Validators return [`sitepack_core::Detail`] and
//! [`sitepack_core::Message`] values. Only the orchestrators touch a
//! [`sitepack_core::ReportBuilder`]. The top-level `validate` methods
//! persist `reports/validate.json` and return `Err` only when that write
//! fails. Schema checks go through the [`sitepack_schema::SchemaGate`]
//! trait so tests can substitute their own gate.

pub mod archive;
pub mod asset;
pub mod builder;
mod document;
pub mod envelope;
pub mod error;
pub mod ndjson;
pub mod objects;
pub mod package;
pub mod persist;
pub mod volumes;

// Re-export primary types for ergonomic imports.
pub use archive::{extract_archive, ExtractOutcome, UnsafeEntryPolicy};
pub use asset::verify_asset_record;
pub use builder::{
    create_volumes, extract_volumes, BuiltVolume, CreateOptions, CreatedVolumeSet,
    DEFAULT_BASE_NAME, DEFAULT_MAX_PART_SIZE,
};
pub use envelope::{EnvelopeOptions, EnvelopeValidator};
pub use error::{ArchiveError, PackError, PackResult, VolumeBuildError};
pub use ndjson::{RecordStreamOutcome, RecordStreamValidator};
pub use objects::ObjectGraphValidator;
pub use package::{PackageValidator, ValidateOptions, CATALOG_FILE, MANIFEST_FILE};
pub use persist::{write_report, REPORTS_DIR, REPORT_FILE};
pub use volumes::{VolumeSetValidator, VOLUMES_FILE};
