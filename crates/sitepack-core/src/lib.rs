//! # sitepack-core — Foundational Types for SitePack Validation
//!
//! This crate is the leaf of the SitePack workspace. It defines the types
//! every other crate exchanges: sandboxed paths, content digests, typed
//! views over package documents, media-type dispatch, and the report model.
//!
//! ## Key Design Principles
//!
//! 1. **Every declared path goes through [`safe_path::resolve`].** Artifact,
//!    chunk, passport, volume, envelope, and archive entry paths are all
//!    untrusted input. Resolution is lexical and never follows symlinks.
//!
//! 2. **Findings are values, not errors.** Validators return [`Detail`] and
//!    [`Message`] lists; only the orchestrator folds them into a
//!    [`ReportBuilder`]. `Err` is reserved for failures that prevent a
//!    report from being produced at all.
//!
//! 3. **Closed media dispatch.** [`MediaKind`] is an exhaustive enum; adding
//!    an artifact kind forces every `match` to handle it.
//!
//! 4. **Lenient typed views.** Documents are read through explicit
//!    `Option` fields. A missing or mistyped field is `None`, never a
//!    panic, so a single malformed document still yields one report.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `sitepack-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod digest;
pub mod error;
pub mod media;
pub mod model;
pub mod report;
pub mod safe_path;

pub use digest::{ContentDigest, DigestAlgorithm};
pub use error::PathError;
pub use media::{MediaKind, RecordHook, SchemaName};
pub use model::{
    ArtifactDescriptor, AssetIndexRecord, Catalog, ChunkEntry, ChunkSlot, DatasetSelector,
    EnvelopeHeader, Manifest, ObjectIndex, ObjectIndexEntry, ObjectPassport, Profiles,
    VolumeEncryption, VolumeEntry, VolumeSetDescriptor,
};
pub use report::{
    ArtifactResult, ArtifactStatus, Detail, Level, Message, Report, ReportBuilder, Summary,
    Target, TargetKind, ToolInfo,
};
pub use safe_path::resolve as resolve_safe_path;
