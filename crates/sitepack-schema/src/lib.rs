//! # sitepack-schema — Schema Gate
//!
//! Validates parsed SitePack documents against a closed set of twelve
//! JSON Schemas: manifest, catalog, the four NDJSON record kinds, the
//! four single-document artifact kinds, envelope headers, and volume-set
//! descriptors.
//!
//! The validation engine depends only on the [`SchemaGate`] trait. The
//! provided implementation, [`SchemaValidator`], compiles either the
//! schema set embedded in this crate or a directory of
//! `<name>.schema.json` files.
//!
//! ## Crate Policy
//!
//! - Depends only on `sitepack-core` internally.
//! - Schema `$id` URIs must not change without updating every `$ref`.

pub mod validate;

pub use sitepack_core::SchemaName;
pub use validate::{SchemaGate, SchemaValidationError, SchemaValidator, Violation};
