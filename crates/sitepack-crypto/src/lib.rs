//! # sitepack-crypto — Streaming Digests
//!
//! The DigestEngine used by every SitePack integrity check:
//!
//! - [`digest_file`] for catalog artifacts, whose descriptors declare
//!   `sha256:<hex>`.
//! - [`digest_file_hex`] for asset blobs, chunks, and volumes, whose
//!   descriptors declare bare hex.
//! - [`digest_concat`] for chunked assets: the digest of the byte
//!   concatenation of several files in a caller-chosen order.
//!
//! All three stream their input through a fixed-size buffer.
//!
//! ## Crate Policy
//!
//! - Depends only on `sitepack-core` internally.
//! - Tests hash real files on disk; nothing is mocked.

pub mod sha256;

pub use sha256::{digest_concat, digest_file, digest_file_hex, DigestError};
