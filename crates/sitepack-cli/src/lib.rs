//! # sitepack-cli — CLI Tool for SitePack
//!
//! Provides the `sitepack` command-line interface.
//!
//! ## Subcommands
//!
//! - `sitepack validate <dir>`: Validate an unpacked package.
//! - `sitepack envelope <file.enc.json>`: Validate an encrypted envelope header.
//! - `sitepack volume-set <sitepack.volumes.json>`: Validate a volume set and
//!   the package it reassembles into.
//! - `sitepack volumes create|extract`: Build or unpack a volume set.
//!
//! ## Exit Codes
//!
//! `0` when the report has no errors (and, with `--strict`, no warnings),
//! `1` on validation failure or an I/O failure, `2` on a usage error.
//!
//! ```bash
//! sitepack validate ./site --profile lite --check-asset-blobs
//! sitepack --format json volume-set dist/sitepack.volumes.json
//! sitepack volumes create ./site dist --max-part-size 10485760
//! ```

pub mod envelope;
pub mod output;
pub mod validate;
pub mod volume_set;
pub mod volumes;

use std::path::{Path, PathBuf};

use clap::Args;
use sitepack_schema::SchemaValidator;

use output::OutputFormat;

/// Exit code for usage errors.
pub const USAGE_EXIT: u8 = 2;

/// A problem with the command line itself: a missing target, a target of
/// the wrong kind, or an unusable schema directory.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(pub String);

/// Flags shared by every validation subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Output format: text or json.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Print only the summary lines.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Treat warnings as failures.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Load `<name>.schema.json` files from this directory instead of the
    /// built-in schema set.
    #[arg(long, global = true)]
    pub schemas: Option<PathBuf>,
}

/// Build the schema gate, from `schemas` when given.
pub fn load_gate(schemas: Option<&Path>) -> anyhow::Result<SchemaValidator> {
    match schemas {
        Some(dir) if !dir.is_dir() => Err(UsageError(format!(
            "Schemas directory not found: {}",
            dir.display()
        ))
        .into()),
        Some(dir) => SchemaValidator::from_dir(dir).map_err(|e| UsageError(e.to_string()).into()),
        None => Ok(SchemaValidator::builtin()?),
    }
}
