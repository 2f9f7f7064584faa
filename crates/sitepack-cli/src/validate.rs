//! # Package Validation CLI
//!
//! `sitepack validate <packageRoot>` validates an unpacked package and
//! writes `<packageRoot>/reports/validate.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sitepack_core::ToolInfo;
use sitepack_pack::{PackageValidator, ValidateOptions};

use crate::{load_gate, output, GlobalArgs, UsageError};

/// Artifact selection and check toggles shared with `volume-set`.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Validate only the artifacts of this manifest profile.
    #[arg(long)]
    pub profile: Option<String>,

    /// Skip digest verification even when digests are declared.
    #[arg(long)]
    pub no_digest: bool,

    /// Check files referenced by asset-index records, including chunked assets.
    #[arg(long)]
    pub check_asset_blobs: bool,
}

impl SelectionArgs {
    pub fn to_options(&self) -> ValidateOptions {
        ValidateOptions {
            profile: self.profile.clone(),
            skip_digest: self.no_digest,
            check_blobs: self.check_asset_blobs,
            tool: ToolInfo::default(),
        }
    }
}

/// Arguments for the `validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the unpacked package directory.
    pub package_root: PathBuf,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

/// Execute the `validate` subcommand.
pub fn run_validate(args: &ValidateArgs, global: &GlobalArgs) -> Result<u8> {
    let root = &args.package_root;
    if !root.exists() {
        return Err(UsageError(format!("Path does not exist: {}", root.display())).into());
    }
    if !root.is_dir() {
        return Err(UsageError(format!("Expected package directory: {}", root.display())).into());
    }
    let gate = load_gate(global.schemas.as_deref())?;

    let report = PackageValidator::new(&gate, args.selection.to_options())
        .validate(root)
        .with_context(|| format!("failed to validate {}", root.display()))?;
    output::emit(&report, global)
}
