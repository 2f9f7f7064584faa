//! `sitepack envelope <file.enc.json>`: header-only envelope validation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sitepack_core::ToolInfo;
use sitepack_pack::{EnvelopeOptions, EnvelopeValidator};

use crate::{load_gate, output, GlobalArgs, UsageError};

#[derive(Args, Debug)]
pub struct EnvelopeArgs {
    /// Path to the `*.enc.json` header.
    pub header: PathBuf,

    /// Check that `payload.file` exists next to the header.
    #[arg(long)]
    pub check_payload_file: bool,
}

pub fn run_envelope(args: &EnvelopeArgs, global: &GlobalArgs) -> Result<u8> {
    let header = &args.header;
    if !header.exists() {
        return Err(UsageError(format!("Path does not exist: {}", header.display())).into());
    }
    if !header.is_file() {
        return Err(
            UsageError(format!("Expected envelope header file: {}", header.display())).into(),
        );
    }
    let gate = load_gate(global.schemas.as_deref())?;

    let options = EnvelopeOptions {
        check_payload_file: args.check_payload_file,
        tool: ToolInfo::default(),
    };
    let report = EnvelopeValidator::new(&gate, options)
        .validate(header)
        .with_context(|| format!("failed to validate {}", header.display()))?;
    output::emit(&report, global)
}
