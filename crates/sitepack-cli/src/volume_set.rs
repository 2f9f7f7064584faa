//! `sitepack volume-set <sitepack.volumes.json>`: validates the volumes,
//! reassembles them in a scratch directory, and validates the package.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sitepack_pack::VolumeSetValidator;

use crate::validate::SelectionArgs;
use crate::{load_gate, output, GlobalArgs, UsageError};

#[derive(Args, Debug)]
pub struct VolumeSetArgs {
    /// Path to `sitepack.volumes.json`.
    pub descriptor: PathBuf,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

pub fn run_volume_set(args: &VolumeSetArgs, global: &GlobalArgs) -> Result<u8> {
    let descriptor = &args.descriptor;
    if !descriptor.is_file() {
        return Err(UsageError(format!(
            "Volume set descriptor does not exist or is not a file: {}",
            descriptor.display()
        ))
        .into());
    }
    let gate = load_gate(global.schemas.as_deref())?;

    let report = VolumeSetValidator::new(&gate, args.selection.to_options())
        .validate(descriptor)
        .with_context(|| format!("failed to validate {}", descriptor.display()))?;
    output::emit(&report, global)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_descriptor_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = VolumeSetArgs {
            descriptor: dir.path().join("sitepack.volumes.json"),
            selection: SelectionArgs::default(),
        };
        let err = run_volume_set(&args, &GlobalArgs::default()).unwrap_err();
        assert!(err.is::<UsageError>());
    }

    #[test]
    fn missing_volume_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = dir.path().join("sitepack.volumes.json");
        fs::write(
            &descriptor,
            r#"{"volumes":[{"index":1,"file":"sitepack.part1.sitepack"}]}"#,
        )
        .unwrap();
        let args = VolumeSetArgs {
            descriptor,
            selection: SelectionArgs::default(),
        };
        let global = GlobalArgs {
            quiet: true,
            ..Default::default()
        };
        assert_eq!(run_volume_set(&args, &global).unwrap(), 1);
        assert!(dir.path().join("reports/validate.json").is_file());
    }
}
