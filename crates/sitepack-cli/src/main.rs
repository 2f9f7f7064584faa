//! # sitepack CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sitepack_cli::envelope::{run_envelope, EnvelopeArgs};
use sitepack_cli::validate::{run_validate, ValidateArgs};
use sitepack_cli::volume_set::{run_volume_set, VolumeSetArgs};
use sitepack_cli::volumes::{run_volumes, VolumesArgs};
use sitepack_cli::{GlobalArgs, UsageError, USAGE_EXIT};

/// SitePack validator
///
/// Validates unpacked SitePack packages, encrypted envelope headers, and
/// sharded volume sets, and builds or extracts volume sets.
#[derive(Parser, Debug)]
#[command(name = "sitepack", version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging on stderr. Repeat for more (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate an unpacked package directory.
    Validate(ValidateArgs),

    /// Validate an encrypted envelope header (.enc.json).
    Envelope(EnvelopeArgs),

    /// Validate a volume set descriptor and the package it reassembles into.
    VolumeSet(VolumeSetArgs),

    /// Create or extract volume sets.
    Volumes(VolumesArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "sitepack CLI starting");

    let result = match &cli.command {
        Commands::Validate(args) => run_validate(args, &cli.global),
        Commands::Envelope(args) => run_envelope(args, &cli.global),
        Commands::VolumeSet(args) => run_volume_set(args, &cli.global),
        Commands::Volumes(args) => run_volumes(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) if e.is::<UsageError>() => {
            eprintln!("{e}");
            ExitCode::from(USAGE_EXIT)
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepack_cli::output::OutputFormat;
    use sitepack_cli::volumes::VolumesCommand;

    #[test]
    fn cli_parse_validate_defaults() {
        let cli = Cli::try_parse_from(["sitepack", "validate", "./site"]).unwrap();
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.global.format, OutputFormat::Text);
        assert!(!cli.global.strict);
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.package_root.to_str(), Some("./site"));
        assert!(args.selection.profile.is_none());
        assert!(!args.selection.no_digest);
        assert!(!args.selection.check_asset_blobs);
    }

    #[test]
    fn cli_parse_validate_all_flags() {
        let cli = Cli::try_parse_from([
            "sitepack",
            "-vv",
            "validate",
            "./site",
            "--profile",
            "lite",
            "--no-digest",
            "--check-asset-blobs",
            "--strict",
            "--quiet",
            "--format",
            "json",
            "--schemas",
            "./schemas",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.global.strict);
        assert!(cli.global.quiet);
        assert_eq!(cli.global.format, OutputFormat::Json);
        assert_eq!(
            cli.global.schemas.as_deref().and_then(|p| p.to_str()),
            Some("./schemas")
        );
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.selection.profile.as_deref(), Some("lite"));
        assert!(args.selection.no_digest);
        assert!(args.selection.check_asset_blobs);
    }

    #[test]
    fn cli_parse_envelope() {
        let cli = Cli::try_parse_from([
            "sitepack",
            "envelope",
            "site.enc.json",
            "--check-payload-file",
        ])
        .unwrap();
        let Commands::Envelope(args) = cli.command else {
            panic!("expected envelope");
        };
        assert!(args.check_payload_file);
    }

    #[test]
    fn cli_parse_volume_set() {
        let cli = Cli::try_parse_from([
            "sitepack",
            "volume-set",
            "dist/sitepack.volumes.json",
            "--profile",
            "full",
        ])
        .unwrap();
        let Commands::VolumeSet(args) = cli.command else {
            panic!("expected volume-set");
        };
        assert_eq!(args.selection.profile.as_deref(), Some("full"));
    }

    #[test]
    fn cli_parse_volumes_create_defaults() {
        let cli = Cli::try_parse_from(["sitepack", "volumes", "create", "./site", "dist"]).unwrap();
        let Commands::Volumes(args) = cli.command else {
            panic!("expected volumes");
        };
        let VolumesCommand::Create {
            max_part_size,
            base_name,
            package_id,
            overwrite,
            ..
        } = args.command
        else {
            panic!("expected create");
        };
        assert_eq!(max_part_size, 104_857_600);
        assert_eq!(base_name, "sitepack");
        assert!(package_id.is_none());
        assert!(!overwrite);
    }

    #[test]
    fn cli_rejects_zero_part_size() {
        let result = Cli::try_parse_from([
            "sitepack",
            "volumes",
            "create",
            "./site",
            "dist",
            "--max-part-size",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parse_volumes_extract() {
        let cli = Cli::try_parse_from([
            "sitepack",
            "volumes",
            "extract",
            "dist/sitepack.volumes.json",
            "out",
            "--overwrite",
        ])
        .unwrap();
        let Commands::Volumes(args) = cli.command else {
            panic!("expected volumes");
        };
        assert!(matches!(
            args.command,
            VolumesCommand::Extract { overwrite: true, .. }
        ));
    }

    #[test]
    fn cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["sitepack", "--format", "xml", "validate", "."]).is_err());
    }
}
