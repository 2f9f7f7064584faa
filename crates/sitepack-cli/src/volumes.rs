//! # Volume Set Utilities
//!
//! `sitepack volumes create` splits an unpacked package into zip volumes
//! plus a `sitepack.volumes.json` descriptor. `sitepack volumes extract`
//! overlays a set's volumes into a directory in index order.
//!
//! ```bash
//! sitepack volumes create ./site dist --max-part-size 10485760
//! sitepack volumes extract dist/sitepack.volumes.json ./restored
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use sitepack_pack::{
    create_volumes, extract_volumes, CreateOptions, DEFAULT_BASE_NAME, DEFAULT_MAX_PART_SIZE,
};

/// Volumes subcommand arguments.
#[derive(Args, Debug)]
pub struct VolumesArgs {
    #[command(subcommand)]
    pub command: VolumesCommand,
}

#[derive(Subcommand, Debug)]
pub enum VolumesCommand {
    /// Create volume parts and a descriptor from an unpacked package.
    Create {
        /// Unpacked package directory.
        package_dir: PathBuf,

        /// Directory receiving the volumes and `sitepack.volumes.json`.
        out_dir: PathBuf,

        /// Maximum size per volume in bytes.
        #[arg(long, default_value_t = DEFAULT_MAX_PART_SIZE,
              value_parser = clap::value_parser!(u64).range(1..))]
        max_part_size: u64,

        /// Override the descriptor's packageId.
        #[arg(long)]
        package_id: Option<String>,

        /// Base filename for volume parts.
        #[arg(long, default_value = DEFAULT_BASE_NAME)]
        base_name: String,

        /// Overwrite existing output files.
        #[arg(long)]
        overwrite: bool,
    },

    /// Extract a volume set into a directory.
    Extract {
        /// Path to `sitepack.volumes.json`.
        descriptor: PathBuf,

        /// Destination directory.
        out_dir: PathBuf,

        /// Allow extraction into a non-empty directory.
        #[arg(long)]
        overwrite: bool,
    },
}

/// Execute the volumes subcommand. Builder failures surface as errors
/// (exit 1).
pub fn run_volumes(args: &VolumesArgs) -> Result<u8> {
    match &args.command {
        VolumesCommand::Create {
            package_dir,
            out_dir,
            max_part_size,
            package_id,
            base_name,
            overwrite,
        } => {
            let options = CreateOptions {
                max_part_size: *max_part_size,
                package_id: package_id.clone(),
                base_name: base_name.clone(),
                overwrite: *overwrite,
            };
            let created = create_volumes(package_dir, out_dir, &options)?;
            println!("Created volume set for package '{}'.", created.package_id);
            println!("Descriptor: {}", created.descriptor_path.display());
            for v in &created.volumes {
                println!("- {} ({} bytes, sha256 {})", v.file, v.size, v.sha256);
            }
            Ok(0)
        }
        VolumesCommand::Extract {
            descriptor,
            out_dir,
            overwrite,
        } => {
            extract_volumes(descriptor, out_dir, *overwrite)?;
            println!("Extracted volumes into {}", out_dir.display());
            Ok(0)
        }
    }
}
