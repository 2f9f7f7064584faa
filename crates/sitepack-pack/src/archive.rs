//! # Volume Archive Extraction
//!
//! Reads one zip volume into a destination root. Every entry name is
//! resolved through SafePath against the destination before anything is
//! written, so an entry can never land outside it (zip-slip).
//!
//! Later entries overwrite earlier files at the same path, which is why
//! callers extract volumes in ascending index order.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use sitepack_core::safe_path;
use zip::ZipArchive;

use crate::error::ArchiveError;

/// What to do with an entry whose name escapes the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafeEntryPolicy {
    /// Record the entry name and continue with the next entry.
    Skip,
    /// Stop with [`ArchiveError::UnsafeEntry`].
    Abort,
}

/// Result of extracting one archive.
#[derive(Debug, Default)]
pub struct ExtractOutcome {
    pub files_written: u64,
    /// Entry names rejected under [`UnsafeEntryPolicy::Skip`], in archive
    /// order.
    pub skipped_entries: Vec<String>,
}

/// Extract `archive` into `dest`.
pub fn extract_archive(
    archive: &Path,
    dest: &Path,
    policy: UnsafeEntryPolicy,
) -> Result<ExtractOutcome, ArchiveError> {
    let file = File::open(archive).map_err(|source| ArchiveError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let zip_err = |source| ArchiveError::Zip {
        path: archive.to_path_buf(),
        source,
    };
    let mut zip = ZipArchive::new(file).map_err(zip_err)?;
    let mut outcome = ExtractOutcome::default();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(zip_err)?;
        let name = entry.name().to_string();

        let target = match safe_path::resolve(dest, &name) {
            Ok(p) => p,
            Err(_) => match policy {
                UnsafeEntryPolicy::Skip => {
                    tracing::warn!(entry = %name, archive = %archive.display(), "unsafe entry skipped");
                    outcome.skipped_entries.push(name);
                    continue;
                }
                UnsafeEntryPolicy::Abort => return Err(ArchiveError::UnsafeEntry { entry: name }),
            },
        };

        let write_err = |source| ArchiveError::Write {
            path: target.clone(),
            source,
        };
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(write_err)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut out = File::create(&target).map_err(write_err)?;
        io::copy(&mut entry, &mut out).map_err(write_err)?;
        outcome.files_written += 1;
        tracing::trace!(entry = %name, "entry extracted");
    }

    Ok(outcome)
}
