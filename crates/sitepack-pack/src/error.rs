//! Pack-specific error types.
//!
//! Validation findings are never errors here: they are `Detail` and
//! `Message` values in the report. These types cover the failures that
//! stop a report from being produced or persisted, archive extraction
//! failures, and the volume-set builder utilities.

use std::io;
use std::path::PathBuf;

use sitepack_crypto::DigestError;
use thiserror::Error;

/// Errors that prevent a validation report from being produced.
#[derive(Debug, Error)]
pub enum PackError {
    /// The report could not be written to `reports/validate.json`.
    #[error("failed to write report to {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The report could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for validation entry points.
pub type PackResult<T> = Result<T, PackError>;

/// A JSON document could not be loaded. Rendered into `*_PARSE_ERROR`
/// messages.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

/// Failure while reading a zip volume.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry name escapes the destination root. Only returned when
    /// extraction runs with [`crate::archive::UnsafeEntryPolicy::Abort`].
    #[error("Unsafe entry path: {entry}")]
    UnsafeEntry { entry: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors from `sitepack volumes create` and `sitepack volumes extract`.
#[derive(Debug, Error)]
pub enum VolumeBuildError {
    /// One or more package files could not be collected.
    #[error("{}", .0.join("\n"))]
    Collect(Vec<String>),

    #[error("Required files exceed maxPartSize ({size} > {max})")]
    BootstrapTooLarge { size: u64, max: u64 },

    #[error("File exceeds maxPartSize: {path} ({size} > {max})")]
    FileTooLarge { path: String, size: u64, max: u64 },

    #[error("Volume exceeds maxPartSize: {file} ({size} > {max})")]
    VolumeTooLarge { file: String, size: u64, max: u64 },

    #[error("Output file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("Output directory is not empty: {}", .0.display())]
    OutputNotEmpty(PathBuf),

    #[error("Volume set descriptor not found: {}", .0.display())]
    DescriptorNotFound(PathBuf),

    #[error("{0}")]
    InvalidDescriptor(String),

    #[error("Unsafe volume file path: {0}")]
    UnsafeVolumePath(String),

    #[error("Volume file not found: {0}")]
    VolumeNotFound(String),

    #[error("max part size must be a positive integer")]
    InvalidMaxPartSize,

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Digest(#[from] DigestError),

    #[error("archive write error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_joins_messages() {
        let err = VolumeBuildError::Collect(vec![
            "Missing file: a.json".to_string(),
            "Unsafe path: ../b".to_string(),
        ]);
        assert_eq!(err.to_string(), "Missing file: a.json\nUnsafe path: ../b");
    }

    #[test]
    fn unsafe_entry_display() {
        let err = ArchiveError::UnsafeEntry {
            entry: "../evil".to_string(),
        };
        assert_eq!(err.to_string(), "Unsafe entry path: ../evil");
    }

    #[test]
    fn report_write_display_has_path() {
        let err = PackError::ReportWrite {
            path: PathBuf::from("/ro/reports/validate.json"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/ro/reports/validate.json"));
    }
}
