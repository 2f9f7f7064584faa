//! # Error Types — Path Sandbox Rejections
//!
//! Structured rejection kinds produced by [`crate::safe_path::resolve`].
//! Each variant maps to a stable report code so that callers can surface
//! the rejection without re-deriving it.

use thiserror::Error;

/// Why a declared relative path was rejected by the sandbox.
///
/// Variants are listed in the order the checks run: the first failing
/// check wins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The declared value is absent or not a string.
    #[error("Artifact path must be a string")]
    NotString,

    /// The path contains a NUL byte.
    #[error("Artifact path contains null byte")]
    NullByte,

    /// The path is absolute (POSIX root, backslash root, or drive letter).
    #[error("Absolute paths are not allowed")]
    Absolute,

    /// A path segment equals `..`.
    #[error("Artifact path contains directory traversal (..)")]
    Traversal,

    /// After normalization the path is not nested under the base directory.
    #[error("Artifact path escapes the package root")]
    OutsideRoot,
}

impl PathError {
    /// Stable report code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotString => "PATH_NOT_STRING",
            Self::NullByte => "PATH_NULL_BYTE",
            Self::Absolute => "PATH_ABSOLUTE",
            Self::Traversal => "PATH_TRAVERSAL",
            Self::OutsideRoot => "PATH_OUTSIDE_ROOT",
        }
    }
}
