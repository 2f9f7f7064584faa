//! # SafePath — Sandboxed Resolution of Declared Paths
//!
//! Resolves a relative path declared inside a package document against a
//! trusted root directory and rejects anything that could escape it.
//!
//! ## Security Invariant
//!
//! A successful resolution is always equal to, or strictly nested under,
//! the lexically normalized base directory. Resolution performs no
//! filesystem I/O and never resolves symlinks; the target does not need
//! to exist. This is the guard against traversal and zip-slip, and it is
//! applied to every artifact, chunk, passport, volume, envelope payload,
//! and archive entry path.
//!
//! ## Rejection Order
//!
//! 1. not a string ([`PathError::NotString`])
//! 2. contains NUL ([`PathError::NullByte`])
//! 3. absolute, POSIX or drive-letter form ([`PathError::Absolute`])
//! 4. any `/`- or `\`-separated segment equals `..` ([`PathError::Traversal`])
//! 5. normalized result outside the base ([`PathError::OutsideRoot`])

use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Resolve `declared` against `base_dir`.
///
/// Both `/` and `\` are treated as separators so that archive entries and
/// documents authored on Windows are checked the same way as POSIX ones.
/// Empty and `.` segments are dropped: `a/./b` and `a//b` resolve to the
/// same path as `a/b`.
pub fn resolve(base_dir: &Path, declared: &str) -> Result<PathBuf, PathError> {
    if declared.contains('\0') {
        return Err(PathError::NullByte);
    }
    if is_absolute_declared(declared) {
        return Err(PathError::Absolute);
    }

    let segments: Vec<&str> = split_segments(declared).collect();
    if segments.iter().any(|s| *s == "..") {
        return Err(PathError::Traversal);
    }

    let base = normalize_lexically(&absolute_base(base_dir));
    let mut resolved = base.clone();
    for segment in segments {
        if segment == "." {
            continue;
        }
        resolved.push(segment);
    }
    let resolved = normalize_lexically(&resolved);

    if resolved == base || resolved.starts_with(&base) {
        Ok(resolved)
    } else {
        Err(PathError::OutsideRoot)
    }
}

/// Resolve an optional declared value. `None` stands for a field that was
/// absent or not a string in the source document.
pub fn resolve_declared(base_dir: &Path, declared: Option<&str>) -> Result<PathBuf, PathError> {
    match declared {
        Some(p) => resolve(base_dir, p),
        None => Err(PathError::NotString),
    }
}

/// Forward-slash relative form of a declared path with empty and `.`
/// segments removed. Used as the stable key for archive entry names.
pub fn normalize_relative(declared: &str) -> String {
    split_segments(declared)
        .filter(|s| *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn split_segments(declared: &str) -> impl Iterator<Item = &str> {
    declared.split(['/', '\\']).filter(|s| !s.is_empty())
}

fn is_absolute_declared(declared: &str) -> bool {
    if declared.starts_with('/') || declared.starts_with('\\') {
        return true;
    }
    let bytes = declared.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

fn absolute_base(base_dir: &Path) -> PathBuf {
    if base_dir.is_absolute() {
        return base_dir.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(base_dir),
        Err(_) => base_dir.to_path_buf(),
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
