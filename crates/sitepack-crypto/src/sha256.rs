//! # SHA-256 over Files
//!
//! Hashes file contents without loading them into memory. `Sha256`
//! implements `io::Write`, so each file is copied through a `BufReader`
//! straight into the hasher.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use sitepack_core::{ContentDigest, DigestAlgorithm};
use thiserror::Error;

/// A file could not be read while hashing.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn feed(hasher: &mut Sha256, path: &Path) -> Result<(), DigestError> {
    let wrap = |source| DigestError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(wrap)?;
    io::copy(&mut BufReader::new(file), hasher).map_err(wrap)?;
    Ok(())
}

fn finish(hasher: Sha256) -> ContentDigest {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    ContentDigest::new(DigestAlgorithm::Sha256, bytes)
}

/// Digest of one file. `to_string()` on the result yields `sha256:<hex>`.
pub fn digest_file(path: &Path) -> Result<ContentDigest, DigestError> {
    let mut hasher = Sha256::new();
    feed(&mut hasher, path)?;
    Ok(finish(hasher))
}

/// Lowercase hex digest of one file.
pub fn digest_file_hex(path: &Path) -> Result<String, DigestError> {
    digest_file(path).map(|d| d.to_hex())
}

/// Lowercase hex digest of the concatenation of `paths`, in the order
/// given.
pub fn digest_concat<P: AsRef<Path>>(paths: &[P]) -> Result<String, DigestError> {
    let mut hasher = Sha256::new();
    for path in paths {
        feed(&mut hasher, path.as_ref())?;
    }
    Ok(finish(hasher).to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_digest_file_known_vector() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("abc");
        fs::write(&p, b"abc").unwrap();
        assert_eq!(digest_file_hex(&p).unwrap(), ABC);
        assert_eq!(digest_file(&p).unwrap().to_string(), format!("sha256:{ABC}"));
    }

    #[test]
    fn test_concat_equals_whole() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let bc = dir.path().join("bc");
        fs::write(&a, b"a").unwrap();
        fs::write(&bc, b"bc").unwrap();
        assert_eq!(digest_concat(&[&a, &bc]).unwrap(), ABC);
    }

    #[test]
    fn test_concat_is_order_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let bc = dir.path().join("bc");
        fs::write(&a, b"a").unwrap();
        fs::write(&bc, b"bc").unwrap();
        assert_ne!(digest_concat(&[&bc, &a]).unwrap(), ABC);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = digest_file(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_empty_concat_is_empty_digest() {
        let none: [&Path; 0] = [];
        assert_eq!(
            digest_concat(&none).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
