//! # Asset Blob and Chunk Verification
//!
//! The record hook for asset-index streams. Each record points either at
//! a single blob (`path`) or at an ordered list of chunks whose byte
//! concatenation is the asset.
//!
//! Chunked assets are reassembled in ascending `index` order, never in
//! declaration order: the declared whole-asset `sha256` is only
//! reproducible from the byte-exact concatenation in index order.
//!
//! Any problem with an individual chunk marks the record as not
//! assemblable. Index, path, and file problems drop the chunk; size and
//! digest mismatches keep it but still block the whole-asset checks.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sitepack_core::model::non_blank;
use sitepack_core::safe_path;
use sitepack_core::{AssetIndexRecord, ChunkEntry, ChunkSlot, Detail};
use sitepack_crypto::{digest_concat, digest_file_hex};

/// A chunk that resolved to a regular file.
struct CollectedChunk {
    index: u64,
    path: PathBuf,
    size: u64,
}

/// Verify the files referenced by one asset-index record, resolved under
/// `package_root`. Non-object records produce nothing.
pub fn verify_asset_record(package_root: &Path, record: &Value) -> Vec<Detail> {
    let Some(record) = AssetIndexRecord::from_value(record) else {
        return Vec::new();
    };
    match &record.chunks {
        Some(chunks) => verify_chunks(package_root, &record, chunks),
        None => verify_blob(package_root, &record),
    }
}

fn verify_chunks(package_root: &Path, record: &AssetIndexRecord, slots: &[ChunkSlot]) -> Vec<Detail> {
    let mut details = Vec::new();
    let mut collected: Vec<CollectedChunk> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut can_assemble = true;

    for slot in slots {
        let chunk = match slot {
            ChunkSlot::Entry(chunk) => chunk,
            ChunkSlot::NotObject => {
                details.push(Detail::error("ASSET_CHUNK_INVALID", "Chunk entry must be an object"));
                can_assemble = false;
                continue;
            }
        };
        match check_chunk(package_root, chunk, &mut seen, &mut details) {
            ChunkCheck::Dropped => can_assemble = false,
            ChunkCheck::Kept { chunk, clean } => {
                can_assemble &= clean;
                collected.push(chunk);
            }
        }
    }

    if collected.is_empty() || !can_assemble {
        return details;
    }

    collected.sort_by_key(|c| c.index);
    for (expected, chunk) in (1u64..).zip(&collected) {
        if chunk.index != expected {
            details.push(Detail::error(
                "ASSET_CHUNK_INDEX_GAP",
                format!("Chunk index gap: expected {expected}, got {}", chunk.index),
            ));
            return details;
        }
    }

    let total: u64 = collected.iter().map(|c| c.size).sum();
    if let Some(expected) = record.size {
        if total != expected {
            details.push(Detail::error(
                "ASSET_SIZE_MISMATCH",
                format!("Asset size mismatch: {total} != {expected}"),
            ));
        }
    }

    if let Some(expected) = non_blank(record.sha256.as_deref()) {
        let ordered: Vec<&Path> = collected.iter().map(|c| c.path.as_path()).collect();
        match digest_concat(&ordered) {
            Ok(actual) if !actual.eq_ignore_ascii_case(expected) => details.push(Detail::error(
                "ASSET_DIGEST_MISMATCH",
                format!("Asset digest mismatch: {actual} != {expected}"),
            )),
            Ok(_) => {}
            Err(e) => details.push(Detail::error(
                "ASSET_DIGEST_ERROR",
                format!("Asset digest error: {e}"),
            )),
        }
    }

    details
}

enum ChunkCheck {
    Dropped,
    /// `clean` is false when the chunk's own size or digest mismatched.
    Kept { chunk: CollectedChunk, clean: bool },
}

fn check_chunk(
    package_root: &Path,
    chunk: &ChunkEntry,
    seen: &mut std::collections::HashSet<u64>,
    details: &mut Vec<Detail>,
) -> ChunkCheck {
    let Some(index) = chunk.index.filter(|i| *i >= 1) else {
        details.push(Detail::error(
            "ASSET_CHUNK_INDEX_INVALID",
            "Chunk index must be an integer >= 1",
        ));
        return ChunkCheck::Dropped;
    };
    if !seen.insert(index) {
        details.push(Detail::error(
            "ASSET_CHUNK_INDEX_DUPLICATE",
            format!("Duplicate chunk index: {index}"),
        ));
        return ChunkCheck::Dropped;
    }

    let Some(declared) = non_blank(chunk.path.as_deref()) else {
        details.push(Detail::error(
            "ASSET_CHUNK_PATH_MISSING",
            "Chunk path is missing or not a string",
        ));
        return ChunkCheck::Dropped;
    };
    let Ok(resolved) = safe_path::resolve(package_root, declared) else {
        details.push(Detail::error(
            "ASSET_CHUNK_PATH_UNSAFE",
            format!("Unsafe chunk path: {declared}"),
        ));
        return ChunkCheck::Dropped;
    };
    let Ok(meta) = fs::metadata(&resolved) else {
        details.push(Detail::error(
            "ASSET_CHUNK_MISSING",
            format!("Chunk file not found: {declared}"),
        ));
        return ChunkCheck::Dropped;
    };
    if !meta.is_file() {
        details.push(Detail::error(
            "ASSET_CHUNK_NOT_REGULAR",
            format!("Chunk path is not a regular file: {declared}"),
        ));
        return ChunkCheck::Dropped;
    }

    let mut clean = true;
    if let Some(expected) = chunk.size {
        if meta.len() != expected {
            details.push(Detail::error(
                "ASSET_CHUNK_SIZE_MISMATCH",
                format!("Chunk size mismatch: {} != {expected}", meta.len()),
            ));
            clean = false;
        }
    }
    if let Some(expected) = chunk.sha256.as_deref() {
        match digest_file_hex(&resolved) {
            Ok(actual) if !actual.eq_ignore_ascii_case(expected) => {
                details.push(Detail::error(
                    "ASSET_CHUNK_DIGEST_MISMATCH",
                    format!("Chunk digest mismatch: {actual} != {expected}"),
                ));
                clean = false;
            }
            Ok(_) => {}
            Err(e) => {
                details.push(Detail::error(
                    "ASSET_CHUNK_DIGEST_ERROR",
                    format!("Chunk digest error: {e}"),
                ));
                clean = false;
            }
        }
    }

    ChunkCheck::Kept {
        chunk: CollectedChunk {
            index,
            path: resolved,
            size: meta.len(),
        },
        clean,
    }
}

fn verify_blob(package_root: &Path, record: &AssetIndexRecord) -> Vec<Detail> {
    let Some(declared) = non_blank(record.path.as_deref()) else {
        return Vec::new();
    };
    let Ok(resolved) = safe_path::resolve(package_root, declared) else {
        return vec![Detail::error(
            "ASSET_BLOB_PATH_UNSAFE",
            format!("Unsafe asset blob path: {declared}"),
        )];
    };
    let Ok(meta) = fs::metadata(&resolved) else {
        return vec![Detail::error(
            "ASSET_BLOB_MISSING",
            format!("Asset blob file not found: {declared}"),
        )];
    };
    if !meta.is_file() {
        return vec![Detail::error(
            "ASSET_BLOB_NOT_REGULAR",
            format!("Asset blob path is not a regular file: {declared}"),
        )];
    }

    let mut details = Vec::new();
    if let Some(expected) = record.size {
        if meta.len() != expected {
            details.push(Detail::error(
                "ASSET_BLOB_SIZE_MISMATCH",
                format!("Asset blob size mismatch: {} != {expected}", meta.len()),
            ));
        }
    }
    if let Some(expected) = non_blank(record.sha256.as_deref()) {
        match digest_file_hex(&resolved) {
            Ok(actual) if !actual.eq_ignore_ascii_case(expected) => details.push(Detail::error(
                "ASSET_BLOB_DIGEST_MISMATCH",
                format!("Asset blob digest mismatch: {actual} != {expected}"),
            )),
            Ok(_) => {}
            Err(e) => details.push(Detail::error(
                "ASSET_BLOB_DIGEST_ERROR",
                format!("Asset blob digest error: {e}"),
            )),
        }
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sha2::{Digest, Sha256};

    fn hex(bytes: &[u8]) -> String {
        Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
    }

    fn codes(details: &[Detail]) -> Vec<&str> {
        details.iter().map(|d| d.code.as_str()).collect()
    }

    fn package(files: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    #[test]
    fn blob_ok() {
        let dir = package(&[("assets/logo.png", b"png!")]);
        let record = json!({"path": "assets/logo.png", "size": 4, "sha256": hex(b"png!").to_uppercase()});
        assert!(verify_asset_record(dir.path(), &record).is_empty());
    }

    #[test]
    fn blob_size_and_digest_mismatch_are_both_reported() {
        let dir = package(&[("a.bin", b"abc")]);
        let record = json!({"path": "a.bin", "size": 4, "sha256": hex(b"xyz")});
        assert_eq!(
            codes(&verify_asset_record(dir.path(), &record)),
            vec!["ASSET_BLOB_SIZE_MISMATCH", "ASSET_BLOB_DIGEST_MISMATCH"]
        );
    }

    #[test]
    fn blob_unsafe_missing_and_directory() {
        let dir = package(&[("sub/x", b"x")]);
        let unsafe_path = verify_asset_record(dir.path(), &json!({"path": "../x"}));
        assert_eq!(codes(&unsafe_path), vec!["ASSET_BLOB_PATH_UNSAFE"]);
        let missing = verify_asset_record(dir.path(), &json!({"path": "nope"}));
        assert_eq!(codes(&missing), vec!["ASSET_BLOB_MISSING"]);
        let directory = verify_asset_record(dir.path(), &json!({"path": "sub"}));
        assert_eq!(codes(&directory), vec!["ASSET_BLOB_NOT_REGULAR"]);
    }

    #[test]
    fn blank_blob_path_and_non_object_are_ignored() {
        let dir = package(&[]);
        assert!(verify_asset_record(dir.path(), &json!({"path": "  "})).is_empty());
        assert!(verify_asset_record(dir.path(), &json!(42)).is_empty());
    }

    #[test]
    fn chunks_reassemble_in_index_order() {
        let dir = package(&[("c1", b"hello "), ("c2", b"world")]);
        let record = json!({
            "size": 11,
            "sha256": hex(b"hello world"),
            "chunks": [
                {"index": 2, "path": "c2", "size": 5},
                {"index": 1, "path": "c1", "size": 6}
            ]
        });
        assert!(verify_asset_record(dir.path(), &record).is_empty());
    }

    #[test]
    fn swapped_chunk_contents_change_the_digest() {
        let dir = package(&[("c1", b"world"), ("c2", b"hello ")]);
        let record = json!({
            "sha256": hex(b"hello world"),
            "chunks": [{"index": 1, "path": "c1"}, {"index": 2, "path": "c2"}]
        });
        assert_eq!(
            codes(&verify_asset_record(dir.path(), &record)),
            vec!["ASSET_DIGEST_MISMATCH"]
        );
    }

    #[test]
    fn gap_blocks_whole_asset_checks() {
        let dir = package(&[("c1", b"a"), ("c3", b"c")]);
        let record = json!({
            "size": 999,
            "sha256": hex(b"nope"),
            "chunks": [{"index": 1, "path": "c1"}, {"index": 3, "path": "c3"}]
        });
        let details = verify_asset_record(dir.path(), &record);
        assert_eq!(codes(&details), vec!["ASSET_CHUNK_INDEX_GAP"]);
        assert_eq!(details[0].message, "Chunk index gap: expected 2, got 3");
    }

    #[test]
    fn invalid_and_duplicate_indices() {
        let dir = package(&[("c1", b"a")]);
        let record = json!({
            "size": 999,
            "chunks": [
                {"index": 0, "path": "c1"},
                {"index": 1, "path": "c1"},
                {"index": 1, "path": "c1"},
                "junk"
            ]
        });
        assert_eq!(
            codes(&verify_asset_record(dir.path(), &record)),
            vec![
                "ASSET_CHUNK_INDEX_INVALID",
                "ASSET_CHUNK_INDEX_DUPLICATE",
                "ASSET_CHUNK_INVALID"
            ]
        );
    }

    #[test]
    fn chunk_path_problems() {
        let dir = package(&[("d/keep", b"k")]);
        let record = json!({
            "chunks": [
                {"index": 1},
                {"index": 2, "path": "/etc/passwd"},
                {"index": 3, "path": "gone"},
                {"index": 4, "path": "d"}
            ]
        });
        assert_eq!(
            codes(&verify_asset_record(dir.path(), &record)),
            vec![
                "ASSET_CHUNK_PATH_MISSING",
                "ASSET_CHUNK_PATH_UNSAFE",
                "ASSET_CHUNK_MISSING",
                "ASSET_CHUNK_NOT_REGULAR"
            ]
        );
    }

    #[test]
    fn chunk_mismatch_keeps_processing_but_blocks_assembly() {
        let dir = package(&[("c1", b"ab"), ("c2", b"cd")]);
        let record = json!({
            "size": 999,
            "chunks": [
                {"index": 1, "path": "c1", "size": 3},
                {"index": 2, "path": "c2", "sha256": hex(b"zz")}
            ]
        });
        assert_eq!(
            codes(&verify_asset_record(dir.path(), &record)),
            vec!["ASSET_CHUNK_SIZE_MISMATCH", "ASSET_CHUNK_DIGEST_MISMATCH"]
        );
    }

    #[test]
    fn reassembled_size_mismatch() {
        let dir = package(&[("c1", b"ab")]);
        let record = json!({"size": 3, "chunks": [{"index": 1, "path": "c1"}]});
        let details = verify_asset_record(dir.path(), &record);
        assert_eq!(codes(&details), vec!["ASSET_SIZE_MISMATCH"]);
        assert_eq!(details[0].message, "Asset size mismatch: 2 != 3");
    }
}
