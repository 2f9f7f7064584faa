//! # Volume Set Builder
//!
//! Splits an unpacked package into numbered zip volumes plus a
//! `sitepack.volumes.json` descriptor, and extracts such a set back into
//! a directory.
//!
//! ## Packing
//!
//! Volume 1 always starts with the manifest and the catalog. The other
//! files follow sorted by relative path and are appended greedily; a new
//! volume starts when the next file would push the current one past
//! `max_part_size`. Sizes are measured on the uncompressed files, and the
//! written archive is checked against the limit again.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sitepack_core::media::ASSET_INDEX_NDJSON;
use sitepack_core::model::non_blank;
use sitepack_core::safe_path::{self, normalize_relative};
use sitepack_core::{AssetIndexRecord, Catalog, ChunkSlot, Manifest, VolumeSetDescriptor};
use sitepack_crypto::digest_file_hex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::{extract_archive, UnsafeEntryPolicy};
use crate::document::read_json;
use crate::error::VolumeBuildError;
use crate::package::{CATALOG_FILE, MANIFEST_FILE};
use crate::volumes::VOLUMES_FILE;

pub const DEFAULT_MAX_PART_SIZE: u64 = 104_857_600;
pub const DEFAULT_BASE_NAME: &str = "sitepack";

/// Format version written into new descriptors.
const FORMAT_VERSION: &str = "0.4.0";

#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub max_part_size: u64,
    /// Overrides `manifest.package.id` and the directory name.
    pub package_id: Option<String>,
    pub base_name: String,
    /// Replace existing volume files and descriptor.
    pub overwrite: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            max_part_size: DEFAULT_MAX_PART_SIZE,
            package_id: None,
            base_name: DEFAULT_BASE_NAME.to_string(),
            overwrite: false,
        }
    }
}

/// One written volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltVolume {
    pub index: u64,
    pub file: String,
    pub size: u64,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct CreatedVolumeSet {
    pub descriptor_path: PathBuf,
    pub package_id: String,
    pub volumes: Vec<BuiltVolume>,
}

// ---------------------------------------------------------------------------
// Descriptor document
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorDoc<'a> {
    spec: SpecRef<'a>,
    kind: &'a str,
    package_id: &'a str,
    container: &'a str,
    max_part_size: u64,
    bootstrap: Bootstrap,
    volumes: Vec<DescriptorVolume<'a>>,
}

#[derive(Serialize)]
struct SpecRef<'a> {
    name: &'a str,
    version: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Bootstrap {
    volume_index: u64,
    contains_manifest: bool,
    contains_catalog: bool,
}

#[derive(Serialize)]
struct DescriptorVolume<'a> {
    index: u64,
    count: u64,
    file: &'a str,
    size: u64,
    sha256: &'a str,
}

// ---------------------------------------------------------------------------
// File collection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PackageFile {
    rel: String,
    abs: PathBuf,
    size: u64,
}

/// Gathers every file a package references, keyed by normalized
/// relative path. Problems are collected rather than returned early.
struct Collector<'p> {
    root: &'p Path,
    files: BTreeMap<String, PackageFile>,
    errors: Vec<String>,
}

impl<'p> Collector<'p> {
    fn new(root: &'p Path) -> Self {
        Self {
            root,
            files: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    fn add(&mut self, declared: &str) {
        let abs = match safe_path::resolve(self.root, declared) {
            Ok(p) => p,
            Err(e) => {
                self.errors.push(format!("Unsafe path: {declared} ({e})"));
                return;
            }
        };
        let rel = normalize_relative(declared);
        let meta = match fs::metadata(&abs) {
            Ok(m) => m,
            Err(_) => {
                self.errors.push(format!("Missing file: {rel}"));
                return;
            }
        };
        if !meta.is_file() {
            self.errors.push(format!("Not a regular file: {rel}"));
            return;
        }
        self.files.entry(rel.clone()).or_insert(PackageFile {
            rel,
            abs,
            size: meta.len(),
        });
    }

    /// Add the blob and chunk paths referenced by an asset-index stream.
    fn add_asset_index(&mut self, declared: &str) {
        let abs = match safe_path::resolve(self.root, declared) {
            Ok(p) => p,
            Err(e) => {
                self.errors
                    .push(format!("Unsafe asset-index path: {declared} ({e})"));
                return;
            }
        };
        let file = match File::open(&abs) {
            Ok(f) => f,
            Err(_) => {
                self.errors
                    .push(format!("Asset-index file not found: {declared}"));
                return;
            }
        };

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line_no = idx + 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    self.errors
                        .push(format!("Failed to read asset-index {declared}: {e}"));
                    return;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    self.errors.push(format!(
                        "Asset-index JSON error in {declared} line {line_no}: {e}"
                    ));
                    continue;
                }
            };
            let Some(record) = AssetIndexRecord::from_value(&value) else {
                continue;
            };
            if let Some(path) = non_blank(record.path.as_deref()) {
                self.add(path);
            }
            for slot in record.chunks.iter().flatten() {
                if let ChunkSlot::Entry(chunk) = slot {
                    if let Some(path) = non_blank(chunk.path.as_deref()) {
                        self.add(path);
                    }
                }
            }
        }
    }
}

struct Collected {
    manifest: Manifest,
    files: BTreeMap<String, PackageFile>,
}

fn collect_package_files(package_dir: &Path) -> Result<Collected, VolumeBuildError> {
    let manifest_path = package_dir.join(MANIFEST_FILE);
    let catalog_path = package_dir.join(CATALOG_FILE);

    let mut errors = Vec::new();
    for (path, name) in [(&manifest_path, MANIFEST_FILE), (&catalog_path, CATALOG_FILE)] {
        if !path.exists() {
            errors.push(format!("{name} not found"));
        }
    }
    if !errors.is_empty() {
        return Err(VolumeBuildError::Collect(errors));
    }

    let manifest = read_json(&manifest_path)
        .map_err(|e| errors.push(format!("Failed to read manifest: {e}")))
        .ok();
    let catalog = read_json(&catalog_path)
        .map_err(|e| errors.push(format!("Failed to read catalog: {e}")))
        .ok();
    let (Some(manifest), Some(catalog)) = (manifest, catalog) else {
        return Err(VolumeBuildError::Collect(errors));
    };
    let manifest = Manifest::from_value(&manifest);
    let catalog = Catalog::from_value(&catalog);

    let mut collector = Collector::new(package_dir);
    collector.add(MANIFEST_FILE);
    collector.add(CATALOG_FILE);
    for artifact in &catalog.artifacts {
        if let Some(path) = non_blank(artifact.path.as_deref()) {
            collector.add(path);
        }
    }
    for artifact in &catalog.artifacts {
        if artifact.media_type.as_deref() != Some(ASSET_INDEX_NDJSON) {
            continue;
        }
        if let Some(path) = artifact.path.as_deref() {
            collector.add_asset_index(path);
        }
    }

    if !collector.errors.is_empty() {
        return Err(VolumeBuildError::Collect(collector.errors));
    }
    Ok(Collected {
        manifest,
        files: collector.files,
    })
}

// ---------------------------------------------------------------------------
// Packing
// ---------------------------------------------------------------------------

fn plan_volumes(
    mut files: BTreeMap<String, PackageFile>,
    max: u64,
) -> Result<Vec<Vec<PackageFile>>, VolumeBuildError> {
    let mut current = Vec::new();
    let mut missing = Vec::new();
    for name in [MANIFEST_FILE, CATALOG_FILE] {
        match files.remove(name) {
            Some(f) => current.push(f),
            None => missing.push(name),
        }
    }
    if !missing.is_empty() {
        return Err(VolumeBuildError::Collect(vec![format!(
            "Missing required files: {}",
            missing.join(", ")
        )]));
    }

    let mut current_size: u64 = current.iter().map(|f: &PackageFile| f.size).sum();
    if current_size > max {
        return Err(VolumeBuildError::BootstrapTooLarge {
            size: current_size,
            max,
        });
    }

    let mut volumes = Vec::new();
    for file in files.into_values() {
        if file.size > max {
            return Err(VolumeBuildError::FileTooLarge {
                path: file.rel,
                size: file.size,
                max,
            });
        }
        if current_size + file.size > max {
            volumes.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size += file.size;
        current.push(file);
    }
    if !current.is_empty() {
        volumes.push(current);
    }
    Ok(volumes)
}

fn write_volume(entries: &[PackageFile], out: &Path) -> Result<(), VolumeBuildError> {
    let mut zip = ZipWriter::new(File::create(out)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for entry in entries {
        zip.start_file(entry.rel.as_str(), options)?;
        let mut source = File::open(&entry.abs)?;
        io::copy(&mut source, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

/// Split the package at `package_dir` into volumes under `out_dir`.
pub fn create_volumes(
    package_dir: &Path,
    out_dir: &Path,
    options: &CreateOptions,
) -> Result<CreatedVolumeSet, VolumeBuildError> {
    let max = options.max_part_size;
    if max == 0 {
        return Err(VolumeBuildError::InvalidMaxPartSize);
    }

    let Collected { manifest, files } = collect_package_files(package_dir)?;
    let package_id = non_blank(options.package_id.as_deref())
        .or(non_blank(manifest.package_id.as_deref()))
        .map(str::to_string)
        .or_else(|| {
            package_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| options.base_name.clone());

    let planned = plan_volumes(files, max)?;
    fs::create_dir_all(out_dir)?;

    let mut volumes = Vec::with_capacity(planned.len());
    for (i, entries) in planned.iter().enumerate() {
        let index = i as u64 + 1;
        let file = format!("{}.part{index}.sitepack", options.base_name);
        let path = out_dir.join(&file);
        if path.exists() {
            if !options.overwrite {
                return Err(VolumeBuildError::OutputExists(path));
            }
            fs::remove_file(&path)?;
        }

        write_volume(entries, &path)?;
        let size = fs::metadata(&path)?.len();
        if size > max {
            return Err(VolumeBuildError::VolumeTooLarge { file, size, max });
        }
        let sha256 = digest_file_hex(&path)?;
        tracing::debug!(file = %file, files = entries.len(), size, "volume written");
        volumes.push(BuiltVolume {
            index,
            file,
            size,
            sha256,
        });
    }

    let descriptor_path = out_dir.join(VOLUMES_FILE);
    if descriptor_path.exists() && !options.overwrite {
        return Err(VolumeBuildError::OutputExists(descriptor_path));
    }
    let count = volumes.len() as u64;
    let doc = DescriptorDoc {
        spec: SpecRef {
            name: "sitepack",
            version: FORMAT_VERSION,
        },
        kind: "volume-set",
        package_id: &package_id,
        container: "zip",
        max_part_size: max,
        bootstrap: Bootstrap {
            volume_index: 1,
            contains_manifest: true,
            contains_catalog: true,
        },
        volumes: volumes
            .iter()
            .map(|v| DescriptorVolume {
                index: v.index,
                count,
                file: &v.file,
                size: v.size,
                sha256: &v.sha256,
            })
            .collect(),
    };
    let mut body = serde_json::to_string_pretty(&doc)?;
    body.push('\n');
    fs::write(&descriptor_path, body)?;

    tracing::info!(
        package_id = %package_id,
        volumes = volumes.len(),
        descriptor = %descriptor_path.display(),
        "volume set created"
    );
    Ok(CreatedVolumeSet {
        descriptor_path,
        package_id,
        volumes,
    })
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract the set described by `descriptor_path` into `out_dir`, in
/// ascending `index` order. An unsafe entry name aborts the extraction.
/// Returns the volume files in extraction order.
pub fn extract_volumes(
    descriptor_path: &Path,
    out_dir: &Path,
    overwrite: bool,
) -> Result<Vec<String>, VolumeBuildError> {
    if !descriptor_path.exists() {
        return Err(VolumeBuildError::DescriptorNotFound(
            descriptor_path.to_path_buf(),
        ));
    }
    let raw = fs::read_to_string(descriptor_path)?;
    let descriptor = VolumeSetDescriptor::from_value(&serde_json::from_str(&raw)?);
    if descriptor.volumes.is_empty() {
        return Err(VolumeBuildError::InvalidDescriptor(
            "Volume set contains no volumes".to_string(),
        ));
    }
    if !overwrite && out_dir.exists() && fs::read_dir(out_dir)?.next().is_some() {
        return Err(VolumeBuildError::OutputNotEmpty(out_dir.to_path_buf()));
    }
    fs::create_dir_all(out_dir)?;

    let base_dir = crate::persist::parent_dir(descriptor_path);
    let mut ordered = Vec::with_capacity(descriptor.volumes.len());
    for entry in &descriptor.volumes {
        let Some(entry) = entry else {
            return Err(VolumeBuildError::InvalidDescriptor(
                "Volume entry must be an object".to_string(),
            ));
        };
        let Some(file) = non_blank(entry.file.as_deref()) else {
            return Err(VolumeBuildError::InvalidDescriptor(
                "Volume file entry is missing".to_string(),
            ));
        };
        let path = safe_path::resolve(&base_dir, file)
            .map_err(|_| VolumeBuildError::UnsafeVolumePath(file.to_string()))?;
        if !path.exists() {
            return Err(VolumeBuildError::VolumeNotFound(file.to_string()));
        }
        ordered.push((entry.sort_key(), file.to_string(), path));
    }
    ordered.sort_by_key(|(key, _, _)| *key);

    let mut extracted = Vec::with_capacity(ordered.len());
    for (_, file, path) in ordered {
        let outcome = extract_archive(&path, out_dir, UnsafeEntryPolicy::Abort)?;
        tracing::debug!(file = %file, files = outcome.files_written, "volume extracted");
        extracted.push(file);
    }
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_zip;
    use serde_json::{json, Value};

    fn write(root: &Path, name: &str, content: &[u8]) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Three 450-byte artifacts plus an asset index with one blob and two
    /// chunks.
    fn sample_package() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            MANIFEST_FILE,
            json!({"package": {"id": "demo"}, "artifacts": ["a", "b", "c"]})
                .to_string()
                .as_bytes(),
        );
        write(
            root,
            CATALOG_FILE,
            json!({"artifacts": [
                {"id": "a", "mediaType": "text/plain", "path": "data/a.txt"},
                {"id": "b", "mediaType": "text/plain", "path": "data/b.txt"},
                {"id": "c", "mediaType": "text/plain", "path": "./data//c.txt"}
            ]})
            .to_string()
            .as_bytes(),
        );
        for name in ["a", "b", "c"] {
            write(root, &format!("data/{name}.txt"), name.repeat(450).as_bytes());
        }
        dir
    }

    fn read_descriptor(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn packs_bootstrap_first_then_greedily() {
        let pkg = sample_package();
        let out = tempfile::tempdir().unwrap();
        let options = CreateOptions {
            max_part_size: 1000,
            ..Default::default()
        };
        let created = create_volumes(pkg.path(), out.path(), &options).unwrap();

        assert_eq!(created.package_id, "demo");
        assert_eq!(created.volumes.len(), 2);
        assert_eq!(created.volumes[0].file, "sitepack.part1.sitepack");

        let doc = read_descriptor(&created.descriptor_path);
        assert_eq!(doc["kind"], "volume-set");
        assert_eq!(doc["container"], "zip");
        assert_eq!(doc["maxPartSize"], 1000);
        assert_eq!(doc["bootstrap"]["containsManifest"], true);
        assert_eq!(doc["volumes"][1]["index"], 2);
        assert_eq!(doc["volumes"][1]["count"], 2);
        assert_eq!(doc["volumes"][0]["sha256"], created.volumes[0].sha256.as_str());
        assert!(fs::read_to_string(&created.descriptor_path)
            .unwrap()
            .ends_with("}\n"));
    }

    #[test]
    fn round_trip_through_extract() {
        let pkg = sample_package();
        let out = tempfile::tempdir().unwrap();
        let options = CreateOptions {
            max_part_size: 1000,
            ..Default::default()
        };
        let created = create_volumes(pkg.path(), out.path(), &options).unwrap();

        let restored = out.path().join("restored");
        let order = extract_volumes(&created.descriptor_path, &restored, false).unwrap();
        assert_eq!(order.len(), 2);
        for name in ["a", "b", "c"] {
            let rel = format!("data/{name}.txt");
            assert_eq!(
                fs::read(restored.join(&rel)).unwrap(),
                fs::read(pkg.path().join(&rel)).unwrap()
            );
        }
        assert!(restored.join(MANIFEST_FILE).is_file());

        let again = extract_volumes(&created.descriptor_path, &restored, false).unwrap_err();
        assert!(matches!(again, VolumeBuildError::OutputNotEmpty(_)));
        extract_volumes(&created.descriptor_path, &restored, true).unwrap();
    }

    #[test]
    fn asset_index_references_are_collected() {
        let pkg = tempfile::tempdir().unwrap();
        let root = pkg.path();
        write(root, MANIFEST_FILE, br#"{"artifacts": ["assets"]}"#);
        write(
            root,
            CATALOG_FILE,
            json!({"artifacts": [{"id": "assets", "mediaType": ASSET_INDEX_NDJSON, "path": "assets.ndjson"}]})
                .to_string()
                .as_bytes(),
        );
        write(
            root,
            "assets.ndjson",
            b"{\"path\":\"img/logo.png\"}\n\n{\"chunks\":[{\"index\":1,\"path\":\"big/1\"},{\"index\":2,\"path\":\"big/2\"}]}\n",
        );
        for name in ["img/logo.png", "big/1", "big/2"] {
            write(root, name, b"x");
        }

        let collected = collect_package_files(root).unwrap();
        let names: Vec<_> = collected.files.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "assets.ndjson",
                "big/1",
                "big/2",
                "img/logo.png",
                "sitepack.catalog.json",
                "sitepack.manifest.json"
            ]
        );
    }

    #[test]
    fn collection_errors_are_joined() {
        let pkg = tempfile::tempdir().unwrap();
        let root = pkg.path();
        write(root, MANIFEST_FILE, br#"{"artifacts": []}"#);
        write(
            root,
            CATALOG_FILE,
            br#"{"artifacts": [{"id": "x", "path": "../x"}, {"id": "y", "path": "y.txt"}]}"#,
        );
        let err = create_volumes(root, &root.join("out"), &CreateOptions::default()).unwrap_err();
        match err {
            VolumeBuildError::Collect(messages) => {
                assert_eq!(messages.len(), 2);
                assert!(messages[0].starts_with("Unsafe path: ../x ("));
                assert_eq!(messages[1], "Missing file: y.txt");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_bootstrap_documents() {
        let pkg = tempfile::tempdir().unwrap();
        let err = create_volumes(pkg.path(), &pkg.path().join("out"), &CreateOptions::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "sitepack.manifest.json not found\nsitepack.catalog.json not found"
        );
    }

    #[test]
    fn size_limits() {
        let pkg = sample_package();
        let out = tempfile::tempdir().unwrap();

        let tiny = CreateOptions {
            max_part_size: 10,
            ..Default::default()
        };
        assert!(matches!(
            create_volumes(pkg.path(), out.path(), &tiny),
            Err(VolumeBuildError::BootstrapTooLarge { .. })
        ));

        let small = CreateOptions {
            max_part_size: 400,
            ..Default::default()
        };
        assert!(matches!(
            create_volumes(pkg.path(), out.path(), &small),
            Err(VolumeBuildError::FileTooLarge { ref path, .. }) if path == "data/a.txt"
        ));

        let zero = CreateOptions {
            max_part_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            create_volumes(pkg.path(), out.path(), &zero),
            Err(VolumeBuildError::InvalidMaxPartSize)
        ));
    }

    #[test]
    fn existing_output_requires_overwrite() {
        let pkg = sample_package();
        let out = tempfile::tempdir().unwrap();
        let options = CreateOptions::default();
        create_volumes(pkg.path(), out.path(), &options).unwrap();

        let err = create_volumes(pkg.path(), out.path(), &options).unwrap_err();
        assert!(matches!(err, VolumeBuildError::OutputExists(_)));

        let overwrite = CreateOptions {
            overwrite: true,
            ..Default::default()
        };
        create_volumes(pkg.path(), out.path(), &overwrite).unwrap();
    }

    #[test]
    fn extract_rejects_unsafe_entries_and_paths() {
        let dir = tempfile::tempdir().unwrap();
        write_zip(&dir.path().join("p1.sitepack"), &[("../evil", b"x")]);
        let descriptor = dir.path().join(VOLUMES_FILE);
        fs::write(
            &descriptor,
            json!({"volumes": [{"index": 1, "file": "p1.sitepack"}]}).to_string(),
        )
        .unwrap();
        let err = extract_volumes(&descriptor, &dir.path().join("out"), false).unwrap_err();
        assert_eq!(err.to_string(), "Unsafe entry path: ../evil");

        fs::write(
            &descriptor,
            json!({"volumes": [{"index": 1, "file": "../p1.sitepack"}]}).to_string(),
        )
        .unwrap();
        let err = extract_volumes(&descriptor, &dir.path().join("out2"), false).unwrap_err();
        assert!(matches!(err, VolumeBuildError::UnsafeVolumePath(_)));

        fs::write(&descriptor, json!({"volumes": []}).to_string()).unwrap();
        let err = extract_volumes(&descriptor, &dir.path().join("out3"), false).unwrap_err();
        assert_eq!(err.to_string(), "Volume set contains no volumes");
    }
}
