//! # Document Views — Lenient Typed Access to Package Documents
//!
//! Each view is built from an already-parsed `serde_json::Value` with
//! `from_value`. Fields the validator reads are explicit `Option`s: a
//! field that is absent or has the wrong JSON type becomes `None`, never
//! an error. Shape problems are reported separately by schema
//! validation; the views only decide what the cross-checks can see.
//!
//! An absent optional field is never itself a mismatch. For example a
//! passport without `objectRef` yields `object_ref_id == None` and the
//! identity checks that depend on it are not run.

use std::collections::BTreeMap;

use serde_json::Value;

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn u64_field(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(|v| v.as_u64())
}

/// A non-negative whole number, written as an integer, an integral float
/// (`1.0`), or a decimal string (`"1"`).
fn index_field(value: &Value, key: &str) -> Option<u64> {
    match value.get(key)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Returns the string if it contains anything other than whitespace.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Named artifact subsets declared by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Profiles {
    /// Flat list of profile names. Selecting one keeps the full manifest
    /// artifact list.
    List(Vec<String>),
    /// Profile name to artifact ids. A value that is not an array is
    /// recorded as `None`.
    Map(BTreeMap<String, Option<Vec<String>>>),
    /// Present but neither an array nor an object.
    Invalid,
}

/// `sitepack.manifest.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub artifacts: Vec<String>,
    /// `None` when the manifest has no `profiles` key.
    pub profiles: Option<Profiles>,
    /// `package.id`, used to name volume sets.
    pub package_id: Option<String>,
}

impl Manifest {
    pub fn from_value(value: &Value) -> Self {
        let profiles = value.get("profiles").map(|p| match p {
            Value::Array(_) => Profiles::List(string_list(Some(p))),
            Value::Object(map) => Profiles::Map(
                map.iter()
                    .map(|(name, ids)| {
                        let list = ids.is_array().then(|| string_list(Some(ids)));
                        (name.clone(), list)
                    })
                    .collect(),
            ),
            _ => Profiles::Invalid,
        });

        Self {
            artifacts: string_list(value.get("artifacts")),
            profiles,
            package_id: value
                .get("package")
                .and_then(|p| p.get("id"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One catalog entry. Every field is optional at this layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub id: Option<String>,
    pub media_type: Option<String>,
    pub path: Option<String>,
    pub size: Option<u64>,
    /// Declared `sha256:<hex>` digest, compared verbatim.
    pub digest: Option<String>,
}

impl ArtifactDescriptor {
    pub fn from_value(value: &Value) -> Self {
        Self {
            id: str_field(value, "id"),
            media_type: str_field(value, "mediaType"),
            path: str_field(value, "path"),
            size: u64_field(value, "size"),
            digest: str_field(value, "digest").filter(|d| !d.is_empty()),
        }
    }
}

/// `sitepack.catalog.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    /// Entries in catalog order. Non-object entries keep their position
    /// as an all-`None` descriptor.
    pub artifacts: Vec<ArtifactDescriptor>,
}

impl Catalog {
    pub fn from_value(value: &Value) -> Self {
        let artifacts = value
            .get("artifacts")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().map(ArtifactDescriptor::from_value).collect())
            .unwrap_or_default();
        Self { artifacts }
    }

    /// Artifact ids present in the catalog.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.artifacts.iter().filter_map(|a| a.id.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Asset index records
// ---------------------------------------------------------------------------

/// A chunk entry as declared. `index` is `None` when it is not a whole
/// non-negative number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkEntry {
    pub index: Option<u64>,
    pub path: Option<String>,
    pub size: Option<u64>,
    pub sha256: Option<String>,
}

/// Position in a record's `chunks` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSlot {
    Entry(ChunkEntry),
    NotObject,
}

/// One line of an asset-index NDJSON stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetIndexRecord {
    pub path: Option<String>,
    pub size: Option<u64>,
    /// Declared whole-asset digest, lowercased.
    pub sha256: Option<String>,
    /// `Some` when the record uses the chunked form.
    pub chunks: Option<Vec<ChunkSlot>>,
}

impl AssetIndexRecord {
    /// Returns `None` when the record is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let chunks = value.get("chunks").and_then(|v| v.as_array()).map(|items| {
            items
                .iter()
                .map(|c| {
                    if c.is_object() {
                        ChunkSlot::Entry(ChunkEntry {
                            index: index_field(c, "index"),
                            path: str_field(c, "path"),
                            size: u64_field(c, "size"),
                            sha256: str_field(c, "sha256"),
                        })
                    } else {
                        ChunkSlot::NotObject
                    }
                })
                .collect()
        });
        Some(Self {
            path: str_field(value, "path"),
            size: u64_field(value, "size"),
            sha256: str_field(value, "sha256").map(|s| s.to_lowercase()),
            chunks,
        })
    }
}

// ---------------------------------------------------------------------------
// Object graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectIndexEntry {
    pub id: Option<String>,
    pub passport_path: Option<String>,
}

/// An object-index document. `None` entries were not JSON objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectIndex {
    pub objects: Vec<Option<ObjectIndexEntry>>,
}

impl ObjectIndex {
    pub fn from_value(value: &Value) -> Self {
        let objects = value
            .get("objects")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|o| {
                        o.is_object().then(|| ObjectIndexEntry {
                            id: str_field(o, "id"),
                            passport_path: str_field(o, "passportPath"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { objects }
    }
}

/// A `datasets` selector inside a passport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSelector {
    pub artifact_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPassport {
    pub id: Option<String>,
    pub object_ref_id: Option<String>,
    /// `None` entries were not strings.
    pub artifacts: Vec<Option<String>>,
    /// `None` entries were not objects.
    pub datasets: Vec<Option<DatasetSelector>>,
}

impl ObjectPassport {
    pub fn from_value(value: &Value) -> Self {
        let artifacts = value
            .get("artifacts")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().map(|a| a.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let datasets = value
            .get("datasets")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|d| {
                        d.is_object().then(|| DatasetSelector {
                            artifact_id: str_field(d, "artifactId"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            id: str_field(value, "id"),
            object_ref_id: value
                .get("objectRef")
                .and_then(|r| r.get("id"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            artifacts,
            datasets,
        }
    }
}

// ---------------------------------------------------------------------------
// Volume sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeEncryption {
    pub scheme: Option<String>,
    pub envelope_file: Option<String>,
}

impl VolumeEncryption {
    pub fn is_age(&self) -> bool {
        self.scheme.as_deref() == Some("age")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeEntry {
    /// Reconstruction order. A missing or non-integer index sorts as 0.
    pub index: Option<i64>,
    pub file: Option<String>,
    pub size: Option<u64>,
    pub sha256: Option<String>,
    pub encryption: Option<VolumeEncryption>,
}

impl VolumeEntry {
    pub fn sort_key(&self) -> i64 {
        self.index.unwrap_or(0)
    }
}

/// `sitepack.volumes.json`. `None` entries were not JSON objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeSetDescriptor {
    pub volumes: Vec<Option<VolumeEntry>>,
}

impl VolumeSetDescriptor {
    pub fn from_value(value: &Value) -> Self {
        let volumes = value
            .get("volumes")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .map(|v| {
                        v.is_object().then(|| VolumeEntry {
                            index: v.get("index").and_then(|i| i.as_i64()),
                            file: str_field(v, "file"),
                            size: u64_field(v, "size"),
                            sha256: str_field(v, "sha256"),
                            encryption: v.get("encryption").filter(|e| e.is_object()).map(|e| {
                                VolumeEncryption {
                                    scheme: str_field(e, "scheme"),
                                    envelope_file: str_field(e, "envelopeFile"),
                                }
                            }),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self { volumes }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The parts of an `*.enc.json` header the validator reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub payload_file: Option<String>,
}

impl EnvelopeHeader {
    pub fn from_value(value: &Value) -> Self {
        Self {
            payload_file: value
                .get("payload")
                .and_then(|p| p.get("file"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}
