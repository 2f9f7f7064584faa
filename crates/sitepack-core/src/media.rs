//! # Media Dispatch — Closed Set of Artifact Encodings
//!
//! Maps a catalog `mediaType` string to the validation path it takes.
//! NDJSON kinds carry their record schema and record-level hook, JSON
//! kinds carry their document schema, and everything else is
//! [`MediaKind::Unknown`], which the package validator reports as a
//! warning.

use std::fmt;

/// The fixed set of schemas a SitePack validator consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaName {
    Manifest,
    Catalog,
    Entity,
    AssetIndex,
    ConfigKv,
    Recordset,
    Capabilities,
    TransformPlan,
    ObjectIndex,
    ObjectPassport,
    Envelope,
    VolumeSet,
}

impl SchemaName {
    pub const ALL: [SchemaName; 12] = [
        Self::Manifest,
        Self::Catalog,
        Self::Entity,
        Self::AssetIndex,
        Self::ConfigKv,
        Self::Recordset,
        Self::Capabilities,
        Self::TransformPlan,
        Self::ObjectIndex,
        Self::ObjectPassport,
        Self::Envelope,
        Self::VolumeSet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::Catalog => "catalog",
            Self::Entity => "entity",
            Self::AssetIndex => "asset-index",
            Self::ConfigKv => "config-kv",
            Self::Recordset => "recordset",
            Self::Capabilities => "capabilities",
            Self::TransformPlan => "transform-plan",
            Self::ObjectIndex => "object-index",
            Self::ObjectPassport => "object-passport",
            Self::Envelope => "envelope",
            Self::VolumeSet => "volume-set",
        }
    }

    /// File name of the schema document, e.g. `asset-index.schema.json`.
    pub fn file_name(&self) -> String {
        format!("{}.schema.json", self.as_str())
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra per-record processing for an NDJSON artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordHook {
    None,
    /// Verify the blob or chunks each asset-index record points at.
    AssetBlobs,
}

/// How an artifact of a given media type is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Ndjson { schema: SchemaName, hook: RecordHook },
    Json { schema: SchemaName },
    Unknown,
}

pub const ENTITY_GRAPH_NDJSON: &str = "application/vnd.sitepack.entity-graph+ndjson";
pub const ASSET_INDEX_NDJSON: &str = "application/vnd.sitepack.asset-index+ndjson";
pub const CONFIG_KV_NDJSON: &str = "application/vnd.sitepack.config-kv+ndjson";
pub const RECORDSET_NDJSON: &str = "application/vnd.sitepack.recordset+ndjson";
pub const CAPABILITIES_JSON: &str = "application/vnd.sitepack.capabilities+json";
pub const TRANSFORM_PLAN_JSON: &str = "application/vnd.sitepack.transform-plan+json";
pub const OBJECT_INDEX_JSON: &str = "application/vnd.sitepack.object-index+json";
pub const OBJECT_PASSPORT_JSON: &str = "application/vnd.sitepack.object-passport+json";

impl MediaKind {
    pub fn classify(media_type: &str) -> Self {
        match media_type {
            ENTITY_GRAPH_NDJSON => Self::ndjson(SchemaName::Entity),
            ASSET_INDEX_NDJSON => Self::Ndjson {
                schema: SchemaName::AssetIndex,
                hook: RecordHook::AssetBlobs,
            },
            CONFIG_KV_NDJSON => Self::ndjson(SchemaName::ConfigKv),
            RECORDSET_NDJSON => Self::ndjson(SchemaName::Recordset),
            CAPABILITIES_JSON => Self::Json {
                schema: SchemaName::Capabilities,
            },
            TRANSFORM_PLAN_JSON => Self::Json {
                schema: SchemaName::TransformPlan,
            },
            OBJECT_INDEX_JSON => Self::Json {
                schema: SchemaName::ObjectIndex,
            },
            OBJECT_PASSPORT_JSON => Self::Json {
                schema: SchemaName::ObjectPassport,
            },
            _ => Self::Unknown,
        }
    }

    fn ndjson(schema: SchemaName) -> Self {
        Self::Ndjson {
            schema,
            hook: RecordHook::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_index_carries_blob_hook() {
        assert_eq!(
            MediaKind::classify(ASSET_INDEX_NDJSON),
            MediaKind::Ndjson {
                schema: SchemaName::AssetIndex,
                hook: RecordHook::AssetBlobs
            }
        );
    }

    #[test]
    fn other_ndjson_kinds_have_no_hook() {
        for (mt, schema) in [
            (ENTITY_GRAPH_NDJSON, SchemaName::Entity),
            (CONFIG_KV_NDJSON, SchemaName::ConfigKv),
            (RECORDSET_NDJSON, SchemaName::Recordset),
        ] {
            assert_eq!(
                MediaKind::classify(mt),
                MediaKind::Ndjson {
                    schema,
                    hook: RecordHook::None
                }
            );
        }
    }

    #[test]
    fn json_kinds() {
        assert_eq!(
            MediaKind::classify(OBJECT_PASSPORT_JSON),
            MediaKind::Json {
                schema: SchemaName::ObjectPassport
            }
        );
    }

    #[test]
    fn unknown_is_not_an_error() {
        assert_eq!(MediaKind::classify("text/plain"), MediaKind::Unknown);
        assert_eq!(MediaKind::classify(""), MediaKind::Unknown);
    }

    #[test]
    fn schema_file_names() {
        assert_eq!(SchemaName::ConfigKv.file_name(), "config-kv.schema.json");
        assert_eq!(SchemaName::ALL.len(), 12);
    }
}
