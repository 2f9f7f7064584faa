//! # Schema Validation
//!
//! Runtime validation of SitePack documents against the twelve JSON
//! Schema (Draft 2020-12) definitions named by [`SchemaName`].
//!
//! ## Schema Resolution
//!
//! Schemas carry `$id` URIs of the form
//! `https://schemas.sitepack.dev/v0.4/<filename>`. Every schema is
//! registered with a local retriever under that URI and under its bare
//! filename, so `$ref`s resolve without network access. Unknown URIs
//! resolve to the permissive empty schema.
//!
//! ## Compilation
//!
//! All twelve validators are compiled once when a [`SchemaValidator`] is
//! constructed. Validation itself never fails to run: it returns a
//! possibly empty list of [`Violation`]s.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use jsonschema::{Retrieve, Uri, ValidationOptions, Validator};
use serde_json::Value;
use sitepack_core::SchemaName;
use thiserror::Error;

const SCHEMA_URI_PREFIX: &str = "https://schemas.sitepack.dev/v0.4/";

/// Local retriever that resolves `$ref` URIs against the loaded schemas.
struct LocalSchemaRetriever {
    schemas_by_uri: HashMap<String, Value>,
}

impl Retrieve for LocalSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();

        if let Some(value) = self.schemas_by_uri.get(uri_str) {
            return Ok(value.clone());
        }

        let filename = uri_str.rsplit('/').next().unwrap_or(uri_str);
        if let Some(value) = self.schemas_by_uri.get(filename) {
            return Ok(value.clone());
        }

        Ok(serde_json::json!({}))
    }
}

/// Error loading or compiling schemas.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// A schema file could not be read or parsed.
    #[error("schema load error for '{schema_name}': {reason}")]
    SchemaLoadError { schema_name: String, reason: String },

    /// A schema parsed but could not be compiled.
    #[error("validator build error for schema '{schema_name}': {reason}")]
    ValidatorBuildError { schema_name: String, reason: String },
}

/// A single validation violation with structured context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer to the violating value in the instance. Empty for the
    /// document root.
    pub instance_path: String,
    /// JSON Pointer within the schema that triggered the error.
    pub schema_path: String,
    pub message: String,
}

impl Violation {
    /// `<instancePath or "/"> <message>`, the form used in reports.
    pub fn rendered(&self) -> String {
        let path = if self.instance_path.is_empty() {
            "/"
        } else {
            self.instance_path.as_str()
        };
        format!("{path} {}", self.message)
    }
}

/// The capability the validation engine consumes: check a parsed
/// document against a named schema.
pub trait SchemaGate {
    /// All violations of `schema` by `document`. Empty means valid.
    fn violations(&self, schema: SchemaName, document: &Value) -> Vec<Violation>;
}

/// The built-in schema set, compiled into the binary.
fn builtin_sources() -> [(SchemaName, &'static str); 12] {
    [
        (SchemaName::Manifest, include_str!("../schemas/manifest.schema.json")),
        (SchemaName::Catalog, include_str!("../schemas/catalog.schema.json")),
        (SchemaName::Entity, include_str!("../schemas/entity.schema.json")),
        (SchemaName::AssetIndex, include_str!("../schemas/asset-index.schema.json")),
        (SchemaName::ConfigKv, include_str!("../schemas/config-kv.schema.json")),
        (SchemaName::Recordset, include_str!("../schemas/recordset.schema.json")),
        (SchemaName::Capabilities, include_str!("../schemas/capabilities.schema.json")),
        (SchemaName::TransformPlan, include_str!("../schemas/transform-plan.schema.json")),
        (SchemaName::ObjectIndex, include_str!("../schemas/object-index.schema.json")),
        (SchemaName::ObjectPassport, include_str!("../schemas/object-passport.schema.json")),
        (SchemaName::Envelope, include_str!("../schemas/envelope.schema.json")),
        (SchemaName::VolumeSet, include_str!("../schemas/volume-set.schema.json")),
    ]
}

/// A schema validator backed by the `jsonschema` crate.
///
/// `SchemaValidator` is `Send + Sync`; one instance can serve any number
/// of validation runs.
pub struct SchemaValidator {
    /// Directory the schemas were loaded from, `None` for the built-in set.
    schema_dir: Option<PathBuf>,
    validators: HashMap<SchemaName, Validator>,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema_dir", &self.schema_dir)
            .field("schemas", &self.validators.len())
            .finish()
    }
}

impl SchemaValidator {
    /// Compile the schema set shipped with this crate.
    pub fn builtin() -> Result<Self, SchemaValidationError> {
        let mut schemas = HashMap::new();
        for (name, source) in builtin_sources() {
            schemas.insert(name, parse_schema(name, source)?);
        }
        Self::compile(None, schemas)
    }

    /// Load and compile `<name>.schema.json` for each of the twelve
    /// schemas from `schema_dir`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaLoadError` if the directory or any schema file is
    /// missing or is not valid JSON.
    pub fn from_dir(schema_dir: impl AsRef<Path>) -> Result<Self, SchemaValidationError> {
        let schema_dir = schema_dir.as_ref().to_path_buf();
        if !schema_dir.is_dir() {
            return Err(SchemaValidationError::SchemaLoadError {
                schema_name: schema_dir.display().to_string(),
                reason: "schema directory not found".to_string(),
            });
        }

        let mut schemas = HashMap::new();
        for name in SchemaName::ALL {
            let path = schema_dir.join(name.file_name());
            let content = std::fs::read_to_string(&path).map_err(|e| {
                SchemaValidationError::SchemaLoadError {
                    schema_name: name.file_name(),
                    reason: format!("cannot read {}: {e}", path.display()),
                }
            })?;
            schemas.insert(name, parse_schema(name, &content)?);
        }
        Self::compile(Some(schema_dir), schemas)
    }

    fn compile(
        schema_dir: Option<PathBuf>,
        schemas: HashMap<SchemaName, Value>,
    ) -> Result<Self, SchemaValidationError> {
        let opts = build_options(&schemas);
        let mut validators = HashMap::new();
        for (name, schema) in &schemas {
            let validator =
                opts.build(schema)
                    .map_err(|e| SchemaValidationError::ValidatorBuildError {
                        schema_name: name.file_name(),
                        reason: e.to_string(),
                    })?;
            validators.insert(*name, validator);
        }
        Ok(Self {
            schema_dir,
            validators,
        })
    }

    /// Directory the schemas were loaded from, if not built in.
    pub fn schema_dir(&self) -> Option<&Path> {
        self.schema_dir.as_deref()
    }

}

impl SchemaGate for SchemaValidator {
    fn violations(&self, schema: SchemaName, document: &Value) -> Vec<Violation> {
        let Some(validator) = self.validators.get(&schema) else {
            return vec![Violation {
                instance_path: String::new(),
                schema_path: String::new(),
                message: format!("schema '{schema}' is not loaded"),
            }];
        };
        validator
            .iter_errors(document)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .collect()
    }
}

fn parse_schema(name: SchemaName, source: &str) -> Result<Value, SchemaValidationError> {
    serde_json::from_str(source).map_err(|e| SchemaValidationError::SchemaLoadError {
        schema_name: name.file_name(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Options with Draft 2020-12 and a retriever covering every loaded schema.
fn build_options(schemas: &HashMap<SchemaName, Value>) -> ValidationOptions {
    let mut opts = jsonschema::options();
    opts.with_draft(jsonschema::Draft::Draft202012);

    let mut schemas_by_uri: HashMap<String, Value> = HashMap::new();
    for (name, value) in schemas {
        let filename = name.file_name();
        schemas_by_uri.insert(format!("{SCHEMA_URI_PREFIX}{filename}"), value.clone());
        if let Some(id) = value.get("$id").and_then(|v| v.as_str()) {
            schemas_by_uri.insert(id.to_string(), value.clone());
        }
        schemas_by_uri.insert(filename, value.clone());
    }
    opts.with_retriever(LocalSchemaRetriever { schemas_by_uri });
    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gate() -> SchemaValidator {
        SchemaValidator::builtin().unwrap()
    }

    #[test]
    fn builtin_compiles_all_twelve() {
        let v = gate();
        assert_eq!(v.validators.len(), 12);
        assert!(v.schema_dir().is_none());
    }

    #[test]
    fn valid_manifest_has_no_violations() {
        let doc = json!({"artifacts": ["a1"], "profiles": {"min": ["a1"]}});
        assert!(gate().violations(SchemaName::Manifest, &doc).is_empty());
    }

    #[test]
    fn missing_required_field_is_reported_at_root() {
        let v = gate().violations(SchemaName::Catalog, &json!({}));
        assert_eq!(v.len(), 1);
        assert!(v[0].rendered().starts_with("/ "));
        assert!(v[0].message.contains("artifacts"));
    }

    #[test]
    fn nested_violation_carries_instance_path() {
        let doc = json!({"artifacts": [{"id": "a", "mediaType": "x", "path": "p", "size": -1}]});
        let v = gate().violations(SchemaName::Catalog, &doc);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].instance_path, "/artifacts/0/size");
    }

    #[test]
    fn every_violation_is_listed() {
        let doc = json!({"volumes": [{"index": 0}]});
        let v = gate().violations(SchemaName::VolumeSet, &doc);
        assert!(v.len() >= 2, "expected index and file violations, got {v:?}");
    }

    #[test]
    fn capabilities_accepts_any_object() {
        assert!(gate()
            .violations(SchemaName::Capabilities, &json!({"x": "1234"}))
            .is_empty());
    }

    #[test]
    fn asset_index_requires_path_or_chunks() {
        let g = gate();
        assert!(g.violations(SchemaName::AssetIndex, &json!({"path": "a.bin"})).is_empty());
        assert!(!g.violations(SchemaName::AssetIndex, &json!({"size": 3})).is_empty());
    }

    #[test]
    fn from_dir_loads_copied_schemas() {
        let dir = tempfile::tempdir().unwrap();
        for (name, source) in builtin_sources() {
            std::fs::write(dir.path().join(name.file_name()), source).unwrap();
        }
        let v = SchemaValidator::from_dir(dir.path()).unwrap();
        assert_eq!(v.schema_dir(), Some(dir.path()));
    }

    #[test]
    fn from_dir_rejects_incomplete_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.schema.json"), "{}").unwrap();
        let err = SchemaValidator::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, SchemaValidationError::SchemaLoadError { .. }));
    }

    #[test]
    fn from_dir_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SchemaValidator::from_dir(dir.path().join("absent")).is_err());
    }
}
