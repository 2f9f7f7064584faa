//! # Object Graph Validation
//!
//! Cross-reference checks between object-index artifacts, the passports
//! they point at, and the catalog. Runs once per package, after the
//! catalog loop, and only when the catalog declares an object index.
//!
//! Documents already schema-validated in the catalog loop are not
//! validated again here. Identity checks are independent of each other
//! so one pass reports every inconsistency, and reference checks still
//! run when an identity check fails.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use sitepack_core::media::OBJECT_INDEX_JSON;
use sitepack_core::model::non_blank;
use sitepack_core::{
    safe_path, ArtifactDescriptor, Catalog, Message, ObjectIndex, ObjectIndexEntry,
    ObjectPassport, SchemaName,
};
use sitepack_schema::SchemaGate;

use crate::document::{read_json, schema_messages};

/// Lookups built once over the catalog.
struct CatalogView<'c> {
    ids: HashSet<&'c str>,
    by_path: HashMap<&'c str, &'c ArtifactDescriptor>,
}

impl<'c> CatalogView<'c> {
    fn new(catalog: &'c Catalog) -> Self {
        let by_path = catalog
            .artifacts
            .iter()
            .filter_map(|a| a.path.as_deref().map(|p| (p, a)))
            .collect();
        Self {
            ids: catalog.ids().collect(),
            by_path,
        }
    }
}

/// Validates the object index / passport graph of one package.
pub struct ObjectGraphValidator<'a, G: SchemaGate + ?Sized> {
    gate: &'a G,
}

impl<'a, G: SchemaGate + ?Sized> ObjectGraphValidator<'a, G> {
    pub fn new(gate: &'a G) -> Self {
        Self { gate }
    }

    /// Check every object-index artifact in `catalog`. `validated_ids`
    /// holds the artifact ids the catalog loop already processed.
    pub fn validate(
        &self,
        package_root: &Path,
        catalog: &Catalog,
        validated_ids: &HashSet<String>,
    ) -> Vec<Message> {
        let indexes: Vec<&ArtifactDescriptor> = catalog
            .artifacts
            .iter()
            .filter(|a| a.media_type.as_deref() == Some(OBJECT_INDEX_JSON))
            .collect();
        if indexes.is_empty() {
            return Vec::new();
        }

        let view = CatalogView::new(catalog);
        let mut messages = Vec::new();
        for index in indexes {
            self.check_index(package_root, index, &view, validated_ids, &mut messages);
        }
        tracing::debug!(findings = messages.len(), "object graph checked");
        messages
    }

    fn check_index(
        &self,
        package_root: &Path,
        index: &ArtifactDescriptor,
        view: &CatalogView<'_>,
        validated_ids: &HashSet<String>,
        messages: &mut Vec<Message>,
    ) {
        let Some(declared) = non_blank(index.path.as_deref()) else {
            messages.push(Message::error(
                "OBJECT_INDEX_PATH_MISSING",
                "Object index path is missing",
            ));
            return;
        };
        let resolved = match safe_path::resolve(package_root, declared) {
            Ok(p) => p,
            Err(e) => {
                messages.push(Message::error(e.code(), e.to_string()).with("path", declared));
                return;
            }
        };
        if !resolved.exists() {
            messages.push(
                Message::error("OBJECT_INDEX_MISSING", "Object index file not found")
                    .with("path", declared),
            );
            return;
        }
        let document = match read_json(&resolved) {
            Ok(v) => v,
            Err(e) => {
                messages.push(
                    Message::error(
                        "OBJECT_INDEX_PARSE_ERROR",
                        format!("Failed to read object index: {e}"),
                    )
                    .with("path", declared),
                );
                return;
            }
        };

        let already_validated = index.id.as_ref().is_some_and(|id| validated_ids.contains(id));
        if !already_validated {
            messages.extend(schema_messages(
                self.gate,
                SchemaName::ObjectIndex,
                &document,
                "OBJECT_INDEX_SCHEMA_ERROR",
                &[("path", declared)],
            ));
        }

        for entry in ObjectIndex::from_value(&document).objects {
            match entry {
                Some(entry) => {
                    self.check_object(package_root, &entry, view, validated_ids, messages)
                }
                None => messages.push(Message::error(
                    "OBJECT_INDEX_ENTRY_INVALID",
                    "Object index entry must be an object",
                )),
            }
        }
    }

    fn check_object(
        &self,
        package_root: &Path,
        entry: &ObjectIndexEntry,
        view: &CatalogView<'_>,
        validated_ids: &HashSet<String>,
        messages: &mut Vec<Message>,
    ) {
        let Some(object_id) = non_blank(entry.id.as_deref()) else {
            messages.push(Message::error(
                "OBJECT_INDEX_ENTRY_INVALID",
                "Object id is missing or invalid",
            ));
            return;
        };
        let Some(passport_path) = non_blank(entry.passport_path.as_deref()) else {
            messages.push(
                Message::error(
                    "OBJECT_PASSPORT_PATH_MISSING",
                    format!("passportPath is missing for object '{object_id}'"),
                )
                .with("objectId", object_id),
            );
            return;
        };

        let passport_artifact = view.by_path.get(passport_path).copied();
        if passport_artifact.is_none() {
            messages.push(
                Message::error(
                    "OBJECT_PASSPORT_NOT_IN_CATALOG",
                    format!("passportPath is not listed in catalog: {passport_path}"),
                )
                .with("objectId", object_id)
                .with("passportPath", passport_path),
            );
        }

        let resolved = match safe_path::resolve(package_root, passport_path) {
            Ok(p) => p,
            Err(e) => {
                messages.push(
                    Message::error(e.code(), e.to_string())
                        .with("objectId", object_id)
                        .with("passportPath", passport_path),
                );
                return;
            }
        };
        if !resolved.exists() {
            messages.push(
                Message::error("OBJECT_PASSPORT_MISSING", "Object passport file not found")
                    .with("objectId", object_id)
                    .with("passportPath", passport_path),
            );
            return;
        }
        let document = match read_json(&resolved) {
            Ok(v) => v,
            Err(e) => {
                messages.push(
                    Message::error(
                        "OBJECT_PASSPORT_PARSE_ERROR",
                        format!("Failed to read object passport: {e}"),
                    )
                    .with("objectId", object_id)
                    .with("passportPath", passport_path),
                );
                return;
            }
        };

        // The gate always runs; a passport already reported by the catalog
        // pass only stays silent here.
        let schema_errors = schema_messages(
            self.gate,
            SchemaName::ObjectPassport,
            &document,
            "OBJECT_PASSPORT_SCHEMA_ERROR",
            &[("objectId", object_id), ("passportPath", passport_path)],
        );
        if !schema_errors.is_empty() {
            let already_validated = passport_artifact
                .and_then(|a| a.id.as_ref())
                .is_some_and(|id| validated_ids.contains(id));
            if !already_validated {
                messages.extend(schema_errors);
            }
            return;
        }

        let passport = ObjectPassport::from_value(&document);
        check_identity(object_id, passport_path, &passport, messages);
        check_references(object_id, &passport, view, messages);
    }
}

fn check_identity(
    object_id: &str,
    passport_path: &str,
    passport: &ObjectPassport,
    messages: &mut Vec<Message>,
) {
    let passport_id = passport.id.as_deref();
    let ref_id = passport.object_ref_id.as_deref();
    let base = |code: &str, text: String| {
        Message::error(code, text)
            .with("objectId", object_id)
            .with("passportPath", passport_path)
    };

    if let Some(pid) = passport_id {
        if pid != object_id {
            messages.push(
                base(
                    "OBJECT_PASSPORT_ID_MISMATCH",
                    format!("Passport id does not match object index id: {pid} != {object_id}"),
                )
                .with("passportId", pid),
            );
        }
    }
    if let (Some(pid), Some(rid)) = (passport_id, ref_id) {
        if pid != rid {
            messages.push(
                base(
                    "OBJECT_PASSPORT_ID_MISMATCH",
                    format!("Passport id does not match objectRef.id: {pid} != {rid}"),
                )
                .with("passportId", pid)
                .with("objectRefId", rid),
            );
        }
    }
    if let Some(rid) = ref_id {
        if rid != object_id {
            messages.push(
                base(
                    "OBJECT_PASSPORT_REF_MISMATCH",
                    format!("objectRef.id does not match object index id: {rid} != {object_id}"),
                )
                .with("objectRefId", rid),
            );
        }
    }
}

fn check_references(
    object_id: &str,
    passport: &ObjectPassport,
    view: &CatalogView<'_>,
    messages: &mut Vec<Message>,
) {
    for artifact in &passport.artifacts {
        match non_blank(artifact.as_deref()) {
            None => messages.push(
                Message::error(
                    "OBJECT_PASSPORT_ARTIFACT_INVALID",
                    "Passport artifacts entry must be a string",
                )
                .with("objectId", object_id),
            ),
            Some(id) if !view.ids.contains(id) => messages.push(
                Message::error(
                    "OBJECT_PASSPORT_ARTIFACT_MISSING",
                    format!("Passport artifact is missing from catalog: {id}"),
                )
                .with("objectId", object_id)
                .with("artifactId", id),
            ),
            Some(_) => {}
        }
    }

    for dataset in &passport.datasets {
        let Some(selector) = dataset else {
            messages.push(
                Message::error(
                    "OBJECT_PASSPORT_DATASET_INVALID",
                    "Dataset selector must be an object",
                )
                .with("objectId", object_id),
            );
            continue;
        };
        match non_blank(selector.artifact_id.as_deref()) {
            None => messages.push(
                Message::error(
                    "OBJECT_PASSPORT_DATASET_INVALID",
                    "datasetSelector.artifactId is missing",
                )
                .with("objectId", object_id),
            ),
            Some(id) if !view.ids.contains(id) => messages.push(
                Message::error(
                    "OBJECT_PASSPORT_DATASET_MISSING",
                    format!("Dataset artifact is missing from catalog: {id}"),
                )
                .with("objectId", object_id)
                .with("artifactId", id),
            ),
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use sitepack_schema::SchemaValidator;
    use std::fs;

    fn codes(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.code.as_str()).collect()
    }

    struct Fixture {
        dir: tempfile::TempDir,
        catalog: Catalog,
    }

    fn fixture(index: Value, passports: &[(&str, Value)], extra_ids: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("objects.json"), index.to_string()).unwrap();
        let mut artifacts = vec![json!({
            "id": "idx",
            "mediaType": OBJECT_INDEX_JSON,
            "path": "objects.json"
        })];
        for (path, doc) in passports {
            let file = dir.path().join(path);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(&file, doc.to_string()).unwrap();
            artifacts.push(json!({
                "id": format!("passport:{path}"),
                "mediaType": sitepack_core::media::OBJECT_PASSPORT_JSON,
                "path": path
            }));
        }
        for id in extra_ids {
            artifacts.push(json!({"id": id, "mediaType": "text/plain", "path": format!("{id}.txt")}));
        }
        let catalog = Catalog::from_value(&json!({ "artifacts": artifacts }));
        Fixture { dir, catalog }
    }

    fn run(fx: &Fixture) -> Vec<Message> {
        let gate = SchemaValidator::builtin().unwrap();
        ObjectGraphValidator::new(&gate).validate(fx.dir.path(), &fx.catalog, &HashSet::new())
    }

    #[test]
    fn no_object_index_means_no_findings() {
        let gate = SchemaValidator::builtin().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::from_value(&json!({"artifacts": [{"id": "a", "mediaType": "text/plain"}]}));
        let out = ObjectGraphValidator::new(&gate).validate(dir.path(), &catalog, &HashSet::new());
        assert!(out.is_empty());
    }

    #[test]
    fn consistent_graph_is_clean() {
        let fx = fixture(
            json!({"objects": [{"id": "o1", "passportPath": "passports/o1.json"}]}),
            &[(
                "passports/o1.json",
                json!({"id": "o1", "objectRef": {"id": "o1"}, "artifacts": ["a1"], "datasets": [{"artifactId": "d1"}]}),
            )],
            &["a1", "d1"],
        );
        assert!(run(&fx).is_empty());
    }

    #[test]
    fn id_mismatch_is_reported_once_and_references_still_checked() {
        let fx = fixture(
            json!({"objects": [{"id": "o1", "passportPath": "p.json"}]}),
            &[(
                "p.json",
                json!({"id": "o2", "artifacts": ["ghost"], "datasets": [{"artifactId": "ghost-ds"}]}),
            )],
            &[],
        );
        let out = run(&fx);
        assert_eq!(
            codes(&out),
            vec![
                "OBJECT_PASSPORT_ID_MISMATCH",
                "OBJECT_PASSPORT_ARTIFACT_MISSING",
                "OBJECT_PASSPORT_DATASET_MISSING"
            ]
        );
        assert_eq!(
            out[0].message,
            "Passport id does not match object index id: o2 != o1"
        );
        assert_eq!(out[1].context.get("artifactId").map(String::as_str), Some("ghost"));
    }

    #[test]
    fn all_three_identity_checks_fire_independently() {
        let fx = fixture(
            json!({"objects": [{"id": "o1", "passportPath": "p.json"}]}),
            &[("p.json", json!({"id": "o2", "objectRef": {"id": "o3"}}))],
            &[],
        );
        assert_eq!(
            codes(&run(&fx)),
            vec![
                "OBJECT_PASSPORT_ID_MISMATCH",
                "OBJECT_PASSPORT_ID_MISMATCH",
                "OBJECT_PASSPORT_REF_MISMATCH"
            ]
        );
    }

    #[test]
    fn undeclared_passport_is_flagged_but_still_read() {
        let fx = fixture(
            json!({"objects": [{"id": "o1", "passportPath": "hidden.json"}]}),
            &[],
            &[],
        );
        fs::write(fx.dir.path().join("hidden.json"), json!({"id": "oX"}).to_string()).unwrap();
        assert_eq!(
            codes(&run(&fx)),
            vec!["OBJECT_PASSPORT_NOT_IN_CATALOG", "OBJECT_PASSPORT_ID_MISMATCH"]
        );
    }

    #[test]
    fn entry_problems() {
        let fx = fixture(
            json!({"objects": [
                "junk",
                {"passportPath": "p.json"},
                {"id": "o3"},
                {"id": "o4", "passportPath": "../escape.json"},
                {"id": "o5", "passportPath": "absent.json"}
            ]}),
            &[],
            &[],
        );
        let out = run(&fx);
        // The first three entries also violate the index schema.
        let entry_codes: Vec<_> = codes(&out)
            .into_iter()
            .filter(|c| *c != "OBJECT_INDEX_SCHEMA_ERROR")
            .collect();
        assert_eq!(
            entry_codes,
            vec![
                "OBJECT_INDEX_ENTRY_INVALID",
                "OBJECT_INDEX_ENTRY_INVALID",
                "OBJECT_PASSPORT_PATH_MISSING",
                "OBJECT_PASSPORT_NOT_IN_CATALOG",
                "PATH_TRAVERSAL",
                "OBJECT_PASSPORT_NOT_IN_CATALOG",
                "OBJECT_PASSPORT_MISSING"
            ]
        );
    }

    #[test]
    fn schema_invalid_passport_skips_cross_checks() {
        let fx = fixture(
            json!({"objects": [{"id": "o1", "passportPath": "p.json"}]}),
            &[("p.json", json!({"artifacts": ["ghost"]}))],
            &[],
        );
        let out = run(&fx);
        assert!(!out.is_empty());
        assert!(out.iter().all(|m| m.code == "OBJECT_PASSPORT_SCHEMA_ERROR"));
    }

    #[test]
    fn already_validated_documents_are_not_revalidated() {
        let gate = SchemaValidator::builtin().unwrap();
        let fx = fixture(
            json!({"objects": [{"id": "o1", "passportPath": "p.json"}], "extra": true}),
            &[("p.json", json!({"id": "o1", "artifacts": ["idx"]}))],
            &[],
        );
        let validated: HashSet<String> =
            ["idx".to_string(), "passport:p.json".to_string()].into_iter().collect();
        let out = ObjectGraphValidator::new(&gate).validate(fx.dir.path(), &fx.catalog, &validated);
        assert!(out.is_empty());
    }

    #[test]
    fn invalid_passport_skips_cross_checks_whether_or_not_already_reported() {
        let gate = SchemaValidator::builtin().unwrap();
        let fx = fixture(
            json!({"objects": [{"id": "o1", "passportPath": "p.json"}]}),
            &[("p.json", json!({"artifacts": ["ghost"]}))],
            &[],
        );
        let fresh = ObjectGraphValidator::new(&gate).validate(
            fx.dir.path(),
            &fx.catalog,
            &HashSet::new(),
        );
        assert!(!fresh.is_empty());
        assert!(fresh.iter().all(|m| m.code == "OBJECT_PASSPORT_SCHEMA_ERROR"));

        let validated: HashSet<String> =
            ["idx".to_string(), "passport:p.json".to_string()].into_iter().collect();
        let seen = ObjectGraphValidator::new(&gate).validate(fx.dir.path(), &fx.catalog, &validated);
        assert!(seen.is_empty(), "{:?}", codes(&seen));
    }

    #[test]
    fn blank_paths_are_missing_paths() {
        let fx = fixture(
            json!({"objects": [{"id": "o1", "passportPath": "  "}]}),
            &[],
            &[],
        );
        let report = run(&fx);
        let entry_codes: Vec<_> = codes(&report)
            .into_iter()
            .filter(|c| *c != "OBJECT_INDEX_SCHEMA_ERROR")
            .collect();
        assert_eq!(entry_codes, vec!["OBJECT_PASSPORT_PATH_MISSING"]);

        let gate = SchemaValidator::builtin().unwrap();
        let catalog = Catalog::from_value(&json!({"artifacts": [
            {"id": "idx", "mediaType": OBJECT_INDEX_JSON, "path": ""}
        ]}));
        let out = ObjectGraphValidator::new(&gate).validate(fx.dir.path(), &catalog, &HashSet::new());
        assert_eq!(codes(&out), vec!["OBJECT_INDEX_PATH_MISSING"]);
    }

    #[test]
    fn unreadable_index() {
        let fx = fixture(json!({}), &[], &[]);
        fs::write(fx.dir.path().join("objects.json"), "{oops").unwrap();
        assert_eq!(codes(&run(&fx)), vec!["OBJECT_INDEX_PARSE_ERROR"]);
    }
}
