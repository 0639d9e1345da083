//! Offline object catalog
//!
//! Loads manifest files into an in-memory index keyed by (kind, name). The
//! catalog is built once and never mutated afterwards, so it can be shared
//! across sub-service clients behind an `Arc` without locking.

use crate::object::{Manifest, ObjectKind};
use crate::ArgoError;
use ignore::WalkBuilder;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extensions picked up when a directory is listed as an offline file
pub const MANIFEST_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Read-only index of orchestration objects loaded from local manifests
#[derive(Debug, Clone, Default)]
pub struct OfflineCatalog {
    objects: BTreeMap<(ObjectKind, String), Manifest>,
    sources: Vec<PathBuf>,
}

impl OfflineCatalog {
    /// Look up an object by kind and name
    pub fn get(&self, kind: ObjectKind, name: &str) -> Option<&Manifest> {
        self.objects.get(&(kind, name.to_string()))
    }

    /// All objects of `kind`, ordered by name
    pub fn list(&self, kind: ObjectKind) -> impl Iterator<Item = &Manifest> {
        self.objects
            .range((kind, String::new())..)
            .take_while(move |((k, _), _)| *k == kind)
            .map(|(_, manifest)| manifest)
    }

    pub fn contains(&self, kind: ObjectKind, name: &str) -> bool {
        self.get(kind, name).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Manifest files the catalog was built from, in load order
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    fn insert(&mut self, manifest: Manifest) -> Option<Manifest> {
        self.objects
            .insert((manifest.kind, manifest.name().to_string()), manifest)
    }
}

/// Build a catalog from the configured offline files.
///
/// All-or-nothing: the first unreadable or malformed file aborts the load and
/// no partial catalog is returned. Later definitions of the same (kind, name)
/// replace earlier ones.
pub fn load_offline_catalog<P: AsRef<Path>>(paths: &[P]) -> crate::Result<OfflineCatalog> {
    let mut catalog = OfflineCatalog::default();

    for path in paths {
        for file in expand_path(path.as_ref())? {
            let content = std::fs::read_to_string(&file).map_err(|source| ArgoError::ManifestRead {
                path: file.clone(),
                source,
            })?;

            for manifest in parse_manifests(&file, &content)? {
                if manifest.name().is_empty() {
                    debug!(
                        generate_name = manifest.display_name(),
                        file = %file.display(),
                        "skipping workflow without a fixed name"
                    );
                    continue;
                }
                if let Some(previous) = catalog.insert(manifest) {
                    debug!(
                        kind = %previous.kind,
                        name = previous.name(),
                        file = %file.display(),
                        "offline object redefined"
                    );
                }
            }
            catalog.sources.push(file);
        }
    }

    debug!(
        objects = catalog.len(),
        files = catalog.sources.len(),
        "offline catalog loaded"
    );
    Ok(catalog)
}

/// Resolve a configured path to the manifest files it stands for.
///
/// Files are returned as-is; directories expand to the manifest files under
/// them, sorted by file name so layering is deterministic.
fn expand_path(path: &Path) -> crate::Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(path).map_err(|source| ArgoError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;

    if !metadata.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let walker = WalkBuilder::new(path)
        .standard_filters(false)
        .follow_links(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| ArgoError::ManifestRead {
            path: path.to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
        })?;
        let is_file = entry.file_type().is_some_and(|t| t.is_file());
        if is_file && is_manifest_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

fn is_manifest_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Parse every orchestration object in one file.
///
/// YAML streams may hold several `---` separated documents; JSON is parsed by
/// the same path. Documents of other kinds are skipped.
pub fn parse_manifests(path: &Path, content: &str) -> crate::Result<Vec<Manifest>> {
    let parse_error = |message: String| ArgoError::ManifestParse {
        path: path.to_path_buf(),
        message,
    };

    let mut manifests = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = Value::deserialize(document)
            .map_err(|e| parse_error(format!("document {}: {}", index + 1, e)))?;

        let kind = match &value {
            Value::Null => continue,
            Value::Object(fields) => match fields.get("kind").and_then(Value::as_str) {
                Some(kind) => kind.to_string(),
                None => return Err(parse_error(format!("document {}: missing kind", index + 1))),
            },
            _ => {
                return Err(parse_error(format!(
                    "document {}: expected a mapping",
                    index + 1
                )))
            }
        };

        if kind.parse::<ObjectKind>().is_err() {
            debug!(kind = %kind, file = %path.display(), "skipping non-workflow object");
            continue;
        }

        let manifest: Manifest = serde_json::from_value(value)
            .map_err(|e| parse_error(format!("document {}: {}", index + 1, e)))?;
        let unnamed = if manifest.kind == ObjectKind::Workflow {
            manifest.display_name().is_empty()
        } else {
            manifest.name().is_empty()
        };
        if unnamed {
            return Err(parse_error(format!(
                "document {}: {} has no metadata.name",
                index + 1,
                manifest.kind
            )));
        }
        manifests.push(manifest);
    }

    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    const TEMPLATE_V1: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: WorkflowTemplate
metadata:
  name: hello
spec:
  entrypoint: v1
"#;

    const TEMPLATE_V2: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: WorkflowTemplate
metadata:
  name: hello
spec:
  entrypoint: v2
"#;

    #[test]
    fn test_empty_paths_give_empty_catalog() {
        let paths: Vec<PathBuf> = Vec::new();
        let catalog = load_offline_catalog(&paths).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.sources().is_empty());
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_offline_catalog(&["does-not-exist.yaml"]).unwrap_err();
        assert!(matches!(err, ArgoError::ManifestRead { .. }));
        assert!(err.to_string().contains("does-not-exist.yaml"));
    }

    #[test]
    fn test_later_file_wins() {
        let dir = TempDir::new().unwrap();
        let first = write(&dir, "first.yaml", TEMPLATE_V1);
        let second = write(&dir, "second.yaml", TEMPLATE_V2);

        let catalog = load_offline_catalog(&[first, second]).unwrap();
        assert_eq!(catalog.len(), 1);
        let hello = catalog.get(ObjectKind::WorkflowTemplate, "hello").unwrap();
        assert_eq!(hello.spec().unwrap()["entrypoint"], "v2");
    }

    #[test]
    fn test_malformed_file_discards_everything() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "good.yaml", TEMPLATE_V1);
        let bad = write(&dir, "bad.yaml", "kind: [unterminated");

        let err = load_offline_catalog(&[good, bad]).unwrap_err();
        match err {
            ArgoError::ManifestParse { path, .. } => assert!(path.ends_with("bad.yaml")),
            other => panic!("expected ManifestParse, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_document_file() {
        let dir = TempDir::new().unwrap();
        let file = write(
            &dir,
            "all.yaml",
            r#"
apiVersion: argoproj.io/v1alpha1
kind: ClusterWorkflowTemplate
metadata:
  name: shared
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: ignored
---
apiVersion: argoproj.io/v1alpha1
kind: CronWorkflow
metadata:
  name: nightly
  namespace: team-a
spec:
  schedule: "0 0 * * *"
---
"#,
        );

        let catalog = load_offline_catalog(&[file]).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(ObjectKind::ClusterWorkflowTemplate, "shared"));
        let cron = catalog.get(ObjectKind::CronWorkflow, "nightly").unwrap();
        assert_eq!(cron.namespace(), Some("team-a"));
    }

    #[test]
    fn test_json_manifest() {
        let dir = TempDir::new().unwrap();
        let file = write(
            &dir,
            "wf.json",
            r#"{"apiVersion":"argoproj.io/v1alpha1","kind":"Workflow","metadata":{"name":"run-1"}}"#,
        );
        let catalog = load_offline_catalog(&[file]).unwrap();
        assert!(catalog.contains(ObjectKind::Workflow, "run-1"));
    }

    #[test]
    fn test_directory_expands_in_name_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "manifests/a.yaml", TEMPLATE_V1);
        write(&dir, "manifests/nested/b.yml", TEMPLATE_V2);
        write(&dir, "manifests/README.md", "not a manifest");

        let catalog = load_offline_catalog(&[dir.path().join("manifests")]).unwrap();
        assert_eq!(catalog.sources().len(), 2);
        let hello = catalog.get(ObjectKind::WorkflowTemplate, "hello").unwrap();
        assert_eq!(hello.spec().unwrap()["entrypoint"], "v2");
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_follows_symlinked_manifests() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "shared/template.yaml", TEMPLATE_V1);
        std::fs::create_dir_all(dir.path().join("manifests")).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("manifests/linked.yaml")).unwrap();

        let catalog = load_offline_catalog(&[dir.path().join("manifests")]).unwrap();
        assert_eq!(catalog.sources().len(), 1);
        assert!(catalog.contains(ObjectKind::WorkflowTemplate, "hello"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_in_directory_fails_load() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("manifests")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("gone.yaml"),
            dir.path().join("manifests/linked.yaml"),
        )
        .unwrap();

        let err = load_offline_catalog(&[dir.path().join("manifests")]).unwrap_err();
        assert!(matches!(err, ArgoError::ManifestRead { .. }));
    }

    #[test]
    fn test_missing_kind_is_malformed() {
        let err = parse_manifests(Path::new("x.yaml"), "metadata:\n  name: a\n").unwrap_err();
        assert!(err.to_string().contains("missing kind"));
    }

    #[test]
    fn test_missing_name_is_malformed() {
        let content = "kind: WorkflowTemplate\nmetadata:\n  generateName: t-\n";
        let err = parse_manifests(Path::new("x.yaml"), content).unwrap_err();
        assert!(err.to_string().contains("metadata.name"));

        let content = "kind: Workflow\nmetadata:\n  labels: {a: b}\n";
        assert!(parse_manifests(Path::new("x.yaml"), content).is_err());
    }

    #[test]
    fn test_generated_workflow_names_are_not_indexed() {
        let dir = TempDir::new().unwrap();
        let file = write(
            &dir,
            "run.yaml",
            "kind: Workflow\nmetadata:\n  generateName: run-\nspec: {}\n",
        );
        let content = std::fs::read_to_string(&file).unwrap();
        assert_eq!(parse_manifests(&file, &content).unwrap().len(), 1);

        let catalog = load_offline_catalog(&[file]).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(catalog.sources().len(), 1);
    }

    #[test]
    fn test_list_is_scoped_to_kind() {
        let dir = TempDir::new().unwrap();
        let file = write(
            &dir,
            "mixed.yaml",
            r#"
kind: WorkflowTemplate
metadata: {name: b}
---
kind: WorkflowTemplate
metadata: {name: a}
---
kind: Workflow
metadata: {name: c}
"#,
        );
        let catalog = load_offline_catalog(&[file]).unwrap();
        let names: Vec<_> = catalog
            .list(ObjectKind::WorkflowTemplate)
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(catalog.list(ObjectKind::CronWorkflow).count(), 0);
    }
}
