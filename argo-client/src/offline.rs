//! Offline backend: answers every call from the in-memory catalog
//!
//! Nothing here touches the network or writes anywhere. Create is refused;
//! lint validates structure and template references against the catalog.

use crate::api::ObjectApi;
use argo_core::{ArgoError, CallContext, Manifest, ObjectKind, OfflineCatalog};
use serde_json::Value;

/// Shared across sub-service clients through the `Arc` in `ApiClient::Offline`
pub struct OfflineClient {
    catalog: OfflineCatalog,
}

impl OfflineClient {
    pub fn new(catalog: OfflineCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &OfflineCatalog {
        &self.catalog
    }
}

impl ObjectApi for OfflineClient {
    fn get(
        &self,
        ctx: &CallContext,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> argo_core::Result<Manifest> {
        ctx.check()?;
        self.catalog
            .get(kind, name)
            .filter(|m| m.in_namespace(namespace))
            .cloned()
            .ok_or_else(|| ArgoError::not_found(kind, name))
    }

    fn list(
        &self,
        ctx: &CallContext,
        kind: ObjectKind,
        namespace: &str,
    ) -> argo_core::Result<Vec<Manifest>> {
        ctx.check()?;
        Ok(self
            .catalog
            .list(kind)
            .filter(|m| m.in_namespace(namespace))
            .cloned()
            .collect())
    }

    fn create(
        &self,
        ctx: &CallContext,
        _namespace: &str,
        manifest: Manifest,
    ) -> argo_core::Result<Manifest> {
        ctx.check()?;
        Err(ArgoError::offline_unsupported(format!(
            "creating a {}",
            manifest.kind
        )))
    }

    fn lint(
        &self,
        ctx: &CallContext,
        _namespace: &str,
        manifest: Manifest,
    ) -> argo_core::Result<Manifest> {
        ctx.check()?;
        lint_manifest(&self.catalog, &manifest)?;
        Ok(manifest)
    }
}

/// Structural checks plus template reference resolution.
///
/// Workflows may rely on `generateName`; every other kind needs a name.
/// An object built from a template reference must find that template in the
/// catalog. Otherwise its spec must define templates and, when given, an
/// entrypoint naming one of them. Cron workflows also need a schedule.
pub fn lint_manifest(catalog: &OfflineCatalog, manifest: &Manifest) -> argo_core::Result<()> {
    let label = manifest.display_name().to_string();
    let fail = |message: String| Err(ArgoError::lint(label.clone(), message));

    if manifest.display_name().is_empty() {
        return fail("metadata.name is required".to_string());
    }
    if manifest.kind != ObjectKind::Workflow && manifest.name().is_empty() {
        return fail(format!(
            "metadata.name is required for a {}",
            manifest.kind
        ));
    }

    let Some(spec) = manifest.spec() else {
        return fail("spec is required".to_string());
    };

    let workflow_spec = if manifest.kind == ObjectKind::CronWorkflow {
        if !has_schedule(spec) {
            return fail("spec.schedule is required".to_string());
        }
        match spec.get("workflowSpec") {
            Some(workflow_spec) => workflow_spec,
            None => return fail("spec.workflowSpec is required".to_string()),
        }
    } else {
        spec
    };

    if let Some(reference) = manifest.workflow_template_ref() {
        if !catalog.contains(reference.target_kind(), &reference.name) {
            return fail(format!(
                "{} \"{}\" is not defined in the offline files",
                reference.target_kind(),
                reference.name
            ));
        }
        return Ok(());
    }

    let template_names: Vec<&str> = workflow_spec
        .get("templates")
        .and_then(Value::as_array)
        .map(|templates| {
            templates
                .iter()
                .filter_map(|t| t.get("name").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if template_names.is_empty() {
        return fail("spec.templates must define at least one named template".to_string());
    }

    if let Some(entrypoint) = workflow_spec.get("entrypoint").and_then(Value::as_str) {
        if !template_names.contains(&entrypoint) {
            return fail(format!(
                "entrypoint \"{}\" does not match any template",
                entrypoint
            ));
        }
    }

    Ok(())
}

fn has_schedule(spec: &Value) -> bool {
    let single = spec
        .get("schedule")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    let many = spec
        .get("schedules")
        .and_then(Value::as_array)
        .is_some_and(|s| !s.is_empty());
    single || many
}
