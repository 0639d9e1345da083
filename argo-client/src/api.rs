//! Sub-service clients
//!
//! Every backend implements [`ObjectApi`]; the four typed service clients sit
//! on top of it so commands see the same signatures in live and offline mode.

use argo_core::{ArgoError, CallContext, Manifest, ObjectKind};
use std::sync::Arc;

/// Kind-generic operations a backend must provide.
///
/// `namespace` is ignored for cluster-scoped kinds.
pub trait ObjectApi: Send + Sync {
    fn get(
        &self,
        ctx: &CallContext,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> argo_core::Result<Manifest>;

    fn list(
        &self,
        ctx: &CallContext,
        kind: ObjectKind,
        namespace: &str,
    ) -> argo_core::Result<Vec<Manifest>>;

    fn create(
        &self,
        ctx: &CallContext,
        namespace: &str,
        manifest: Manifest,
    ) -> argo_core::Result<Manifest>;

    fn lint(
        &self,
        ctx: &CallContext,
        namespace: &str,
        manifest: Manifest,
    ) -> argo_core::Result<Manifest>;
}

/// Shared plumbing for the typed clients: a backend pinned to one kind
#[derive(Clone)]
struct KindClient {
    api: Arc<dyn ObjectApi>,
    kind: ObjectKind,
}

impl KindClient {
    fn get(&self, ctx: &CallContext, namespace: &str, name: &str) -> argo_core::Result<Manifest> {
        self.api.get(ctx, self.kind, namespace, name)
    }

    fn list(&self, ctx: &CallContext, namespace: &str) -> argo_core::Result<Vec<Manifest>> {
        self.api.list(ctx, self.kind, namespace)
    }

    fn create(
        &self,
        ctx: &CallContext,
        namespace: &str,
        manifest: Manifest,
    ) -> argo_core::Result<Manifest> {
        self.ensure_kind(&manifest)?;
        self.api.create(ctx, namespace, manifest)
    }

    fn lint(
        &self,
        ctx: &CallContext,
        namespace: &str,
        manifest: Manifest,
    ) -> argo_core::Result<Manifest> {
        self.ensure_kind(&manifest)?;
        self.api.lint(ctx, namespace, manifest)
    }

    fn ensure_kind(&self, manifest: &Manifest) -> argo_core::Result<()> {
        if manifest.kind == self.kind {
            Ok(())
        } else {
            Err(ArgoError::WrongKind {
                expected: self.kind,
                found: manifest.kind,
            })
        }
    }
}

#[derive(Clone)]
pub struct WorkflowServiceClient {
    inner: KindClient,
}

impl WorkflowServiceClient {
    pub(crate) fn new(api: Arc<dyn ObjectApi>) -> Self {
        Self {
            inner: KindClient {
                api,
                kind: ObjectKind::Workflow,
            },
        }
    }

    pub fn get_workflow(
        &self,
        ctx: &CallContext,
        namespace: &str,
        name: &str,
    ) -> argo_core::Result<Manifest> {
        self.inner.get(ctx, namespace, name)
    }

    pub fn list_workflows(
        &self,
        ctx: &CallContext,
        namespace: &str,
    ) -> argo_core::Result<Vec<Manifest>> {
        self.inner.list(ctx, namespace)
    }

    /// Submit a workflow
    pub fn create_workflow(
        &self,
        ctx: &CallContext,
        namespace: &str,
        workflow: Manifest,
    ) -> argo_core::Result<Manifest> {
        self.inner.create(ctx, namespace, workflow)
    }

    pub fn lint_workflow(
        &self,
        ctx: &CallContext,
        namespace: &str,
        workflow: Manifest,
    ) -> argo_core::Result<Manifest> {
        self.inner.lint(ctx, namespace, workflow)
    }
}

#[derive(Clone)]
pub struct WorkflowTemplateServiceClient {
    inner: KindClient,
}

impl WorkflowTemplateServiceClient {
    pub(crate) fn new(api: Arc<dyn ObjectApi>) -> Self {
        Self {
            inner: KindClient {
                api,
                kind: ObjectKind::WorkflowTemplate,
            },
        }
    }

    pub fn get_workflow_template(
        &self,
        ctx: &CallContext,
        namespace: &str,
        name: &str,
    ) -> argo_core::Result<Manifest> {
        self.inner.get(ctx, namespace, name)
    }

    pub fn list_workflow_templates(
        &self,
        ctx: &CallContext,
        namespace: &str,
    ) -> argo_core::Result<Vec<Manifest>> {
        self.inner.list(ctx, namespace)
    }

    pub fn create_workflow_template(
        &self,
        ctx: &CallContext,
        namespace: &str,
        template: Manifest,
    ) -> argo_core::Result<Manifest> {
        self.inner.create(ctx, namespace, template)
    }

    pub fn lint_workflow_template(
        &self,
        ctx: &CallContext,
        namespace: &str,
        template: Manifest,
    ) -> argo_core::Result<Manifest> {
        self.inner.lint(ctx, namespace, template)
    }
}

#[derive(Clone)]
pub struct ClusterWorkflowTemplateServiceClient {
    inner: KindClient,
}

impl ClusterWorkflowTemplateServiceClient {
    pub(crate) fn new(api: Arc<dyn ObjectApi>) -> Self {
        Self {
            inner: KindClient {
                api,
                kind: ObjectKind::ClusterWorkflowTemplate,
            },
        }
    }

    pub fn get_cluster_workflow_template(
        &self,
        ctx: &CallContext,
        name: &str,
    ) -> argo_core::Result<Manifest> {
        self.inner.get(ctx, "", name)
    }

    pub fn list_cluster_workflow_templates(
        &self,
        ctx: &CallContext,
    ) -> argo_core::Result<Vec<Manifest>> {
        self.inner.list(ctx, "")
    }

    pub fn create_cluster_workflow_template(
        &self,
        ctx: &CallContext,
        template: Manifest,
    ) -> argo_core::Result<Manifest> {
        self.inner.create(ctx, "", template)
    }

    pub fn lint_cluster_workflow_template(
        &self,
        ctx: &CallContext,
        template: Manifest,
    ) -> argo_core::Result<Manifest> {
        self.inner.lint(ctx, "", template)
    }
}

#[derive(Clone)]
pub struct CronWorkflowServiceClient {
    inner: KindClient,
}

impl CronWorkflowServiceClient {
    pub(crate) fn new(api: Arc<dyn ObjectApi>) -> Self {
        Self {
            inner: KindClient {
                api,
                kind: ObjectKind::CronWorkflow,
            },
        }
    }

    pub fn get_cron_workflow(
        &self,
        ctx: &CallContext,
        namespace: &str,
        name: &str,
    ) -> argo_core::Result<Manifest> {
        self.inner.get(ctx, namespace, name)
    }

    pub fn list_cron_workflows(
        &self,
        ctx: &CallContext,
        namespace: &str,
    ) -> argo_core::Result<Vec<Manifest>> {
        self.inner.list(ctx, namespace)
    }

    pub fn create_cron_workflow(
        &self,
        ctx: &CallContext,
        namespace: &str,
        cron_workflow: Manifest,
    ) -> argo_core::Result<Manifest> {
        self.inner.create(ctx, namespace, cron_workflow)
    }

    pub fn lint_cron_workflow(
        &self,
        ctx: &CallContext,
        namespace: &str,
        cron_workflow: Manifest,
    ) -> argo_core::Result<Manifest> {
        self.inner.lint(ctx, namespace, cron_workflow)
    }
}
