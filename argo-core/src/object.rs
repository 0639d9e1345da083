//! Orchestration object model
//!
//! Only the parts of an object the client layer needs to index and route
//! requests are typed. Everything else (`spec`, `status`, ...) is kept as
//! opaque JSON so it round-trips through offline and live modes untouched.

use crate::ArgoError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

/// API group/version written by this client when creating objects.
pub const API_VERSION: &str = "argoproj.io/v1alpha1";

/// Label the workflow controller uses to pick up objects for a given instance.
pub const INSTANCE_ID_LABEL: &str = "workflows.argoproj.io/controller-instanceid";

/// The orchestration object kinds served by the client layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    Workflow,
    WorkflowTemplate,
    ClusterWorkflowTemplate,
    CronWorkflow,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 4] = [
        ObjectKind::Workflow,
        ObjectKind::WorkflowTemplate,
        ObjectKind::ClusterWorkflowTemplate,
        ObjectKind::CronWorkflow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workflow => "Workflow",
            Self::WorkflowTemplate => "WorkflowTemplate",
            Self::ClusterWorkflowTemplate => "ClusterWorkflowTemplate",
            Self::CronWorkflow => "CronWorkflow",
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !matches!(self, Self::ClusterWorkflowTemplate)
    }

    /// REST collection segment under `/api/v1/`
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Workflow => "workflows",
            Self::WorkflowTemplate => "workflow-templates",
            Self::ClusterWorkflowTemplate => "cluster-workflow-templates",
            Self::CronWorkflow => "cron-workflows",
        }
    }

    /// Field name wrapping the object in create and lint request bodies
    pub fn request_field(&self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::WorkflowTemplate | Self::ClusterWorkflowTemplate => "template",
            Self::CronWorkflow => "cronWorkflow",
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ArgoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ArgoError::InvalidConfig(format!("unknown object kind: {}", s)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Server-populated fields (uid, resourceVersion, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reference from a workflow to a (cluster) workflow template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub name: String,
    pub cluster_scope: bool,
}

impl TemplateRef {
    pub fn target_kind(&self) -> ObjectKind {
        if self.cluster_scope {
            ObjectKind::ClusterWorkflowTemplate
        } else {
            ObjectKind::WorkflowTemplate
        }
    }
}

/// A single orchestration object as found in a manifest or returned by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Manifest {
    /// Create an empty object of `kind` named `name`.
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind,
            metadata: ObjectMeta {
                name: name.into(),
                ..ObjectMeta::default()
            },
            body: Map::new(),
        }
    }

    /// Builder-style spec setter, mostly useful in tests.
    pub fn with_spec(mut self, spec: Value) -> Self {
        self.body.insert("spec".to_string(), spec);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = Some(namespace.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Name if set, otherwise the generateName prefix
    pub fn display_name(&self) -> &str {
        if self.metadata.name.is_empty() {
            self.metadata.generate_name.as_deref().unwrap_or("")
        } else {
            &self.metadata.name
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// True when the object may be served for `namespace`.
    ///
    /// Objects that do not pin a namespace match any request; an empty
    /// requested namespace matches every object.
    pub fn in_namespace(&self, namespace: &str) -> bool {
        if namespace.is_empty() || !self.kind.is_namespaced() {
            return true;
        }
        self.namespace().is_none_or(|ns| ns == namespace)
    }

    pub fn spec(&self) -> Option<&Value> {
        self.body.get("spec")
    }

    pub fn set_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.labels.insert(key.into(), value.into());
    }

    /// The template this object is instantiated from, if any.
    ///
    /// Workflows carry it at `spec.workflowTemplateRef`; cron workflows at
    /// `spec.workflowSpec.workflowTemplateRef`.
    pub fn workflow_template_ref(&self) -> Option<TemplateRef> {
        let spec = self.spec()?;
        let reference = match self.kind {
            ObjectKind::Workflow => spec.get("workflowTemplateRef")?,
            ObjectKind::CronWorkflow => spec.get("workflowSpec")?.get("workflowTemplateRef")?,
            _ => return None,
        };
        Some(TemplateRef {
            name: reference.get("name")?.as_str()?.to_string(),
            cluster_scope: reference
                .get("clusterScope")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}
