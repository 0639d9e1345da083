//! Argo Client - API client resolution for the argo CLI
//!
//! Provides the `ClientFactory` that owns both live and offline modes, so
//! commands get one `ApiClient` handle and never branch on the mode.

pub mod api;
pub mod env;
pub mod factory;
pub mod offline;
pub mod service_client;

pub use api::{
    ClusterWorkflowTemplateServiceClient, CronWorkflowServiceClient, ObjectApi,
    WorkflowServiceClient, WorkflowTemplateServiceClient,
};
pub use env::{get_auth_string, namespace, resolve_namespace};
pub use factory::{new_api_client, ApiClient, ClientFactory, ResolveState};
pub use offline::OfflineClient;
pub use service_client::{ServerVersion, ServiceClient};
