//! Client factory
//!
//! Chooses live or offline once, from an explicit [`ClientConfig`], and hands
//! back an [`ApiClient`] whose sub-service clients look the same either way.
//!
//! ```text
//! Unresolved ─┬─> Live ──────────> LiveReady
//!             └─> OfflineLoading ─┬> OfflineReady
//!                                 └> Fatal
//! ```
//!
//! Offline load failures come back as [`ArgoError::FatalConfig`]; deciding to
//! terminate the process is left to the top-level caller.

use crate::api::{
    ClusterWorkflowTemplateServiceClient, CronWorkflowServiceClient, ObjectApi,
    WorkflowServiceClient, WorkflowTemplateServiceClient,
};
use crate::env::{auth_string_from, process_env, resolve_namespace_from};
use crate::offline::OfflineClient;
use crate::service_client::ServiceClient;
use argo_core::{
    load_offline_catalog, AuthToken, CallContext, ClientConfig, Mode, OfflineCatalog,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Resolution progress, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    Unresolved,
    Live,
    OfflineLoading,
    LiveReady,
    OfflineReady,
    Fatal,
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct ClientFactory {
    config: ClientConfig,
    env: EnvLookup,
}

impl ClientFactory {
    /// Factory reading credentials and namespace from the process environment
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            env: Arc::new(process_env),
        }
    }

    /// Replace the environment lookup used for `ARGO_TOKEN` / `ARGO_NAMESPACE`
    pub fn with_env_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.env = Arc::new(lookup);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve the client for this invocation.
    ///
    /// Live: resolves token and namespace into the returned context, then
    /// handshakes with the server. Connection failures and cancellation are
    /// ordinary errors.
    ///
    /// Offline: loads the configured files. Any load failure is returned as a
    /// fatal configuration error and nothing is contacted over the network.
    pub fn new_api_client(&self, ctx: CallContext) -> argo_core::Result<(CallContext, ApiClient)> {
        let mut state = ResolveState::Unresolved;

        match self.config.mode {
            Mode::Live => {
                transition(&mut state, ResolveState::Live);
                let lookup = |key: &str| (self.env)(key);
                let token = AuthToken::new(auth_string_from(lookup));
                let namespace = resolve_namespace_from(self.config.namespace.as_deref(), lookup);
                let ctx = ctx
                    .with_auth_token(token)
                    .with_namespace(namespace)
                    .with_instance_id(self.config.instance_id.clone());

                let client = ServiceClient::connect(&self.config, &ctx)?;
                transition(&mut state, ResolveState::LiveReady);
                Ok((ctx, ApiClient::Live(Arc::new(client))))
            }
            Mode::Offline => {
                transition(&mut state, ResolveState::OfflineLoading);
                ctx.check()?;
                let catalog = match load_offline_catalog(&self.config.offline_files) {
                    Ok(catalog) => catalog,
                    Err(e) => {
                        transition(&mut state, ResolveState::Fatal);
                        return Err(e.fatal());
                    }
                };
                transition(&mut state, ResolveState::OfflineReady);

                // Offline objects are not bound to a server namespace; only an
                // explicit namespace narrows queries.
                let ctx = ctx
                    .with_namespace(self.config.namespace.clone().unwrap_or_default())
                    .with_instance_id(self.config.instance_id.clone());
                Ok((ctx, ApiClient::Offline(Arc::new(OfflineClient::new(catalog)))))
            }
        }
    }
}

fn transition(state: &mut ResolveState, next: ResolveState) {
    debug!(from = ?*state, to = ?next, "client resolution");
    *state = next;
}

/// Resolved client handle.
///
/// Cheap to clone; the variant is fixed at construction.
#[derive(Clone)]
pub enum ApiClient {
    Live(Arc<ServiceClient>),
    Offline(Arc<OfflineClient>),
}

impl ApiClient {
    pub fn mode(&self) -> Mode {
        match self {
            Self::Live(_) => Mode::Live,
            Self::Offline(_) => Mode::Offline,
        }
    }

    /// Catalog backing an offline client
    pub fn offline_catalog(&self) -> Option<&OfflineCatalog> {
        match self {
            Self::Live(_) => None,
            Self::Offline(client) => Some(client.catalog()),
        }
    }

    fn api(&self) -> Arc<dyn ObjectApi> {
        match self {
            Self::Live(client) => client.clone() as Arc<dyn ObjectApi>,
            Self::Offline(client) => client.clone() as Arc<dyn ObjectApi>,
        }
    }

    pub fn new_workflow_service_client(&self) -> WorkflowServiceClient {
        WorkflowServiceClient::new(self.api())
    }

    pub fn new_workflow_template_service_client(&self) -> WorkflowTemplateServiceClient {
        WorkflowTemplateServiceClient::new(self.api())
    }

    pub fn new_cluster_workflow_template_service_client(
        &self,
    ) -> ClusterWorkflowTemplateServiceClient {
        ClusterWorkflowTemplateServiceClient::new(self.api())
    }

    pub fn new_cron_workflow_service_client(&self) -> CronWorkflowServiceClient {
        CronWorkflowServiceClient::new(self.api())
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Live(client) => f.debug_tuple("Live").field(&client.base_url()).finish(),
            Self::Offline(client) => f
                .debug_tuple("Offline")
                .field(&client.catalog().len())
                .finish(),
        }
    }
}

/// Resolve a client with the process environment, as commands do.
pub fn new_api_client(
    config: ClientConfig,
    ctx: CallContext,
) -> argo_core::Result<(CallContext, ApiClient)> {
    ClientFactory::new(config).new_api_client(ctx)
}
