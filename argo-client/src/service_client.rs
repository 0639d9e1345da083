//! HTTP client for the Argo Server REST API

use crate::api::ObjectApi;
use argo_core::object::INSTANCE_ID_LABEL;
use argo_core::{ArgoError, CallContext, ClientConfig, ErrorEnvelope, Manifest, ObjectKind};
use crossbeam_channel::select;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

/// Version information reported by the server handshake
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerVersion {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub build_date: String,
    #[serde(default)]
    pub git_commit: String,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Option<Vec<Value>>,
}

pub struct ServiceClient {
    base_url: String,
    base: Url,
    client: Client,
    server_version: ServerVersion,
}

impl ServiceClient {
    /// Build the HTTP client without contacting the server
    pub fn new(config: &ClientConfig) -> argo_core::Result<Self> {
        let base_url = config.server.base_url().ok_or_else(|| {
            ArgoError::connection(
                "<unset>",
                "no Argo Server configured; set ARGO_SERVER or --argo-server",
            )
        })?;
        let base = Url::parse(&base_url)
            .map_err(|e| ArgoError::InvalidConfig(format!("server url {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ArgoError::InvalidConfig(format!(
                "server url {} cannot carry a path",
                base_url
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in config.server.parsed_headers()? {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ArgoError::InvalidConfig(format!("header {}: {}", name, e)))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|e| ArgoError::InvalidConfig(format!("header {}: {}", name, e)))?;
            headers.append(header_name, header_value);
        }

        if config.server.insecure_skip_verify {
            warn!("TLS certificate verification is disabled for {}", base_url);
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .danger_accept_invalid_certs(config.server.insecure_skip_verify)
            .build()
            .map_err(|e| ArgoError::connection(&base_url, e.to_string()))?;

        Ok(Self {
            base_url,
            base,
            client,
            server_version: ServerVersion::default(),
        })
    }

    /// Build the client and perform the version handshake.
    ///
    /// Honours the context deadline and cancellation; an unreachable server is
    /// a `Connection` error.
    pub fn connect(config: &ClientConfig, ctx: &CallContext) -> argo_core::Result<Self> {
        let mut client = Self::new(config)?;
        client.server_version = client.version(ctx)?;
        debug!(
            server = %client.base_url,
            version = %client.server_version.version,
            git_commit = %client.server_version.git_commit,
            build_date = %client.server_version.build_date,
            "connected to Argo Server"
        );
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Version reported during [`ServiceClient::connect`]
    pub fn server_version(&self) -> &ServerVersion {
        &self.server_version
    }

    pub fn version(&self, ctx: &CallContext) -> argo_core::Result<ServerVersion> {
        let value = self.call(ctx, Method::GET, self.endpoint(&["version"]), None)?;
        serde_json::from_value(value).map_err(|e| ArgoError::Api {
            status: 200,
            message: format!("unexpected version response: {}", e),
        })
    }

    /// `<base>/api/v1/<segments...>`, each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "v1"]).extend(segments);
        }
        url
    }

    fn collection_url(&self, kind: ObjectKind, namespace: &str, rest: &[&str]) -> Url {
        let mut segments = vec![kind.collection()];
        if kind.is_namespaced() {
            segments.push(namespace);
        }
        segments.extend_from_slice(rest);
        self.endpoint(&segments)
    }

    fn request_body(kind: ObjectKind, namespace: &str, manifest: Manifest) -> argo_core::Result<Value> {
        let mut body = Map::new();
        if kind.is_namespaced() {
            body.insert("namespace".to_string(), json!(namespace));
        }
        body.insert(kind.request_field().to_string(), serde_json::to_value(manifest)?);
        Ok(Value::Object(body))
    }

    /// Issue one request.
    ///
    /// The blocking send runs on a helper thread so the caller can stop
    /// waiting on cancellation or deadline; the abandoned request is left to
    /// the client timeout.
    fn call(
        &self,
        ctx: &CallContext,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> argo_core::Result<Value> {
        ctx.check()?;

        debug!(%method, %url, "argo server request");
        let request = self.prepare(ctx, method, url, body);

        let (tx, rx) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let outcome = request.send().and_then(|resp| {
                let status = resp.status();
                resp.text().map(|text| (status, text))
            });
            let _ = tx.send(outcome);
        });

        let deadline = match ctx.remaining() {
            Some(remaining) => crossbeam_channel::after(remaining),
            None => crossbeam_channel::never(),
        };

        let outcome = select! {
            recv(rx) -> outcome => outcome,
            recv(ctx.cancel_signal().receiver()) -> _ => return Err(ArgoError::Cancelled),
            recv(deadline) -> _ => return Err(ArgoError::DeadlineExceeded),
        };

        let (status, text) = match outcome {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) if e.is_timeout() && ctx.deadline().is_some() => {
                return Err(ArgoError::DeadlineExceeded)
            }
            Ok(Err(e)) => return Err(ArgoError::connection(&self.base_url, e.to_string())),
            Err(_) => {
                return Err(ArgoError::connection(
                    &self.base_url,
                    "request worker exited without a response",
                ))
            }
        };

        if !status.is_success() {
            return Err(Self::api_error(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ArgoError::Api {
            status: status.as_u16(),
            message: format!("unparseable response body: {}", e),
        })
    }

    fn prepare(
        &self,
        ctx: &CallContext,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(auth) = ctx.auth_token().header_value() {
            request = request.header(AUTHORIZATION, auth);
        }
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request
    }

    fn api_error(status: StatusCode, text: &str) -> ArgoError {
        let message = serde_json::from_str::<ErrorEnvelope>(text)
            .ok()
            .map(|envelope| envelope.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP {}", status));
        ArgoError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Server responses often omit `kind` on items; fill it in from the request.
fn manifest_from_value(kind: ObjectKind, mut value: Value) -> argo_core::Result<Manifest> {
    if let Value::Object(fields) = &mut value {
        fields
            .entry("kind")
            .or_insert_with(|| json!(kind.as_str()));
    }
    Ok(serde_json::from_value(value)?)
}

fn not_found_for(kind: ObjectKind, name: &str) -> impl FnOnce(ArgoError) -> ArgoError + '_ {
    move |e| match e {
        ArgoError::Api { status: 404, .. } => ArgoError::not_found(kind, name),
        other => other,
    }
}

impl ObjectApi for ServiceClient {
    fn get(
        &self,
        ctx: &CallContext,
        kind: ObjectKind,
        namespace: &str,
        name: &str,
    ) -> argo_core::Result<Manifest> {
        let url = self.collection_url(kind, namespace, &[name]);
        let value = self
            .call(ctx, Method::GET, url, None)
            .map_err(not_found_for(kind, name))?;
        manifest_from_value(kind, value)
    }

    fn list(
        &self,
        ctx: &CallContext,
        kind: ObjectKind,
        namespace: &str,
    ) -> argo_core::Result<Vec<Manifest>> {
        let value = self.call(ctx, Method::GET, self.collection_url(kind, namespace, &[]), None)?;
        let response: ListResponse = serde_json::from_value(value)?;
        response
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| manifest_from_value(kind, item))
            .collect()
    }

    fn create(
        &self,
        ctx: &CallContext,
        namespace: &str,
        mut manifest: Manifest,
    ) -> argo_core::Result<Manifest> {
        let kind = manifest.kind;
        if let Some(instance_id) = ctx.instance_id() {
            manifest.set_label(INSTANCE_ID_LABEL, instance_id);
        }
        let body = Self::request_body(kind, namespace, manifest)?;
        let value = self.call(
            ctx,
            Method::POST,
            self.collection_url(kind, namespace, &[]),
            Some(body),
        )?;
        manifest_from_value(kind, value)
    }

    fn lint(
        &self,
        ctx: &CallContext,
        namespace: &str,
        manifest: Manifest,
    ) -> argo_core::Result<Manifest> {
        let kind = manifest.kind;
        let label = manifest.display_name().to_string();
        let url = self.collection_url(kind, namespace, &["lint"]);
        let body = Self::request_body(kind, namespace, manifest)?;
        let value = self
            .call(ctx, Method::POST, url, Some(body))
            .map_err(|e| match e {
                ArgoError::Api { status, message } if status < 500 => ArgoError::lint(label, message),
                other => other,
            })?;
        manifest_from_value(kind, value)
    }
}
