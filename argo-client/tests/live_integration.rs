//! Integration tests for live-mode client resolution.
//!
//! These tests spin up a fake Argo Server on a local port and verify that the
//! factory handshakes with it, attaches credentials, and maps server answers
//! onto the client error taxonomy.

use argo_client::{ApiClient, ClientFactory};
use argo_core::config::env;
use argo_core::{cancel_pair, ArgoError, CallContext, ClientConfig, Manifest, Mode, ObjectKind};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Fake server
// ---------------------------------------------------------------------------

type Seen = Arc<Mutex<Vec<Option<String>>>>;

async fn version() -> Json<Value> {
    Json(json!({
        "version": "v3.5.0",
        "gitCommit": "abc123",
        "buildDate": "2024-01-01T00:00:00Z"
    }))
}

async fn get_template(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    seen.lock().unwrap().push(auth);

    if name == "hello" {
        Json(json!({
            "metadata": {"name": "hello", "namespace": namespace},
            "spec": {"entrypoint": "main", "templates": [{"name": "main"}]}
        }))
        .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"code": 5, "message": format!("workflowtemplates.argoproj.io \"{}\" not found", name)})),
        )
            .into_response()
    }
}

async fn list_templates(Path(namespace): Path<String>) -> Json<Value> {
    Json(json!({
        "metadata": {},
        "items": [
            {"metadata": {"name": "a", "namespace": namespace}},
            {"metadata": {"name": "b", "namespace": namespace}}
        ]
    }))
}

async fn lint_template(Path(_namespace): Path<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"code": 3, "message": "spec.templates is required"})),
    )
        .into_response()
}

async fn list_cluster_templates() -> Json<Value> {
    Json(json!({"metadata": {}, "items": null}))
}

async fn create_workflow(Path(namespace): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    let mut workflow = body["workflow"].clone();
    workflow["metadata"]["name"] = json!("run-abc12");
    workflow["metadata"]["namespace"] = json!(namespace);
    Json(workflow)
}

async fn slow_cron(Path((_namespace, _name)): Path<(String, String)>) -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({"metadata": {"name": "late"}}))
}

struct FakeServer {
    base_url: String,
    seen: Seen,
}

fn start_fake_server() -> FakeServer {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/v1/version", get(version))
        .route("/api/v1/workflow-templates/{namespace}", get(list_templates))
        .route(
            "/api/v1/workflow-templates/{namespace}/{name}",
            get(get_template),
        )
        .route(
            "/api/v1/workflow-templates/{namespace}/lint",
            post(lint_template),
        )
        .route(
            "/api/v1/cluster-workflow-templates",
            get(list_cluster_templates),
        )
        .route("/api/v1/workflows/{namespace}", post(create_workflow))
        .route("/api/v1/cron-workflows/{namespace}/{name}", get(slow_cron))
        .with_state(seen.clone());

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    FakeServer { base_url, seen }
}

/// Helper to find a port with nothing listening on it
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn factory(config: ClientConfig, vars: &[(&str, &str)]) -> ClientFactory {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ClientFactory::new(config).with_env_lookup(move |key| vars.get(key).cloned())
}

fn connect(server: &FakeServer) -> (CallContext, ApiClient) {
    factory(
        ClientConfig::live(&server.base_url),
        &[(env::TOKEN, "abc123"), (env::NAMESPACE, "team-a")],
    )
    .new_api_client(CallContext::background())
    .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_live_resolution_carries_token_and_namespace() {
    let server = start_fake_server();
    let (ctx, client) = connect(&server);

    assert_eq!(client.mode(), Mode::Live);
    assert!(client.offline_catalog().is_none());
    let ApiClient::Live(service) = &client else {
        panic!("expected a live client, got {:?}", client);
    };
    assert_eq!(service.server_version().version, "v3.5.0");
    assert_eq!(service.server_version().git_commit, "abc123");
    assert_eq!(service.server_version().build_date, "2024-01-01T00:00:00Z");
    assert_eq!(ctx.namespace(), "team-a");
    assert_eq!(ctx.auth_token().as_str(), Some("abc123"));

    let template = client
        .new_workflow_template_service_client()
        .get_workflow_template(&ctx, ctx.namespace(), "hello")
        .unwrap();
    assert_eq!(template.kind, ObjectKind::WorkflowTemplate);
    assert_eq!(template.namespace(), Some("team-a"));

    let seen = server.seen.lock().unwrap().clone();
    assert_eq!(seen, vec![Some("Bearer abc123".to_string())]);
}

#[test]
fn test_live_explicit_namespace_beats_env() {
    let server = start_fake_server();
    let mut config = ClientConfig::live(&server.base_url);
    config.namespace = Some("team-b".to_string());
    let (ctx, _) = factory(config, &[(env::NAMESPACE, "team-a")])
        .new_api_client(CallContext::background())
        .unwrap();
    assert_eq!(ctx.namespace(), "team-b");
    assert!(!ctx.auth_token().is_present());
}

#[test]
fn test_live_missing_object_is_not_found() {
    let server = start_fake_server();
    let (ctx, client) = connect(&server);

    let err = client
        .new_workflow_template_service_client()
        .get_workflow_template(&ctx, "team-a", "absent")
        .unwrap_err();
    assert!(matches!(
        err,
        ArgoError::NotFound {
            kind: ObjectKind::WorkflowTemplate,
            ref name
        } if name == "absent"
    ));
}

#[test]
fn test_live_list_fills_missing_kind() {
    let server = start_fake_server();
    let (ctx, client) = connect(&server);

    let templates = client
        .new_workflow_template_service_client()
        .list_workflow_templates(&ctx, "team-a")
        .unwrap();
    let names: Vec<&str> = templates.iter().map(Manifest::name).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(templates
        .iter()
        .all(|t| t.kind == ObjectKind::WorkflowTemplate));

    let cluster = client
        .new_cluster_workflow_template_service_client()
        .list_cluster_workflow_templates(&ctx)
        .unwrap();
    assert!(cluster.is_empty());
}

#[test]
fn test_live_create_applies_instance_id() {
    let server = start_fake_server();
    let mut config = ClientConfig::live(&server.base_url);
    config.instance_id = Some("blue".to_string());
    let (ctx, client) = factory(config, &[])
        .new_api_client(CallContext::background())
        .unwrap();

    let mut workflow = Manifest::new(ObjectKind::Workflow, "");
    workflow.metadata.generate_name = Some("run-".to_string());
    let created = client
        .new_workflow_service_client()
        .create_workflow(&ctx, "team-a", workflow)
        .unwrap();

    assert_eq!(created.name(), "run-abc12");
    assert_eq!(created.namespace(), Some("team-a"));
    assert_eq!(
        created
            .metadata
            .labels
            .get(argo_core::object::INSTANCE_ID_LABEL)
            .map(String::as_str),
        Some("blue")
    );
}

#[test]
fn test_live_lint_rejection_is_lint_error() {
    let server = start_fake_server();
    let (ctx, client) = connect(&server);

    let err = client
        .new_workflow_template_service_client()
        .lint_workflow_template(&ctx, "team-a", Manifest::new(ObjectKind::WorkflowTemplate, "t"))
        .unwrap_err();
    assert!(matches!(err, ArgoError::Lint { ref message, .. } if message.contains("templates")));
}

#[test]
fn test_unreachable_server_is_recoverable_not_fatal() {
    let config = ClientConfig::live(format!("http://127.0.0.1:{}", free_port()));
    let err = factory(config, &[])
        .new_api_client(CallContext::background())
        .unwrap_err();
    assert!(matches!(err, ArgoError::Connection { .. }));
    assert!(err.is_recoverable());
    assert!(!err.is_fatal());
    assert!(!err.is_cancelled());
}

#[test]
fn test_cancelled_context_skips_handshake() {
    let server = start_fake_server();
    let (canceller, signal) = cancel_pair();
    canceller.cancel();

    let err = factory(ClientConfig::live(&server.base_url), &[])
        .new_api_client(CallContext::background().with_cancel(signal))
        .unwrap_err();
    assert!(matches!(err, ArgoError::Cancelled));
}

#[test]
fn test_deadline_aborts_in_flight_call() {
    let server = start_fake_server();
    let (ctx, client) = connect(&server);
    let ctx = ctx.with_timeout(Duration::from_millis(200));

    let start = Instant::now();
    let err = client
        .new_cron_workflow_service_client()
        .get_cron_workflow(&ctx, "team-a", "nightly")
        .unwrap_err();
    assert!(err.is_cancelled(), "expected deadline error, got {:?}", err);
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_cancel_aborts_in_flight_call() {
    let server = start_fake_server();
    let (ctx, client) = connect(&server);
    let (canceller, signal) = cancel_pair();
    let ctx = ctx.with_cancel(signal);

    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        canceller.cancel();
    });

    let start = Instant::now();
    let err = client
        .new_cron_workflow_service_client()
        .get_cron_workflow(&ctx, "team-a", "nightly")
        .unwrap_err();
    assert!(matches!(err, ArgoError::Cancelled));
    assert!(start.elapsed() < Duration::from_secs(3));
}
