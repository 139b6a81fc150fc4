//! Shared helpers for API integration tests.
//!
//! Tests run against the real router built by [`build_app_router`], with
//! the offline stub capabilities wired in, so every middleware layer and
//! handler path matches production. Only the upstream adapters differ.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pictor_capability::stub::stub_capabilities;
use pictor_capability::Capabilities;
use pictor_core::job::JobStatus;
use pictor_core::retry::RetryConfig;
use pictor_core::types::JobId;
use pictor_pipeline::{AdmissionGate, GenerationConfig};
use pictor_registry::JobRegistry;
use serde_json::Value;
use tower::ServiceExt;

use pictor_api::config::ServerConfig;
use pictor_api::router::build_app_router;
use pictor_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        queue_capacity: 2,
        job_timeout_secs: 30,
        retention_ttl_hours: 24,
        sweep_interval_secs: 600,
    }
}

/// Build the full application router with stub capabilities.
///
/// Returns the registry alongside the router so tests can observe job
/// state directly when polling through HTTP would be circular.
pub fn build_test_app() -> (Router, JobRegistry) {
    build_test_app_with(stub_capabilities())
}

/// Build the app with a custom capability set, for tests that need to
/// control upstream behaviour (e.g. a renderer that blocks or fails).
pub fn build_test_app_with(capabilities: Capabilities) -> (Router, JobRegistry) {
    let config = test_config();
    let registry = JobRegistry::new();
    let gate = AdmissionGate::new(
        registry.clone(),
        capabilities,
        GenerationConfig {
            queue_capacity: config.queue_capacity,
            retry: RetryConfig::default(),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
        },
    );

    let state = AppState {
        gate,
        registry: registry.clone(),
        config: Arc::new(config.clone()),
    };

    (build_app_router(state, &config), registry)
}

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a POST request with a JSON body against the app.
pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Issue a DELETE request against the app.
pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body into parsed JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body must be valid JSON")
}

/// Submit a request and return `(status, body)` for the response.
pub async fn submit(app: Router, body: Value) -> (StatusCode, Value) {
    let response = post_json(app, "/api/v1/generate", body).await;
    let status = response.status();
    (status, body_json(response).await)
}

/// Poll the registry until the job reaches a terminal status.
pub async fn wait_terminal(registry: &JobRegistry, job_id: JobId) {
    for _ in 0..200 {
        if let Some(job) = registry.get(job_id).await {
            if job.status == JobStatus::Completed || job.status == JobStatus::Failed {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal status in time");
}
