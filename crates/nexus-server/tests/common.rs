//! Shared helpers for server API tests.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use nexus_server::AppState;
use serde_json::Value;
use tower::ServiceExt;

/// Builds a router over a fresh on-disk database.
///
/// The `TempDir` must stay alive for the duration of the test.
pub fn test_app() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("test.db");
    let pool = nexus_db::create_pool(
        path.to_str().expect("utf-8 temp path"),
        nexus_db::DbRuntimeSettings::default(),
    )
    .expect("should create pool");
    {
        let conn = pool.get().expect("should get connection");
        nexus_db::run_migrations(&conn).expect("migrations should succeed");
    }
    (nexus_server::app(AppState::new(pool)), dir)
}

/// Sends one request to the router and parses the JSON response.
pub async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request build"))
        .await
        .expect("router should respond");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}
