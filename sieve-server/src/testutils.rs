use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use sieve_config::Config;
use tower::ServiceExt;

use crate::server::{App, make_app};
use crate::service::ServiceState;

/// Token with the `org:read` scope.
pub const READER: &str = "reader-token";
/// Token with the `org:write` scope.
pub const WRITER: &str = "writer-token";
/// Token without any organization scopes.
pub const NOBODY: &str = "nobody-token";

pub fn test_config() -> Config {
    Config::from_json_value(json!({
        "auth": {
            "tokens": [
                {"token": READER, "scopes": ["org:read"]},
                {"token": WRITER, "scopes": ["org:write"]},
                {"token": NOBODY, "scopes": ["project:read"]},
            ]
        }
    }))
    .unwrap()
}

pub fn test_app() -> App {
    let state = ServiceState::start(Arc::new(test_config())).unwrap();
    make_app(state)
}

/// Sends a request through the app and returns the status and the parsed JSON body.
///
/// Responses with an empty body return `Value::Null`.
pub async fn send(
    app: &App,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let body = match body {
        Some(body) => Body::from(serde_json::to_vec(&body).unwrap()),
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

pub async fn get(app: &App, uri: &str, token: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn put(app: &App, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

/// Stores observations of custom metrics in organization 1 with a fixed timestamp.
pub async fn store(app: &App, project: u64, observations: &[(&str, &[(&str, &str)])]) {
    let observations: Vec<Value> = observations
        .iter()
        .map(|(mri, tags)| {
            let tags: serde_json::Map<String, Value> = tags
                .iter()
                .map(|(k, v)| ((*k).to_owned(), Value::from(*v)))
                .collect();
            json!({"mri": mri, "tags": tags, "timestamp": 1_700_000_000})
        })
        .collect();

    let body = json!({
        "org_id": 1,
        "project_id": project,
        "useCase": "custom",
        "observations": observations,
    });

    let (status, _) = send(
        app,
        Method::POST,
        "/internal/metrics/store/",
        Some(WRITER),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}
