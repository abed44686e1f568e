#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response};
use axum::Router;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use postpulse::config::{Config, ConfigV1};
use postpulse::metrics::Metrics;
use postpulse::routes::create_router;
use postpulse::startup::build_state;
use postpulse::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

const TEST_CONFIG: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:0
logging:
  level: "debug"
  format: "json"
api:
  base_url: "{base_url}"
  api_key: "anon-key"
  timeout_in_ms: 2000
auth:
  basic_login_url: https://idp.example.com/authorize?scope=basic
  dma_login_url: https://idp.example.com/authorize?scope=dma
  resolver_max_attempts: 2
  resolver_retry_delay_ms: 10
  user_wait_timeout_ms: 2000
cache:
  refresh_interval_seconds: 0
posts:
  page_size: 2
"#;

/// Test config pointing the serverless functions at `base_url`.
pub fn test_config(base_url: &str) -> ConfigV1 {
    Figment::new()
        .merge(Yaml::string(&TEST_CONFIG.replace("{base_url}", base_url)))
        .extract::<Config>()
        .expect("test config should parse")
        .into_latest()
}

/// Router plus state, with the user id resolver running in the background.
pub fn build_app(config: ConfigV1) -> (Router, AppState) {
    let (state, resolver) =
        build_state(Arc::new(config), Metrics::new()).expect("state should build");
    Arc::new(resolver).spawn();
    (create_router(state.clone()), state)
}

pub fn request(method: Method, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

pub fn json_request(method: Method, path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("router should respond")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Polls `/auth/status` until `done` holds or two seconds pass.
pub async fn wait_for_status(app: &Router, done: impl Fn(&Value) -> bool) -> Value {
    let mut status = Value::Null;
    for _ in 0..200 {
        status = body_json(send(app, request(Method::GET, "/auth/status")).await).await;
        if done(&status) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    status
}
