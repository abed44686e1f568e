//! Health check endpoint.

use crate::state::AppState;
use axum::{
    body::Body,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

/// Registers the health check route.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Liveness only; remote functions are not probed.
async fn health_check() -> impl IntoResponse {
    Response::new(Body::from("OK"))
}
