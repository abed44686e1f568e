//! HTTP route definitions and handlers.
//!
//! Endpoints are grouped by concern: sign-in flow, posts and analytics,
//! dashboard, synergy partners, health and metrics.

mod auth_routes;
mod dashboard_routes;
mod health_routes;
mod metrics;
mod partner_routes;
mod post_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all routes and the shared state attached.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_routes::routes())
        .merge(post_routes::routes())
        .merge(dashboard_routes::routes())
        .merge(partner_routes::routes())
        .merge(health_routes::routes())
        .merge(metrics::routes())
        .with_state(state)
}
