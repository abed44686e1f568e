//! Application startup and server initialization.
//!
//! Wires the session, the HTTP clients and the post pipeline together,
//! starts the user id resolver and serves the routes.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{ApiClient, DashboardClient, HttpPostSource, HttpUserIdResolver, PartnerClient};
use crate::config::ConfigV1;
use crate::error::Error;
use crate::metrics::Metrics;
use crate::posts::PostPipeline;
use crate::routes;
use crate::session::{ResolverPolicy, TokenStore, UserIdResolver};
use crate::state::AppState;

/// Builds the application state and the (not yet started) user id resolver.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub fn build_state(
    config: Arc<ConfigV1>,
    metrics: Metrics,
) -> Result<(AppState, UserIdResolver), Error> {
    let client = ApiClient::new(&config.api, metrics.clone())?;
    let session = Arc::new(TokenStore::new());
    let query_ttl = std::time::Duration::from_secs(config.cache.query_ttl_seconds);
    let refresh_interval = config.cache.refresh_interval();

    let posts = PostPipeline::new(
        Arc::new(HttpPostSource::new(client.clone(), session.clone())),
        std::time::Duration::from_secs(config.cache.posts_ttl_seconds),
        metrics.clone(),
    );
    let dashboard = DashboardClient::new(
        client.clone(),
        session.clone(),
        query_ttl,
        refresh_interval,
    );
    let partners = PartnerClient::new(
        client.clone(),
        session.clone(),
        config.auth.user_wait_timeout(),
        query_ttl,
        refresh_interval,
    );
    let resolver = UserIdResolver::new(
        session.clone(),
        Arc::new(HttpUserIdResolver::new(client)),
        ResolverPolicy::new(
            config.auth.resolver_max_attempts,
            config.auth.resolver_retry_delay(),
        ),
        metrics.clone(),
    );

    let state = AppState {
        config,
        session,
        posts: Arc::new(posts),
        dashboard: Arc::new(dashboard),
        partners: Arc::new(partners),
        metrics,
    };
    Ok((state, resolver))
}

/// Initializes and runs the application server.
///
/// # Errors
///
/// Returns an error if the server fails to bind to the specified address
/// or encounters a runtime error during execution.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let (state, resolver) = build_state(config.clone(), Metrics::new())?;
    let resolver_task = Arc::new(resolver).spawn();

    info!("Starting server on {}", config.bind_address);
    let app = routes::create_router(state);
    let listener = TcpListener::bind(&config.bind_address).await?;
    let served = axum::serve(listener, app).await;

    resolver_task.abort();
    served?;
    Ok(())
}
