//! Sign-in flow: screen gate, OAuth callback, login redirects and logout.

use axum::extract::{OriginalUri, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;
use url::Url;

use crate::error::Error;
use crate::session::callback::CALLBACK_PARAMS;
use crate::session::{route, AuthState, ResolutionStatus, Session};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Registers the sign-in routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(gate))
        .route("/callback", get(callback))
        .route("/auth/status", get(status))
        .route("/auth/login/basic", get(login_basic))
        .route("/auth/login/dma", get(login_dma))
        .route("/auth/reconnect", post(reconnect))
        .route("/logout", post(logout))
        .route("/start-over", post(logout))
}

#[derive(Serialize)]
struct AuthStatus {
    session_id: String,
    auth_state: AuthState,
    is_basic_authenticated: bool,
    is_fully_authenticated: bool,
    user_id: Option<String>,
    resolution: ResolutionStatus,
}

impl AuthStatus {
    fn of(session_id: String, session: &Session) -> Self {
        AuthStatus {
            session_id,
            auth_state: session.auth_state(),
            is_basic_authenticated: session.is_basic_authenticated(),
            is_fully_authenticated: session.is_fully_authenticated(),
            user_id: session.user_id().map(str::to_string),
            resolution: session.resolution().clone(),
        }
    }
}

/// Absolute URL for the request target; only path and query matter.
fn request_url(uri: &Uri) -> Result<Url, HTTPError> {
    Url::parse("http://localhost")
        .and_then(|base| base.join(&uri.to_string()))
        .map_err(|e| HTTPError::new(StatusCode::BAD_REQUEST, format!("invalid request URI: {}", e)))
}

fn location_of(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// Consumes the callback parameters of this page load and redirects to the
/// scrubbed URL at `path`.
async fn consume_callback(state: &AppState, url: &Url, path: &str) -> Response {
    let (_, mut scrubbed) = state.apply_callback(url).await;
    scrubbed.set_path(path);
    Redirect::to(&location_of(&scrubbed)).into_response()
}

/// Decides which screen to show. A page load that still carries OAuth
/// parameters is processed and redirected first.
async fn gate(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, HTTPError> {
    let url = request_url(&uri)?;
    if url
        .query_pairs()
        .any(|(key, _)| CALLBACK_PARAMS.contains(&key.as_ref()))
    {
        return Ok(consume_callback(&state, &url, "/").await);
    }
    Ok(Json(route(&state.session.snapshot())).into_response())
}

/// OAuth redirect target for both grants.
async fn callback(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, HTTPError> {
    let url = request_url(&uri)?;
    Ok(consume_callback(&state, &url, "/").await)
}

async fn status(State(state): State<AppState>) -> Json<AuthStatus> {
    let session = state.session.snapshot();
    Json(AuthStatus::of(state.session.id().to_string(), &session))
}

async fn login_basic(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.auth.basic_login_url)
}

/// The data-access grant is only offered once the basic grant is in place.
async fn login_dma(State(state): State<AppState>) -> Result<Redirect, HTTPError> {
    if !state.session.snapshot().is_basic_authenticated() {
        return Err(Error::AuthRequired("access token").into());
    }
    Ok(Redirect::to(&state.config.auth.dma_login_url))
}

/// Re-arms user id resolution after it gave up.
async fn reconnect(State(state): State<AppState>) -> Result<impl IntoResponse, HTTPError> {
    let session = state.session.snapshot();
    if !session.is_fully_authenticated() {
        return Err(Error::AuthRequired("dma token").into());
    }
    if !state.session.reset_resolution() {
        return Err(HTTPError::new(
            StatusCode::CONFLICT,
            "user id resolution does not need a reconnect",
        ));
    }
    warn!(
        event_name = "session.reconnect",
        event_domain = "session",
        session_id = %state.session.id(),
        "user id resolution re-armed on request"
    );
    let session = state.session.snapshot();
    Ok((
        StatusCode::ACCEPTED,
        Json(AuthStatus::of(state.session.id().to_string(), &session)),
    ))
}

async fn logout(State(state): State<AppState>) -> Redirect {
    state.reset_session().await;
    Redirect::to("/")
}
