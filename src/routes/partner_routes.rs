//! Synergy partner endpoints. Every call here needs the resolved user id.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::models::{Invitation, Partner, UserSummary};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/partners", get(list_partners))
        .route("/api/partners/search", get(search_users))
        .route("/api/partners/:id", delete(remove_partner))
        .route("/api/invitations", get(list_invitations).post(send_invitation))
        .route("/api/invitations/:id/accept", post(accept_invitation))
        .route("/api/invitations/:id/decline", post(decline_invitation))
}

#[derive(Serialize)]
struct Listing<T> {
    items: Vec<T>,
    was_cached: bool,
}

#[derive(Serialize)]
struct InvitationListing {
    items: Vec<Invitation>,
    /// Received and still unanswered.
    pending: Vec<Invitation>,
    was_cached: bool,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
struct NewInvitation {
    to_user_id: String,
    #[serde(default)]
    message: Option<String>,
}

async fn list_partners(
    State(state): State<AppState>,
) -> Result<Json<Listing<Partner>>, HTTPError> {
    let fetched = state.partners.partners().await?;
    Ok(Json(Listing {
        items: fetched.value,
        was_cached: fetched.was_cached,
    }))
}

async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>, HTTPError> {
    Ok(Json(state.partners.search_users(&query.q).await?))
}

async fn remove_partner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HTTPError> {
    state.partners.remove_partner(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_invitations(
    State(state): State<AppState>,
) -> Result<Json<InvitationListing>, HTTPError> {
    let fetched = state.partners.invitations().await?;
    let user_id = state.session.snapshot().user_id().map(str::to_string);
    let pending = match user_id {
        Some(user_id) => fetched
            .value
            .iter()
            .filter(|i| i.is_pending_for(&user_id))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    Ok(Json(InvitationListing {
        items: fetched.value,
        pending,
        was_cached: fetched.was_cached,
    }))
}

async fn send_invitation(
    State(state): State<AppState>,
    Json(body): Json<NewInvitation>,
) -> Result<(StatusCode, Json<Option<Invitation>>), HTTPError> {
    let sent = state
        .partners
        .send_invitation(&body.to_user_id, body.message.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(sent)))
}

async fn accept_invitation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HTTPError> {
    state.partners.accept_invitation(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn decline_invitation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, HTTPError> {
    state.partners.decline_invitation(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
