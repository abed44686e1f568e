//! Profile dashboard endpoint.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::models::DashboardData;
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/dashboard", get(dashboard))
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DashboardQuery {
    /// Skip the cached value, the retry action after a failed load.
    refresh: bool,
}

#[derive(Serialize)]
struct DashboardBody {
    data: DashboardData,
    was_cached: bool,
}

async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardBody>, HTTPError> {
    if query.refresh {
        let data = state.dashboard.refresh().await?;
        return Ok(Json(DashboardBody {
            data,
            was_cached: false,
        }));
    }
    let fetched = state.dashboard.dashboard().await?;
    Ok(Json(DashboardBody {
        data: fetched.value,
        was_cached: fetched.was_cached,
    }))
}
