//! Post browser and analytics endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsReport;
use crate::models::Post;
use crate::posts::{
    apply_filters, paginate, CacheMeta, Filters, LoadState, MediaTypeFilter, Pagination,
    PostScope, SortOrder, TimeWindow,
};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts))
        .route("/api/posts/cache", delete(clear_posts_cache))
        .route("/api/analytics", get(analytics))
}

// Fields are listed one by one: query strings and `#[serde(flatten)]` do not
// mix for numbers.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct PostsQuery {
    page: Option<usize>,
    page_size: Option<usize>,
    sort: SortOrder,
    media_type: MediaTypeFilter,
    time_window: TimeWindow,
    search: String,
    all_time: bool,
    refresh: bool,
}

impl PostsQuery {
    fn filters(&self) -> Filters {
        Filters {
            time_window: self.time_window,
            media_type: self.media_type,
            sort: self.sort,
            search: self.search.clone(),
        }
    }
}

#[derive(Serialize)]
struct PostView {
    #[serde(flatten)]
    post: Post,
    engagement: u64,
    repurpose_eligible: bool,
}

#[derive(Serialize)]
struct PostsBody {
    items: Vec<PostView>,
    pagination: Pagination,
    filters: Filters,
    cache: CacheMeta,
    state: LoadState,
}

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostsQuery>,
) -> Result<Json<PostsBody>, HTTPError> {
    let scope = PostScope {
        all_time: query.all_time,
    };
    let now = Utc::now();
    let (set, meta) = match state.posts.load(query.refresh, query.all_time).await {
        Ok(loaded) => (loaded.set, loaded.meta),
        // A failed refresh still shows the last good set, flagged as stale.
        Err(e) => match state.posts.cached(scope).await {
            Some(set) => {
                let meta = CacheMeta::for_set(&set, now, true, true);
                (set, meta)
            }
            None => return Err(e.into()),
        },
    };
    let filters = query.filters();
    let min_age = state.config.posts.repurpose_min_age();

    let selected = apply_filters(&set.posts, &filters, now);
    let page = paginate(
        &selected,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(state.config.posts.page_size),
    );
    let items = page
        .items
        .into_iter()
        .map(|post| PostView {
            engagement: post.engagement(),
            repurpose_eligible: post.is_repurpose_eligible(now, min_age),
            post,
        })
        .collect();

    Ok(Json(PostsBody {
        items,
        pagination: page.pagination,
        filters,
        cache: meta,
        state: state.posts.state(scope).await,
    }))
}

async fn clear_posts_cache(State(state): State<AppState>) -> StatusCode {
    state.posts.clear_cache().await;
    StatusCode::NO_CONTENT
}

/// Analytics always look at the all-time set.
async fn analytics(State(state): State<AppState>) -> Result<Json<AnalyticsReport>, HTTPError> {
    let loaded = state.posts.load(false, true).await?;
    Ok(Json(AnalyticsReport::compute(
        &loaded.set.posts,
        Utc::now(),
        state.config.posts.repurpose_min_age(),
    )))
}
