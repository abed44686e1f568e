//! Cached post sets per scope.
//!
//! Each scope keeps the last good set, the latest issued fetch generation and
//! the fetch currently in flight. A fetch result is written back only when its
//! generation is still the latest issued for the scope, so the most recently
//! issued request wins regardless of completion order.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{Post, PostsResponse};
use crate::utils::log_throttle::should_emit;

/// Where posts come from.
#[async_trait::async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch(&self, scope: PostScope) -> Result<PostsResponse, Error>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PostScope {
    pub all_time: bool,
}

/// Posts of one scope, in the order the remote returned them.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CachedPostSet {
    pub posts: Vec<Post>,
    pub fetched_at: DateTime<Utc>,
    pub is_all_time: bool,
    /// The remote's own `isCached` flag.
    pub server_cached: bool,
    /// When the remote says it produced the data, if it says so.
    pub server_timestamp: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMeta {
    pub from_cache: bool,
    pub is_stale: bool,
    pub age_seconds: i64,
    pub fetched_at: DateTime<Utc>,
    pub server_cached: bool,
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl CacheMeta {
    pub fn for_set(set: &CachedPostSet, now: DateTime<Utc>, from_cache: bool, is_stale: bool) -> Self {
        CacheMeta {
            from_cache,
            is_stale,
            age_seconds: now.signed_duration_since(set.fetched_at).num_seconds().max(0),
            fetched_at: set.fetched_at,
            server_cached: set.server_cached,
            server_timestamp: set.server_timestamp,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostLoad {
    pub set: Arc<CachedPostSet>,
    pub meta: CacheMeta,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Success,
    Error {
        message: String,
    },
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<CachedPostSet>, Error>>>;

#[derive(Default)]
struct Slot {
    set: Option<Arc<CachedPostSet>>,
    state: LoadState,
    issued: u64,
    in_flight: Option<SharedFetch>,
}

type Slots = Arc<Mutex<HashMap<PostScope, Slot>>>;

pub struct PostPipeline {
    source: Arc<dyn PostSource>,
    ttl: Duration,
    slots: Slots,
    metrics: Metrics,
}

impl PostPipeline {
    pub fn new(source: Arc<dyn PostSource>, ttl: StdDuration, metrics: Metrics) -> Self {
        PostPipeline {
            source,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(365 * 100)),
            slots: Arc::new(Mutex::new(HashMap::new())),
            metrics,
        }
    }

    /// Returns the posts of the scope.
    ///
    /// Fresh data is served as is. Stale data is served immediately while a
    /// background fetch revalidates it. Without data, or when forced, the
    /// call waits for the remote; concurrent unforced callers share one fetch.
    pub async fn load(&self, force_refresh: bool, all_time: bool) -> Result<PostLoad, Error> {
        let scope = PostScope { all_time };
        let now = Utc::now();

        let pending = {
            let mut slots = self.slots.lock().await;
            let slot = slots.entry(scope).or_default();
            match slot.set.clone() {
                Some(set) if !force_refresh => {
                    let is_stale = !self.is_fresh(&set, now);
                    if is_stale {
                        self.metrics.record_cache_lookup("posts", "stale");
                        if slot.in_flight.is_none() {
                            debug!(all_time, "serving stale posts, revalidating in background");
                            let _ = self.start_fetch(slot, scope);
                        }
                    } else {
                        self.metrics.record_cache_lookup("posts", "hit");
                        if let Some(suppressed) =
                            should_emit("posts.cache.hit", StdDuration::from_secs(30))
                        {
                            debug!(
                                event_name = "posts.cache.hit",
                                event_domain = "posts",
                                all_time,
                                suppressed,
                                "served posts from cache"
                            );
                        }
                    }
                    return Ok(PostLoad {
                        meta: CacheMeta::for_set(&set, now, true, is_stale),
                        set,
                    });
                }
                _ => {
                    self.metrics.record_cache_lookup("posts", "miss");
                    let joinable = if force_refresh {
                        None
                    } else {
                        slot.in_flight.clone()
                    };
                    match joinable {
                        Some(in_flight) => in_flight,
                        None => self.start_fetch(slot, scope),
                    }
                }
            }
        };

        let set = pending.await?;
        Ok(PostLoad {
            meta: CacheMeta::for_set(&set, Utc::now(), false, false),
            set,
        })
    }

    /// Drops every cached set. Fetches still in flight are ignored when they land.
    pub async fn clear_cache(&self) {
        let mut slots = self.slots.lock().await;
        for slot in slots.values_mut() {
            slot.issued += 1;
            slot.set = None;
            slot.in_flight = None;
            slot.state = LoadState::Idle;
        }
        info!(
            event_name = "posts.cache.cleared",
            event_domain = "posts",
            "post cache cleared"
        );
    }

    /// Last good set of the scope, whatever its age.
    pub async fn cached(&self, scope: PostScope) -> Option<Arc<CachedPostSet>> {
        self.slots
            .lock()
            .await
            .get(&scope)
            .and_then(|slot| slot.set.clone())
    }

    pub async fn state(&self, scope: PostScope) -> LoadState {
        self.slots
            .lock()
            .await
            .get(&scope)
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }

    fn is_fresh(&self, set: &CachedPostSet, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(set.fetched_at) < self.ttl
    }

    /// Issues the next generation for `scope`. The fetch runs on its own task,
    /// so it completes even if every caller stops waiting.
    fn start_fetch(&self, slot: &mut Slot, scope: PostScope) -> SharedFetch {
        slot.issued += 1;
        let generation = slot.issued;
        slot.state = LoadState::Loading;

        let source = self.source.clone();
        let slots = self.slots.clone();
        let task = tokio::spawn(async move {
            let result = source.fetch(scope).await.map(|response| {
                Arc::new(CachedPostSet {
                    posts: response.posts,
                    fetched_at: Utc::now(),
                    is_all_time: scope.all_time,
                    server_cached: response.is_cached,
                    server_timestamp: response.timestamp,
                })
            });
            complete(&slots, scope, generation, &result).await;
            result
        });

        let shared = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(Error::network("post fetch", format!("fetch task failed: {}", e))),
            }
        }
        .boxed()
        .shared();
        slot.in_flight = Some(shared.clone());
        shared
    }
}

async fn complete(
    slots: &Slots,
    scope: PostScope,
    generation: u64,
    result: &Result<Arc<CachedPostSet>, Error>,
) {
    let mut slots = slots.lock().await;
    let Some(slot) = slots.get_mut(&scope) else {
        return;
    };
    if slot.issued != generation {
        debug!(
            all_time = scope.all_time,
            generation,
            latest = slot.issued,
            "discarding superseded post response"
        );
        return;
    }
    slot.in_flight = None;
    match result {
        Ok(set) => {
            info!(
                event_name = "posts.fetch.completed",
                event_domain = "posts",
                all_time = scope.all_time,
                count = set.posts.len(),
                server_cached = set.server_cached,
                "post set refreshed"
            );
            slot.set = Some(set.clone());
            slot.state = LoadState::Success;
        }
        Err(e) => {
            warn!(
                event_name = "posts.fetch.failed",
                event_domain = "posts",
                all_time = scope.all_time,
                error = %e,
                kept_previous = slot.set.is_some(),
                "post fetch failed"
            );
            slot.state = LoadState::Error {
                message: e.to_string(),
            };
        }
    }
}
