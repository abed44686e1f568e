use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cached::{Cached, TimedCache};
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::timer::RefreshTimer;
use crate::error::Error;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::utils::log_throttle::should_emit;

/// Re-runnable remote call producing a fresh value for one key.
pub type FetchFn<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, Error>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<V> {
    pub value: V,
    pub was_cached: bool,
}

/// Latest request generation issued per key.
///
/// Every remote call for a key takes the next generation before it starts,
/// and its result may only be written while that generation is still the
/// latest one for the key.
#[derive(Clone, Default)]
struct Generations(Arc<std::sync::Mutex<HashMap<String, u64>>>);

impl Generations {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, u64>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn issue(&self, key: &str) -> u64 {
        let mut issued = self.lock();
        let generation = issued.entry(key.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_latest(&self, key: &str, generation: u64) -> bool {
        self.lock().get(key).copied().unwrap_or(0) == generation
    }

    /// Supersedes every call in flight. Entries are kept so generations
    /// never repeat for a key.
    fn bump_all(&self) {
        for generation in self.lock().values_mut() {
            *generation += 1;
        }
    }
}

/// Keyed TTL cache with one background refresh timer per key.
///
/// Values are written only after the remote call returned, and only by the
/// most recently issued call for the key; the lock is never held across it.
pub struct QueryCache<V> {
    name: &'static str,
    entries: Arc<Mutex<TimedCache<String, V>>>,
    timers: std::sync::Mutex<HashMap<String, RefreshTimer>>,
    refresh_interval: Option<Duration>,
    generations: Generations,
    metrics: Metrics,
}

/// Stores `value` unless a newer call for `key` was issued meanwhile.
async fn write_if_latest<V>(
    entries: &Mutex<TimedCache<String, V>>,
    generations: &Generations,
    key: &str,
    generation: u64,
    value: V,
) -> bool {
    let mut entries = entries.lock().await;
    if !generations.is_latest(key, generation) {
        return false;
    }
    entries.cache_set(key.to_string(), value);
    true
}

impl<V> QueryCache<V>
where
    V: Clone + Send + 'static,
{
    pub fn new(
        name: &'static str,
        ttl: Duration,
        refresh_interval: Option<Duration>,
        metrics: Metrics,
    ) -> Self {
        QueryCache {
            name,
            entries: Arc::new(Mutex::new(TimedCache::with_lifespan(ttl.as_secs()))),
            timers: std::sync::Mutex::new(HashMap::new()),
            refresh_interval,
            generations: Generations::default(),
            metrics,
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().await.cache_get(key).cloned()
    }

    pub async fn get_or_fetch(&self, key: &str, fetch: FetchFn<V>) -> Result<Fetched<V>, Error> {
        if let Some(value) = self.get(key).await {
            self.metrics.record_cache_lookup(self.name, "hit");
            if let Some(suppressed) = should_emit("fetch.query_cache.hit", Duration::from_secs(30)) {
                debug!(
                    event_name = "fetch.query_cache.hit",
                    event_domain = "fetch",
                    cache = self.name,
                    key,
                    suppressed,
                    "query cache hit"
                );
            }
            return Ok(Fetched {
                value,
                was_cached: true,
            });
        }

        self.metrics.record_cache_lookup(self.name, "miss");
        let generation = self.generations.issue(key);
        let value = fetch().await?;
        if write_if_latest(&self.entries, &self.generations, key, generation, value.clone()).await {
            self.ensure_refresh(key, fetch);
        } else {
            debug!(
                cache = self.name,
                key, generation, "superseded fetch result not cached"
            );
        }
        Ok(Fetched {
            value,
            was_cached: false,
        })
    }

    /// Stores `value` as the newest state of `key`; calls still in flight
    /// for the key will not overwrite it.
    pub async fn insert(&self, key: &str, value: V) {
        let mut entries = self.entries.lock().await;
        self.generations.issue(key);
        entries.cache_set(key.to_string(), value);
    }

    /// Drops the value for `key` so the next read goes to the remote, and
    /// discards any call for the key still in flight. The refresh timer for
    /// the key keeps running.
    pub async fn invalidate(&self, key: &str) {
        self.generations.issue(key);
        self.entries.lock().await.cache_remove(key);
    }

    /// Drops every value and stops every refresh timer.
    pub async fn clear(&self) {
        self.generations.bump_all();
        self.lock_timers().clear();
        self.entries.lock().await.cache_clear();
        debug!(cache = self.name, "query cache cleared");
    }

    pub fn has_refresh_timer(&self, key: &str) -> bool {
        self.lock_timers()
            .get(key)
            .is_some_and(RefreshTimer::is_running)
    }

    fn lock_timers(&self) -> std::sync::MutexGuard<'_, HashMap<String, RefreshTimer>> {
        match self.timers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn ensure_refresh(&self, key: &str, fetch: FetchFn<V>) {
        let Some(period) = self.refresh_interval else {
            return;
        };
        let mut timers = self.lock_timers();
        if timers.get(key).is_some_and(RefreshTimer::is_running) {
            return;
        }

        let entries = self.entries.clone();
        let generations = self.generations.clone();
        let name = self.name;
        let owned_key = key.to_string();
        let timer = RefreshTimer::start(period, move || {
            let entries = entries.clone();
            let generations = generations.clone();
            let fetch = fetch.clone();
            let key = owned_key.clone();
            async move {
                let generation = generations.issue(&key);
                match fetch().await {
                    Ok(value) => {
                        if !write_if_latest(&entries, &generations, &key, generation, value).await {
                            debug!(
                                cache = name,
                                key = key.as_str(),
                                generation,
                                "background refresh superseded"
                            );
                        }
                    }
                    Err(e) => warn!(
                        event_name = "fetch.query_cache.refresh_failed",
                        event_domain = "fetch",
                        cache = name,
                        key = key.as_str(),
                        error = %e,
                        "background refresh failed; keeping previous value"
                    ),
                }
            }
        });
        timers.insert(key.to_string(), timer);
    }
}
