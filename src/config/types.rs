use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the serverless functions live and how to call them.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ApiConfig {
    /// Base URL of the functions, e.g. `https://<project>.supabase.co/functions/v1`.
    pub base_url: String,
    /// Optional project key sent as the `apikey` header.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout. When unset the HTTP client default applies.
    #[serde(default)]
    pub timeout_in_ms: Option<u64>,
}

impl ApiConfig {
    /// Base URL without a trailing slash, so endpoint paths can be appended.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Identity-provider entry points and the user id resolution policy.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct AuthConfig {
    /// Authorization URL for the first (profile/posting) grant.
    pub basic_login_url: String,
    /// Authorization URL for the second (data portability) grant.
    pub dma_login_url: String,
    #[serde(default = "default_resolver_max_attempts")]
    pub resolver_max_attempts: u32,
    #[serde(default = "default_resolver_retry_delay_ms")]
    pub resolver_retry_delay_ms: u64,
    /// How long user-scoped calls wait for the user id before giving up.
    #[serde(default = "default_user_wait_timeout_ms")]
    pub user_wait_timeout_ms: u64,
}

fn default_resolver_max_attempts() -> u32 {
    3
}

fn default_resolver_retry_delay_ms() -> u64 {
    1000
}

fn default_user_wait_timeout_ms() -> u64 {
    5000
}

impl AuthConfig {
    pub fn resolver_retry_delay(&self) -> Duration {
        Duration::from_millis(self.resolver_retry_delay_ms)
    }

    pub fn user_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.user_wait_timeout_ms)
    }
}

/// Freshness windows for the post pipeline and the query caches.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct CacheConfig {
    #[serde(default = "default_posts_ttl_seconds")]
    pub posts_ttl_seconds: u64,
    #[serde(default = "default_query_ttl_seconds")]
    pub query_ttl_seconds: u64,
    /// Period of the background refresh timers; 0 disables them.
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,
}

fn default_posts_ttl_seconds() -> u64 {
    30 * 60
}

fn default_query_ttl_seconds() -> u64 {
    5 * 60
}

fn default_refresh_interval_seconds() -> u64 {
    120
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            posts_ttl_seconds: default_posts_ttl_seconds(),
            query_ttl_seconds: default_query_ttl_seconds(),
            refresh_interval_seconds: default_refresh_interval_seconds(),
        }
    }
}

impl CacheConfig {
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.refresh_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Presentation defaults for the post browser.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct PostsConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Minimum age before a post counts as safe to re-share.
    #[serde(default = "default_repurpose_min_age_days")]
    pub repurpose_min_age_days: i64,
}

fn default_page_size() -> usize {
    10
}

fn default_repurpose_min_age_days() -> i64 {
    30
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            repurpose_min_age_days: default_repurpose_min_age_days(),
        }
    }
}

impl PostsConfig {
    pub fn repurpose_min_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.repurpose_min_age_days)
    }
}
