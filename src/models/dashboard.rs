use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::value::{counter, field, opt_string, string_or_default};

/// Profile snapshot shown on the dashboard cards.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardData {
    pub name: String,
    pub headline: String,
    pub avatar_url: Option<String>,
    pub followers: u64,
    pub connections: u64,
    pub profile_views: u64,
    pub post_count: u64,
}

impl DashboardData {
    /// Reads the dashboard function's payload, either flat or under `profile`/`data`.
    pub fn from_value(value: &Value) -> Self {
        let root = field(value, &["data"]).unwrap_or(value);
        let profile = field(root, &["profile"]).unwrap_or(root);
        DashboardData {
            name: string_or_default(profile, &["name", "fullName", "localizedName"]),
            headline: string_or_default(profile, &["headline"]),
            avatar_url: opt_string(profile, &["avatarUrl", "avatar_url", "picture"]),
            followers: counter(root, &["followers", "followerCount"]),
            connections: counter(root, &["connections", "connectionCount"]),
            profile_views: counter(root, &["profileViews", "profile_views"]),
            post_count: counter(root, &["postCount", "post_count", "totalPosts"]),
        }
    }
}
