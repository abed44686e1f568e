use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::utils::value::{counter, opt_string, string_or_default, timestamp};

/// Content format of a post as reported by the posts function.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Text,
    Image,
    Video,
    Article,
    Document,
    Poll,
    Other,
}

impl MediaType {
    pub const ALL: [MediaType; 7] = [
        MediaType::Text,
        MediaType::Image,
        MediaType::Video,
        MediaType::Article,
        MediaType::Document,
        MediaType::Poll,
        MediaType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Text => "text",
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Article => "article",
            MediaType::Document => "document",
            MediaType::Poll => "poll",
            MediaType::Other => "other",
        }
    }

    /// Lenient mapping of the remote vocabulary; unknown values are `Other`.
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "text" => MediaType::Text,
            "image" | "images" | "multi_image" | "carousel" => MediaType::Image,
            "video" => MediaType::Video,
            "article" | "link" => MediaType::Article,
            "document" | "pdf" => MediaType::Document,
            "poll" => MediaType::Poll,
            _ => MediaType::Other,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown media type '{}'", s))
    }
}

/// Read-only projection of one of the user's posts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub media_type: MediaType,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub views: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Post {
    /// Likes, comments and shares; views are reach, not engagement.
    pub fn engagement(&self) -> u64 {
        self.likes + self.comments + self.shares
    }

    /// Old enough to be re-shared without looking like a duplicate.
    pub fn is_repurpose_eligible(&self, now: DateTime<Utc>, min_age: Duration) -> bool {
        now.signed_duration_since(self.created_at) >= min_age
    }

    /// Builds a post from one entry of the remote `posts` array.
    ///
    /// Entries without an id are dropped; every other field falls back to an
    /// empty/zero value. Counters may be flat or nested under `engagement`.
    pub fn from_value(value: &Value) -> Option<Post> {
        let id = opt_string(value, &["id", "postId", "post_id", "urn"])?;
        let stats = value
            .get("engagement")
            .filter(|v| v.is_object())
            .unwrap_or(value);
        Some(Post {
            id,
            text: string_or_default(value, &["text", "content", "commentary"]),
            created_at: timestamp(value, &["createdAt", "created_at", "publishedAt", "timestamp"])
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            media_type: MediaType::from_remote(&string_or_default(
                value,
                &["mediaType", "media_type", "type"],
            )),
            likes: counter(stats, &["likes", "likeCount", "reactions"]),
            comments: counter(stats, &["comments", "commentCount"]),
            shares: counter(stats, &["shares", "shareCount", "reposts"]),
            views: counter(stats, &["views", "impressions", "viewCount"]),
            url: opt_string(value, &["url", "permalink"]),
        })
    }
}

/// Parsed response of the posts function.
#[derive(Debug, Clone, PartialEq)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
    pub is_cached: bool,
    pub timestamp: Option<DateTime<Utc>>,
}

impl PostsResponse {
    pub fn from_value(value: &Value) -> Self {
        let entries = crate::utils::value::array(value, &["posts", "data"]);
        PostsResponse {
            posts: entries.iter().filter_map(Post::from_value).collect(),
            is_cached: crate::utils::value::flag(value, &["isCached", "is_cached"]),
            timestamp: timestamp(value, &["timestamp"]),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_flat_post() {
        let v = json!({
            "id": "urn:li:share:1",
            "text": "Hello #rust",
            "createdAt": "2024-03-01T10:00:00Z",
            "mediaType": "VIDEO",
            "likes": 10,
            "comments": 2,
            "shares": 1,
            "views": 300
        });
        let post = Post::from_value(&v).unwrap();
        assert_eq!(post.media_type, MediaType::Video);
        assert_eq!(post.engagement(), 13);
        assert_eq!(post.views, 300);
    }

    #[test]
    fn parses_nested_engagement_and_defaults() {
        let v = json!({
            "id": 42,
            "content": "no date",
            "engagement": {"likeCount": "7", "commentCount": 1}
        });
        let post = Post::from_value(&v).unwrap();
        assert_eq!(post.id, "42");
        assert_eq!(post.likes, 7);
        assert_eq!(post.shares, 0);
        assert_eq!(post.created_at, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(post.media_type, MediaType::Text);
    }

    #[test]
    fn entries_without_id_are_dropped() {
        let v = json!({"posts": [{"text": "orphan"}, {"id": "a"}], "isCached": true});
        let resp = PostsResponse::from_value(&v);
        assert_eq!(resp.posts.len(), 1);
        assert!(resp.is_cached);
        assert!(resp.timestamp.is_none());
    }

    #[test]
    fn malformed_payload_degrades_to_empty() {
        let resp = PostsResponse::from_value(&json!("not an object"));
        assert!(resp.posts.is_empty());
        assert!(!resp.is_cached);
    }

    #[test]
    fn repurpose_eligibility_depends_on_age() {
        let p = fixtures::post("a", 0, 0);
        let min_age = Duration::days(30);
        assert!(!p.is_repurpose_eligible(p.created_at + Duration::days(29), min_age));
        assert!(p.is_repurpose_eligible(p.created_at + Duration::days(30), min_age));
    }

    #[test]
    fn media_type_from_str_round_trips_names() {
        assert_eq!("Image".parse::<MediaType>().unwrap(), MediaType::Image);
        assert!("hologram".parse::<MediaType>().is_err());
    }
}
