use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{MediaType, Post};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeWindow {
    #[serde(rename = "last_7_days", alias = "7d")]
    Last7Days,
    #[serde(rename = "last_30_days", alias = "30d")]
    Last30Days,
    #[serde(rename = "last_90_days", alias = "90d")]
    Last90Days,
    #[default]
    #[serde(rename = "all_time", alias = "all")]
    AllTime,
}

impl TimeWindow {
    /// Span covered by the window; `None` for all time.
    pub fn span(&self) -> Option<Duration> {
        match self {
            TimeWindow::Last7Days => Some(Duration::days(7)),
            TimeWindow::Last30Days => Some(Duration::days(30)),
            TimeWindow::Last90Days => Some(Duration::days(90)),
            TimeWindow::AllTime => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Recent,
    Oldest,
    Engagement,
    Likes,
    Comments,
    Views,
}

/// Either every media type or exactly one. Written as `all` or the media type name.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum MediaTypeFilter {
    #[default]
    All,
    Only(MediaType),
}

impl MediaTypeFilter {
    pub fn matches(&self, media_type: MediaType) -> bool {
        match self {
            MediaTypeFilter::All => true,
            MediaTypeFilter::Only(wanted) => *wanted == media_type,
        }
    }
}

impl TryFrom<String> for MediaTypeFilter {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return Ok(MediaTypeFilter::All);
        }
        raw.parse().map(MediaTypeFilter::Only)
    }
}

impl From<MediaTypeFilter> for String {
    fn from(filter: MediaTypeFilter) -> Self {
        filter.to_string()
    }
}

impl fmt::Display for MediaTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaTypeFilter::All => f.write_str("all"),
            MediaTypeFilter::Only(media_type) => write!(f, "{}", media_type),
        }
    }
}

/// What the post browser is currently showing.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Filters {
    pub time_window: TimeWindow,
    pub media_type: MediaTypeFilter,
    pub sort: SortOrder,
    pub search: String,
}

impl Filters {
    fn keeps(&self, post: &Post, needle: &str, cutoff: Option<DateTime<Utc>>) -> bool {
        self.media_type.matches(post.media_type)
            && cutoff.map_or(true, |cutoff| post.created_at >= cutoff)
            && (needle.is_empty() || post.text.to_lowercase().contains(needle))
    }
}

/// Counter ordering, largest first; ties go to the newer post.
fn by_counter_desc(a: &Post, b: &Post, counter: fn(&Post) -> u64) -> Ordering {
    counter(b)
        .cmp(&counter(a))
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Selects and orders the posts to show. `posts` is left untouched and the
/// result only contains posts taken from it.
pub fn apply_filters(posts: &[Post], filters: &Filters, now: DateTime<Utc>) -> Vec<Post> {
    let needle = filters.search.trim().to_lowercase();
    let cutoff = filters.time_window.span().map(|span| now - span);

    let mut selected: Vec<Post> = posts
        .iter()
        .filter(|post| filters.keeps(post, &needle, cutoff))
        .cloned()
        .collect();

    match filters.sort {
        SortOrder::Recent => selected.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Oldest => selected.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortOrder::Engagement => selected.sort_by(|a, b| by_counter_desc(a, b, Post::engagement)),
        SortOrder::Likes => selected.sort_by(|a, b| by_counter_desc(a, b, |p| p.likes)),
        SortOrder::Comments => selected.sort_by(|a, b| by_counter_desc(a, b, |p| p.comments)),
        SortOrder::Views => selected.sort_by(|a, b| by_counter_desc(a, b, |p| p.views)),
    }
    selected
}
