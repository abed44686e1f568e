//! Posting analytics computed from the all-time post set.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{MediaType, Post};

/// Number of ISO weeks the consistency score looks back over.
pub const CONSISTENCY_WEEKS: i64 = 12;
const TOP_HASHTAGS: usize = 10;

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Totals {
    pub posts: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub views: u64,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct Averages {
    pub likes: f64,
    pub comments: f64,
    pub shares: f64,
    pub views: f64,
    pub engagement: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Consistency {
    pub weeks_considered: i64,
    pub active_weeks: i64,
    /// Share of the considered weeks with at least one post, 0 to 100.
    pub score: u8,
    /// Consecutive active weeks ending at the current one. A current week
    /// without posts yet does not break the streak.
    pub current_streak: i64,
    pub avg_posts_per_week: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FormatShare {
    pub media_type: MediaType,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct HashtagCount {
    pub tag: String,
    pub count: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    pub totals: Totals,
    pub averages: Averages,
    pub consistency: Consistency,
    pub format_distribution: Vec<FormatShare>,
    pub top_hashtags: Vec<HashtagCount>,
    pub repurpose_candidates: u64,
    pub generated_at: DateTime<Utc>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Monday of the ISO week containing `date`.
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// `#tag` tokens of `text`, lowercased. A `#` glued to a preceding word
/// character is not a tag.
pub fn hashtags(text: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut chars = text.chars().peekable();
    let mut previous: Option<char> = None;
    while let Some(c) = chars.next() {
        if c == '#' && !previous.is_some_and(|p| p.is_alphanumeric() || p == '_') {
            let mut tag = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    tag.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if !tag.is_empty() {
                tags.push(tag.to_lowercase());
                previous = tag.chars().last();
                continue;
            }
        }
        previous = Some(c);
    }
    tags
}

impl AnalyticsReport {
    pub fn compute(posts: &[Post], now: DateTime<Utc>, repurpose_min_age: Duration) -> Self {
        let totals = posts.iter().fold(Totals::default(), |mut t, p| {
            t.posts += 1;
            t.likes += p.likes;
            t.comments += p.comments;
            t.shares += p.shares;
            t.views += p.views;
            t
        });
        let averages = Averages {
            likes: round2(ratio(totals.likes, totals.posts)),
            comments: round2(ratio(totals.comments, totals.posts)),
            shares: round2(ratio(totals.shares, totals.posts)),
            views: round2(ratio(totals.views, totals.posts)),
            engagement: round2(ratio(
                totals.likes + totals.comments + totals.shares,
                totals.posts,
            )),
        };

        AnalyticsReport {
            consistency: consistency(posts, now),
            format_distribution: format_distribution(posts),
            top_hashtags: top_hashtags(posts),
            repurpose_candidates: posts
                .iter()
                .filter(|p| p.is_repurpose_eligible(now, repurpose_min_age))
                .count() as u64,
            totals,
            averages,
            generated_at: now,
        }
    }
}

fn consistency(posts: &[Post], now: DateTime<Utc>) -> Consistency {
    let current = week_start(now.date_naive());
    // Offsets in weeks back from the current week; future posts are ignored.
    let mut active: HashSet<i64> = HashSet::new();
    let mut in_window = 0u64;
    for post in posts {
        let offset = (current - week_start(post.created_at.date_naive())).num_days() / 7;
        if offset < 0 {
            continue;
        }
        if offset < CONSISTENCY_WEEKS {
            in_window += 1;
        }
        active.insert(offset);
    }

    let active_weeks = (0..CONSISTENCY_WEEKS).filter(|w| active.contains(w)).count() as i64;
    let first = if active.contains(&0) { 0 } else { 1 };
    let current_streak = (first..).take_while(|w| active.contains(w)).count() as i64;

    Consistency {
        weeks_considered: CONSISTENCY_WEEKS,
        active_weeks,
        score: ((active_weeks as f64 / CONSISTENCY_WEEKS as f64) * 100.0).round() as u8,
        current_streak,
        avg_posts_per_week: round2(in_window as f64 / CONSISTENCY_WEEKS as f64),
    }
}

fn format_distribution(posts: &[Post]) -> Vec<FormatShare> {
    let mut counts: BTreeMap<MediaType, u64> = BTreeMap::new();
    for post in posts {
        *counts.entry(post.media_type).or_default() += 1;
    }
    let total = posts.len() as u64;
    let mut shares: Vec<FormatShare> = counts
        .into_iter()
        .map(|(media_type, count)| FormatShare {
            media_type,
            count,
            percentage: round2(ratio(count, total) * 100.0),
        })
        .collect();
    shares.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.media_type.as_str().cmp(b.media_type.as_str()))
    });
    shares
}

fn top_hashtags(posts: &[Post]) -> Vec<HashtagCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for tag in posts.iter().flat_map(|p| hashtags(&p.text)) {
        *counts.entry(tag).or_default() += 1;
    }
    let mut ranked: Vec<HashtagCount> = counts
        .into_iter()
        .map(|(tag, count)| HashtagCount { tag, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    ranked.truncate(TOP_HASHTAGS);
    ranked
}
