//! Operational summaries derived from the event log.
//!
//! A [`Summary`] is never persisted. It is rebuilt from the full log on every
//! read, so it depends only on the events and on the instant it was taken.

use crate::domain::event::{Event, SubjectId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of hourly buckets in [`Summary::requests_per_hour`].
pub const HOURLY_BUCKETS: usize = 24;

/// Number of entries in [`Summary::popular_subjects`] at most.
pub const POPULAR_LIMIT: usize = 10;

/// Number of entries in [`Summary::recent_events`] at most.
pub const RECENT_LIMIT: usize = 50;

/// Request count for one calendar hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBucket {
    /// Local calendar hour, formatted `YYYY-MM-DDTHH`
    pub hour: String,
    /// First instant of the hour
    pub starts_at: DateTime<Utc>,
    pub count: u64,
}

/// How often one subject was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCount {
    #[serde(flatten)]
    pub subject: SubjectId,
    pub count: u64,
}

/// Point-in-time view over the whole event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Instant the summary was computed at
    pub generated_at: DateTime<Utc>,
    pub total_requests: u64,
    pub total_requests_today: u64,
    /// `content_units_today + conversation_units_today`
    pub total_units_today: u64,
    pub content_units_today: u64,
    pub conversation_units_today: u64,
    /// Cache hits over all content fetches, `0.0` when there are none
    pub cache_hit_rate: f64,
    /// Oldest hour first, always [`HOURLY_BUCKETS`] entries
    pub requests_per_hour: Vec<HourBucket>,
    /// Most requested subjects, count descending
    pub popular_subjects: Vec<SubjectCount>,
    /// Newest first
    pub recent_events: Vec<Event>,
}

impl Summary {
    /// Sum of all hourly bucket counts.
    pub fn requests_last_24h(&self) -> u64 {
        self.requests_per_hour.iter().map(|bucket| bucket.count).sum()
    }

    /// One-line description for operator logs.
    pub fn format_message(&self) -> String {
        format!(
            "{} requests ({} today, {} in the last 24h), {} units today, cache hit rate {:.1}%",
            self.total_requests,
            self.total_requests_today,
            self.requests_last_24h(),
            self.total_units_today,
            self.cache_hit_rate * 100.0
        )
    }
}
