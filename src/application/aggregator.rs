//! Summaries and listings computed from the event log.
//!
//! Nothing is cached: every call reads the log and recomputes from scratch,
//! so results depend only on the log contents and the instant of the call.
//! An unreadable log yields a zeroed summary (or an empty page) and a
//! warning, never an error.

use crate::application::ports::{Clock, EventLog};
use crate::domain::event::{Event, EventKind, SubjectId};
use crate::domain::summary::{
    HourBucket, SubjectCount, Summary, HOURLY_BUCKETS, POPULAR_LIMIT, RECENT_LIMIT,
};
use chrono::{DateTime, Duration, Local, NaiveTime, Offset, TimeZone, Timelike, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

const SECS_PER_HOUR: i64 = 3_600;

/// Filter for [`Aggregator::events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventQuery {
    /// Maximum number of events returned
    pub limit: usize,
    /// Only events with `timestamp >= since`
    pub since: Option<DateTime<Utc>>,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            limit: RECENT_LIMIT,
            since: None,
        }
    }
}

impl EventQuery {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }
}

/// One page of raw events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    /// Newest first, at most `limit` entries
    pub events: Vec<Event>,
    /// Number of events matching the query before truncation
    pub total: usize,
}

/// Read side of the telemetry pipeline.
#[derive(Debug)]
pub struct Aggregator<L>
where
    L: EventLog,
{
    log: L,
    clock: Arc<dyn Clock>,
}

impl<L> Aggregator<L>
where
    L: EventLog,
{
    pub fn new(log: L, clock: Arc<dyn Clock>) -> Self {
        Self { log, clock }
    }

    /// Summary as of now, with days and hours in the host's local time zone.
    pub fn summarize(&self) -> Summary {
        self.summarize_at(self.clock.wall_now().with_timezone(&Local))
    }

    /// Summary as of `now`, with days and hours taken in `now`'s time zone.
    pub fn summarize_at<Tz>(&self, now: DateTime<Tz>) -> Summary
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        match self.log.read_all() {
            Ok(events) => summarize_events(&events, &now),
            Err(err) => {
                warn!(error = %err, "telemetry log unreadable, returning an empty summary");
                summarize_events(&[], &now)
            }
        }
    }

    /// Raw events matching `query`, newest first.
    pub fn events(&self, query: EventQuery) -> EventPage {
        let read = match query.since {
            Some(since) => self.log.read_since(since),
            None => self.log.read_all(),
        };
        let events = match read {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "telemetry log unreadable, returning no events");
                Vec::new()
            }
        };

        let total = events.len();
        let events = events.into_iter().rev().take(query.limit).collect();
        EventPage { events, total }
    }

    pub fn log(&self) -> &L {
        &self.log
    }
}

/// Compute a summary over `events` (oldest first) as of `now`.
pub fn summarize_events<Tz>(events: &[Event], now: &DateTime<Tz>) -> Summary
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let tz = now.timezone();
    let generated_at = now.with_timezone(&Utc);
    let today_start = start_of_day(now);

    let mut total_requests_today = 0u64;
    let mut content_units_today = 0u64;
    let mut conversation_units_today = 0u64;
    for event in events.iter().filter(|event| event.timestamp() >= today_start) {
        total_requests_today += 1;
        let units = event.total_units().unwrap_or(0);
        match event.kind() {
            EventKind::ContentFetch => {
                content_units_today = content_units_today.saturating_add(units)
            }
            EventKind::ConversationTurn => {
                conversation_units_today = conversation_units_today.saturating_add(units)
            }
        }
    }

    let (content_fetches, cache_hits) = events
        .iter()
        .filter(|event| event.kind() == EventKind::ContentFetch)
        .fold((0u64, 0u64), |(fetches, hits), event| {
            (fetches + 1, hits + u64::from(event.is_cache_hit()))
        });
    let cache_hit_rate = if content_fetches == 0 {
        0.0
    } else {
        cache_hits as f64 / content_fetches as f64
    };

    let recent: Vec<Event> = events.iter().rev().take(RECENT_LIMIT).cloned().collect();

    Summary {
        generated_at,
        total_requests: events.len() as u64,
        total_requests_today,
        total_units_today: content_units_today.saturating_add(conversation_units_today),
        content_units_today,
        conversation_units_today,
        cache_hit_rate,
        requests_per_hour: hourly_histogram(events, generated_at, &tz),
        popular_subjects: popular_subjects(events),
        recent_events: recent,
    }
}

/// First instant of `now`'s calendar day in its own time zone.
fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    match now.timezone().from_local_datetime(&midnight).earliest() {
        Some(start) => start.with_timezone(&Utc),
        // Midnight skipped by a DST jump.
        None => {
            now.with_timezone(&Utc) - Duration::seconds(i64::from(now.num_seconds_from_midnight()))
        }
    }
}

/// Start of the local calendar hour containing `instant`.
fn hour_start<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let offset = i64::from(
        tz.offset_from_utc_datetime(&instant.naive_utc())
            .fix()
            .local_minus_utc(),
    );
    let local = instant.timestamp() + offset;
    let floored = local - local.rem_euclid(SECS_PER_HOUR);
    DateTime::from_timestamp(floored - offset, 0).unwrap_or(instant)
}

/// 24 buckets ending with the hour containing `now`, oldest first.
///
/// Counts events from the trailing 24 hours whose local hour matches a
/// bucket. The oldest bucket starts after `now - 24h`, so an event exactly
/// 24 hours old is never counted.
fn hourly_histogram<Tz>(events: &[Event], now: DateTime<Utc>, tz: &Tz) -> Vec<HourBucket>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut buckets: Vec<HourBucket> = (0..HOURLY_BUCKETS as i64)
        .rev()
        .map(|hours_back| {
            let starts_at = hour_start(now - Duration::hours(hours_back), tz);
            HourBucket {
                hour: starts_at.with_timezone(tz).format("%Y-%m-%dT%H").to_string(),
                starts_at,
                count: 0,
            }
        })
        .collect();
    let index: HashMap<DateTime<Utc>, usize> = buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| (bucket.starts_at, i))
        .collect();

    let horizon = now - Duration::hours(HOURLY_BUCKETS as i64);
    for event in events.iter().filter(|event| event.timestamp() >= horizon) {
        if let Some(&i) = index.get(&hour_start(event.timestamp(), tz)) {
            buckets[i].count += 1;
        }
    }
    buckets
}

/// All-time request counts per subject, highest first, ties in first-seen order.
fn popular_subjects(events: &[Event]) -> Vec<SubjectCount> {
    let mut counts: Vec<SubjectCount> = Vec::new();
    let mut positions: HashMap<SubjectId, usize> = HashMap::new();

    for event in events {
        let subject = event.subject();
        match positions.get(&subject) {
            Some(&i) => counts[i].count += 1,
            None => {
                positions.insert(subject, counts.len());
                counts.push(SubjectCount { subject, count: 1 });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(POPULAR_LIMIT);
    counts
}
