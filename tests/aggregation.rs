//! Integration tests for summaries computed from a JSONL log.

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use inference_governor::infrastructure::mocks::{FailingEventLog, MockClock};
use inference_governor::{
    Aggregator, EventDraft, EventLog, EventQuery, JsonlEventLog, MemoryEventLog, SubjectId,
};
use std::sync::Arc;
use std::time::Instant;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 14, 15, 20, 0).unwrap()
}

fn clock() -> Arc<MockClock> {
    Arc::new(MockClock::with_wall_time(Instant::now(), now()))
}

#[test]
fn test_content_units_today_skip_missing_totals() {
    let dir = tempfile::tempdir().unwrap();
    let log = JsonlEventLog::new(dir.path().join("telemetry.jsonl"));
    let subject = SubjectId::new(3, 5);

    for (minutes_ago, usage) in [(50, Some(100)), (40, None), (30, Some(50))] {
        let draft = EventDraft::content_fetch(subject, "a", "model-a");
        let draft = match usage {
            Some(total) => draft.usage(Some(total - 20), Some(20)),
            None => draft.cache_hit(true),
        };
        log.append(&draft.finish(now() - Duration::minutes(minutes_ago), 80))
            .unwrap();
    }

    let summary = Aggregator::new(log, clock()).summarize_at(now());
    assert_eq!(summary.content_units_today, 150);
    assert_eq!(summary.conversation_units_today, 0);
    assert_eq!(summary.total_units_today, 150);
    assert_eq!(summary.total_requests_today, 3);
}

#[test]
fn test_zero_content_fetches_gives_zero_rate() {
    let log = MemoryEventLog::new();
    log.append(
        &EventDraft::conversation_turn(SubjectId::new(1, 1), "a", "model-a")
            .finish(now() - Duration::hours(1), 10),
    )
    .unwrap();

    let summary = Aggregator::new(log, clock()).summarize_at(now());
    assert_eq!(summary.cache_hit_rate, 0.0);
}

#[test]
fn test_histogram_sums_trailing_day() {
    let log = MemoryEventLog::new();
    let offsets_minutes = [0, 5, 59, 61, 300, 1_000, 1_379, 1_439, 1_440, 1_441, 3_000];
    for minutes_ago in offsets_minutes {
        log.append(
            &EventDraft::cached_content(SubjectId::new(1, 1), "a")
                .finish(now() - Duration::minutes(minutes_ago), 1),
        )
        .unwrap();
    }

    let summary = Aggregator::new(log, clock()).summarize_at(now());
    let buckets = &summary.requests_per_hour;

    assert_eq!(buckets.len(), 24);
    // Everything strictly younger than 24h, minus the part of the oldest
    // wall-clock hour that falls outside the trailing day.
    let within: u64 = offsets_minutes
        .iter()
        .filter(|&&m| m < 1_440)
        .filter(|&&m| now() - Duration::minutes(m) >= buckets[0].starts_at)
        .count() as u64;
    assert_eq!(summary.requests_last_24h(), within);
    assert_eq!(buckets[23].count, 2);
    assert_eq!(buckets.iter().map(|b| b.count).sum::<u64>(), within);
}

#[test]
fn test_histogram_labels_follow_local_time() {
    let log = MemoryEventLog::new();
    let summary = Aggregator::new(log, clock())
        .summarize_at(now().with_timezone(&FixedOffset::west_opt(4 * 3600).unwrap()));

    let labels: Vec<&str> = summary
        .requests_per_hour
        .iter()
        .map(|bucket| bucket.hour.as_str())
        .collect();
    assert_eq!(labels.first(), Some(&"2025-07-13T12"));
    assert_eq!(labels.last(), Some(&"2025-07-14T11"));
}

#[test]
fn test_popularity_is_capped_and_non_increasing() {
    let log = MemoryEventLog::new();
    for verse in 1..=15u16 {
        for _ in 0..(verse % 4 + 1) {
            log.append(
                &EventDraft::cached_content(SubjectId::new(6, verse), "a")
                    .finish(now() - Duration::days(3), 1),
            )
            .unwrap();
        }
    }

    let popular = Aggregator::new(log, clock()).summarize_at(now()).popular_subjects;
    assert_eq!(popular.len(), 10);
    assert!(popular.windows(2).all(|pair| pair[0].count >= pair[1].count));
    // Verses 3, 7, 11, 15 appear four times each, in first-seen order.
    let leaders: Vec<u16> = popular[..4].iter().map(|entry| entry.subject.verse).collect();
    assert_eq!(leaders, vec![3, 7, 11, 15]);
}

#[test]
fn test_summary_serializes_for_dashboards() {
    let log = MemoryEventLog::new();
    log.append(&EventDraft::cached_content(SubjectId::new(2, 47), "a").finish(now(), 2))
        .unwrap();

    let summary = Aggregator::new(log, clock()).summarize_at(now());
    let json = serde_json::to_value(&summary).unwrap();

    assert_eq!(json["totalRequests"], 1);
    assert_eq!(json["cacheHitRate"], 1.0);
    assert_eq!(json["requestsPerHour"].as_array().unwrap().len(), 24);
    assert_eq!(json["popularSubjects"][0]["chapter"], 2);
    assert_eq!(json["popularSubjects"][0]["verse"], 47);
    assert_eq!(json["recentEvents"][0]["type"], "verse");
}

#[test]
fn test_unreadable_log_returns_zeroed_summary() {
    let aggregator = Aggregator::new(FailingEventLog::new(), clock());

    let summary = aggregator.summarize_at(now());
    assert_eq!(summary.total_requests, 0);
    assert_eq!(summary.requests_per_hour.len(), 24);
    assert!(summary.requests_per_hour.iter().all(|bucket| bucket.count == 0));

    aggregator.log().set_failing(false);
    aggregator
        .log()
        .append(&EventDraft::cached_content(SubjectId::new(1, 1), "a").finish(now(), 1))
        .unwrap();
    assert_eq!(aggregator.summarize_at(now()).total_requests, 1);
}

#[test]
fn test_event_listing_newest_first_with_total() {
    let log = MemoryEventLog::new();
    for minute in 0..70 {
        log.append(
            &EventDraft::cached_content(SubjectId::new(1, minute as u16 + 1), "a")
                .finish(now() - Duration::minutes(70 - minute), 1),
        )
        .unwrap();
    }
    let aggregator = Aggregator::new(log, clock());

    let page = aggregator.events(EventQuery::default());
    assert_eq!(page.total, 70);
    assert_eq!(page.events.len(), 50);
    assert_eq!(page.events[0].subject().verse, 70);

    let recent = aggregator.events(EventQuery::default().since(now() - Duration::minutes(10)));
    assert_eq!(recent.total, 10);
    assert!(recent
        .events
        .windows(2)
        .all(|pair| pair[0].timestamp() > pair[1].timestamp()));
}

#[test]
fn test_unit_totals_saturate_on_huge_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry.jsonl");
    let huge = u64::MAX;
    let record = |kind: &str, minute: u32| {
        format!(
            r#"{{"timestamp":"2025-07-14T10:{minute:02}:00Z","type":"{kind}","chapter":1,"verse":1,"inputTokens":null,"outputTokens":null,"totalTokens":{huge},"durationMs":5,"ip":"10.0.0.1","model":"model-z","status":"success"}}"#
        )
    };
    let lines = [record("chat", 0), record("chat", 1), record("verse", 2)];
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    let summary = Aggregator::new(JsonlEventLog::new(&path), clock()).summarize_at(now());
    assert_eq!(summary.total_requests_today, 3);
    assert_eq!(summary.conversation_units_today, u64::MAX);
    assert_eq!(summary.content_units_today, u64::MAX);
    assert_eq!(summary.total_units_today, u64::MAX);
}
