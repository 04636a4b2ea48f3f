//! Integration tests for the JSONL event log.

use chrono::{DateTime, Duration, TimeZone, Utc};
use inference_governor::infrastructure::mocks::{MockCaptureLayer, MockClock};
use inference_governor::{
    Aggregator, Event, EventDraft, EventKind, EventLog, JsonlEventLog, Outcome, SubjectId,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 20, 6, 0, 0).unwrap()
}

fn turn(minute: i64, verse: u16) -> Event {
    EventDraft::conversation_turn(SubjectId::new(2, verse), "192.0.2.4", "model-a")
        .usage(Some(40), Some(60))
        .finish(base() + Duration::minutes(minute), 1_200)
}

fn log_in(dir: &tempfile::TempDir) -> JsonlEventLog {
    JsonlEventLog::new(dir.path().join("telemetry.jsonl"))
}

#[test]
fn test_read_all_returns_append_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(&dir);
    // Timestamps deliberately out of order: reads follow append order.
    let events = vec![turn(5, 1), turn(1, 2), turn(3, 3)];

    for event in &events {
        log.append(event).unwrap();
    }

    assert_eq!(log.read_all().unwrap(), events);
}

#[test]
fn test_read_since_is_exact_subsequence() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(&dir);
    let events = vec![turn(5, 1), turn(1, 2), turn(3, 3), turn(9, 4)];
    for event in &events {
        log.append(event).unwrap();
    }

    let cutoff = base() + Duration::minutes(3);
    let expected: Vec<Event> = events
        .iter()
        .filter(|event| event.timestamp() >= cutoff)
        .cloned()
        .collect();

    assert_eq!(log.read_since(cutoff).unwrap(), expected);
}

#[test]
fn test_corrupted_trailing_record_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(&dir);
    log.append(&turn(0, 1)).unwrap();
    log.append(&turn(1, 2)).unwrap();

    let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
    file.write_all(br#"{"timestamp":"2025-05-20T06:02:00Z","type":"chat","chap"#)
        .unwrap();
    drop(file);

    let events = log.read_all().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].subject(), SubjectId::new(2, 2));
}

#[test]
fn test_append_after_torn_record_starts_new_line() {
    let dir = tempfile::tempdir().unwrap();
    let log = log_in(&dir);
    log.append(&turn(0, 1)).unwrap();

    let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
    file.write_all(b"{\"timestamp\":").unwrap();
    drop(file);

    log.append(&turn(2, 3)).unwrap();

    let contents = fs::read_to_string(log.path()).unwrap();
    assert_eq!(contents.lines().count(), 3);
    let events = log.read_all().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1], turn(2, 3));
}

#[test]
fn test_reads_records_written_by_other_producers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry.jsonl");
    fs::write(
        &path,
        concat!(
            r#"{"timestamp":"2025-05-20T06:00:00.000Z","type":"verse","chapter":2,"verse":47,"inputTokens":null,"outputTokens":null,"totalTokens":null,"durationMs":3,"ip":"10.0.0.1","model":"cache","status":"success","cacheHit":true}"#,
            "\n",
            r#"{"timestamp":"2025-05-20T06:01:00.000Z","type":"chat","chapter":2,"verse":47,"inputTokens":900,"outputTokens":300,"totalTokens":1200,"durationMs":4100,"ip":"10.0.0.1","model":"model-b","status":"error","errorMessage":"upstream timeout","sessionId":"ignored"}"#,
            "\n",
        ),
    )
    .unwrap();

    let events = JsonlEventLog::new(&path).read_all().unwrap();
    assert_eq!(events.len(), 2);

    assert_eq!(events[0].kind(), EventKind::ContentFetch);
    assert!(events[0].is_cache_hit());
    assert_eq!(events[0].total_units(), None);
    assert_eq!(events[0].source_label(), "cache");

    assert_eq!(events[1].kind(), EventKind::ConversationTurn);
    assert_eq!(events[1].outcome(), Outcome::Error);
    assert_eq!(events[1].error_detail(), Some("upstream timeout"));
    assert_eq!(events[1].total_units(), Some(1_200));
}

#[test]
fn test_concurrent_appends_never_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(log_in(&dir));

    let handles: Vec<_> = (0..4)
        .map(|writer| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..50 {
                    log.append(&turn(i, writer)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let contents = fs::read_to_string(log.path()).unwrap();
    assert_eq!(contents.lines().count(), 200);
    assert_eq!(log.read_all().unwrap().len(), 200);
}

#[test]
fn test_readers_never_observe_partial_records() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(log_in(&dir));
    let clock = Arc::new(MockClock::with_wall_time(
        Instant::now(),
        base() + Duration::hours(1),
    ));
    let capture = MockCaptureLayer::new();
    let writing = Arc::new(AtomicBool::new(true));

    let readers: Vec<_> = (0..3)
        .map(|reader| {
            let log = Arc::clone(&log);
            let clock = clock.clone();
            let capture = capture.clone();
            let writing = Arc::clone(&writing);
            thread::spawn(move || {
                let _guard =
                    tracing::subscriber::set_default(tracing_subscriber::registry().with(capture));
                let aggregator = Aggregator::new(Arc::clone(&log), clock);
                let mut seen = Vec::new();
                loop {
                    let finished = !writing.load(Ordering::SeqCst);
                    let observed = if reader == 0 {
                        aggregator.summarize_at(base() + Duration::hours(1)).total_requests as usize
                    } else {
                        log.read_all().expect("read during appends").len()
                    };
                    seen.push(observed);
                    if finished {
                        break;
                    }
                }
                seen
            })
        })
        .collect();

    let writers: Vec<_> = (0..4)
        .map(|writer| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..60 {
                    log.append(&turn(i, writer)).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    writing.store(false, Ordering::SeqCst);

    for reader in readers {
        let seen = reader.join().unwrap();
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(seen.last(), Some(&240));
    }
    assert_eq!(capture.count_matching(Level::WARN, "unreadable records"), 0);
    assert_eq!(
        capture.count_matching(Level::DEBUG, "skipping malformed telemetry record"),
        0
    );
    assert_eq!(
        capture.count_matching(Level::WARN, "telemetry log unreadable"),
        0
    );
}
