//! Walkthrough of admission, recording, and summaries.
//!
//! Simulates a burst of traffic from two callers against both endpoint
//! classes, with events written through the background queue, then prints
//! the resulting summary. Run with `RUST_LOG=debug` to see rejections and
//! cleanup passes.

use inference_governor::{
    caller_key, EndpointClass, EventDraft, EventQuery, Governor, SubjectId,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("telemetry.jsonl");

    let governor = Governor::builder()
        .with_content_limit(Duration::from_secs(60), 3)
        .with_conversation_limit(Duration::from_secs(60), 5)
        .with_event_log_path(&log_path)
        .with_queue_capacity(64)
        .with_cleanup_interval(Duration::from_secs(30))
        .build()?;

    println!("=== Governor Walkthrough ===\n");
    println!("Content: 3 per minute per caller. Conversation: 5 per minute per caller.\n");

    let callers = [
        caller_key(Some("203.0.113.7, 10.0.0.1"), None),
        caller_key(None, Some("198.51.100.20")),
    ];

    for (round, caller) in callers.iter().cycle().take(10).enumerate() {
        let verse = (round % 4 + 1) as u16;
        match governor.admit(EndpointClass::Content, caller) {
            Ok(request) => {
                let draft = if round % 2 == 0 {
                    EventDraft::cached_content(SubjectId::new(2, verse), caller)
                } else {
                    EventDraft::content_fetch(SubjectId::new(2, verse), caller, "model-a")
                        .usage(Some(650), Some(1_400))
                };
                println!("content  {caller:<15} 2.{verse} admitted ({} left)", request.remaining());
                governor.complete(request, draft);
            }
            Err(rejected) => {
                println!(
                    "content  {caller:<15} 2.{verse} rejected, Retry-After: {}",
                    rejected.retry_after_secs()
                );
            }
        }
    }

    for turn in 0..6 {
        let caller = &callers[0];
        match governor.admit(EndpointClass::Conversation, caller) {
            Ok(request) => {
                let mut draft = EventDraft::conversation_turn(SubjectId::new(2, 47), caller, "model-b")
                    .usage(Some(1_200), Some(300));
                if turn == 2 {
                    draft = draft.failed("upstream timeout");
                }
                governor.complete(request, draft);
                println!("chat     {caller:<15} turn {turn} recorded");
            }
            Err(rejected) => println!("chat     {caller:<15} turn {turn} {rejected}"),
        }
    }

    let snapshot = governor.metrics().snapshot();
    println!(
        "\nadmitted={} rejected={} rejection_rate={:.1}%",
        snapshot.admitted,
        snapshot.rejected,
        snapshot.rejection_rate() * 100.0
    );

    // Flush the queue so the summary sees every event.
    governor.shutdown().await?;

    let reader = Governor::builder().with_event_log_path(&log_path).build()?;
    let summary = reader.summary();
    println!("\n{}", summary.format_message());

    println!("\nMost requested:");
    for entry in &summary.popular_subjects {
        println!("  {} x{}", entry.subject, entry.count);
    }

    println!("\nLatest events:");
    for event in reader.events(EventQuery::default().with_limit(5)).events {
        println!(
            "  {} {:?} {} {:?}",
            event.timestamp().format("%H:%M:%S"),
            event.kind(),
            event.subject(),
            event.outcome()
        );
    }

    println!("\n=== Walkthrough Complete ===");
    Ok(())
}
