//! Telemetry events.
//!
//! An [`Event`] is the immutable record of one completed request. Events are
//! built from an [`EventDraft`] at the end of the request, when the
//! completion time and the elapsed duration are known.
//!
//! The serialized form keeps the field names already present in deployed
//! `telemetry.jsonl` files (`type`, `chapter`, `verse`, `inputTokens`, `ip`,
//! `model`, `status`, ...), so logs written by earlier versions stay readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source label recorded when a request was answered from precomputed storage.
pub const CACHE_SOURCE: &str = "cache";

/// The kind of work a request performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Commentary for one verse, from cache or live inference
    #[serde(rename = "verse", alias = "content-fetch")]
    ContentFetch,
    /// One assistant turn in a verse-scoped conversation
    #[serde(rename = "chat", alias = "conversation-turn")]
    ConversationTurn,
}

/// Whether the request succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// Two-part locator of the content unit a request acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId {
    /// Container index (chapter)
    pub chapter: u16,
    /// Item index within the container (verse)
    pub verse: u16,
}

impl SubjectId {
    pub fn new(chapter: u16, verse: u16) -> Self {
        Self { chapter, verse }
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.chapter, self.verse)
    }
}

/// One completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(flatten)]
    subject: SubjectId,
    #[serde(rename = "inputTokens", default)]
    input_units: Option<u64>,
    #[serde(rename = "outputTokens", default)]
    output_units: Option<u64>,
    #[serde(rename = "totalTokens", default)]
    total_units: Option<u64>,
    duration_ms: u64,
    #[serde(rename = "ip")]
    caller_key: String,
    #[serde(rename = "model")]
    source_label: String,
    #[serde(rename = "status")]
    outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cache_hit: Option<bool>,
    #[serde(
        rename = "errorMessage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    error_detail: Option<String>,
}

impl Event {
    /// Completion instant.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn subject(&self) -> SubjectId {
        self.subject
    }

    pub fn input_units(&self) -> Option<u64> {
        self.input_units
    }

    pub fn output_units(&self) -> Option<u64> {
        self.output_units
    }

    /// `input + output` when both are known, otherwise `None`.
    pub fn total_units(&self) -> Option<u64> {
        self.total_units
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn caller_key(&self) -> &str {
        &self.caller_key
    }

    /// Model identifier, or [`CACHE_SOURCE`].
    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Only ever `Some` for content fetches.
    pub fn cache_hit(&self) -> Option<bool> {
        self.cache_hit
    }

    /// Only ever `Some` for failed requests.
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    /// True for a content fetch answered from precomputed storage.
    pub fn is_cache_hit(&self) -> bool {
        self.cache_hit == Some(true)
    }
}

/// Everything known about a request before it is stamped and recorded.
///
/// # Example
/// ```
/// use inference_governor::{EventDraft, SubjectId};
/// use chrono::Utc;
///
/// let event = EventDraft::conversation_turn(SubjectId::new(2, 47), "203.0.113.9", "model-a")
///     .usage(Some(120), Some(380))
///     .finish(Utc::now(), 1_250);
///
/// assert_eq!(event.total_units(), Some(500));
/// assert_eq!(event.cache_hit(), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    kind: EventKind,
    subject: SubjectId,
    caller_key: String,
    source_label: String,
    input_units: Option<u64>,
    output_units: Option<u64>,
    cache_hit: bool,
    error_detail: Option<String>,
}

impl EventDraft {
    pub fn new(
        kind: EventKind,
        subject: SubjectId,
        caller_key: impl Into<String>,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            subject,
            caller_key: caller_key.into(),
            source_label: source_label.into(),
            input_units: None,
            output_units: None,
            cache_hit: false,
            error_detail: None,
        }
    }

    pub fn content_fetch(
        subject: SubjectId,
        caller_key: impl Into<String>,
        source_label: impl Into<String>,
    ) -> Self {
        Self::new(EventKind::ContentFetch, subject, caller_key, source_label)
    }

    pub fn conversation_turn(
        subject: SubjectId,
        caller_key: impl Into<String>,
        source_label: impl Into<String>,
    ) -> Self {
        Self::new(EventKind::ConversationTurn, subject, caller_key, source_label)
    }

    /// A content fetch served from precomputed storage: no billable usage.
    pub fn cached_content(subject: SubjectId, caller_key: impl Into<String>) -> Self {
        let mut draft = Self::content_fetch(subject, caller_key, CACHE_SOURCE);
        draft.cache_hit = true;
        draft
    }

    /// Record billable usage as reported by the backend.
    pub fn usage(mut self, input_units: Option<u64>, output_units: Option<u64>) -> Self {
        self.input_units = input_units;
        self.output_units = output_units;
        self
    }

    /// Mark whether a content fetch was a cache hit. Ignored for conversation turns.
    pub fn cache_hit(mut self, hit: bool) -> Self {
        self.cache_hit = hit;
        self
    }

    /// Mark the request as failed.
    pub fn failed(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn caller_key(&self) -> &str {
        &self.caller_key
    }

    /// Stamp the draft and produce the immutable event.
    pub fn finish(self, timestamp: DateTime<Utc>, duration_ms: u64) -> Event {
        let total_units = match (self.input_units, self.output_units) {
            (Some(input), Some(output)) => Some(input.saturating_add(output)),
            _ => None,
        };
        let cache_hit = match self.kind {
            EventKind::ContentFetch => Some(self.cache_hit),
            EventKind::ConversationTurn => None,
        };
        let outcome = if self.error_detail.is_some() {
            Outcome::Error
        } else {
            Outcome::Success
        };

        Event {
            timestamp,
            kind: self.kind,
            subject: self.subject,
            input_units: self.input_units,
            output_units: self.output_units,
            total_units,
            duration_ms,
            caller_key: self.caller_key,
            source_label: self.source_label,
            outcome,
            cache_hit,
            error_detail: self.error_detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_total_requires_both_counters() {
        let subject = SubjectId::new(1, 1);

        let both = EventDraft::conversation_turn(subject, "a", "m")
            .usage(Some(10), Some(5))
            .finish(at(0), 3);
        assert_eq!(both.total_units(), Some(15));

        let partial = EventDraft::conversation_turn(subject, "a", "m")
            .usage(Some(10), None)
            .finish(at(0), 3);
        assert_eq!(partial.total_units(), None);
        assert_eq!(partial.input_units(), Some(10));
    }

    #[test]
    fn test_cache_hit_only_on_content_fetch() {
        let subject = SubjectId::new(3, 5);

        let cached = EventDraft::cached_content(subject, "a").finish(at(0), 1);
        assert_eq!(cached.cache_hit(), Some(true));
        assert_eq!(cached.source_label(), CACHE_SOURCE);
        assert_eq!(cached.total_units(), None);

        let live = EventDraft::content_fetch(subject, "a", "m").finish(at(0), 1);
        assert_eq!(live.cache_hit(), Some(false));

        let chat = EventDraft::conversation_turn(subject, "a", "m")
            .cache_hit(true)
            .finish(at(0), 1);
        assert_eq!(chat.cache_hit(), None);
    }

    #[test]
    fn test_failure_sets_outcome_and_detail() {
        let event = EventDraft::conversation_turn(SubjectId::new(1, 1), "a", "m")
            .failed("upstream timeout")
            .finish(at(0), 30_000);

        assert_eq!(event.outcome(), Outcome::Error);
        assert_eq!(event.error_detail(), Some("upstream timeout"));

        let ok = EventDraft::conversation_turn(SubjectId::new(1, 1), "a", "m").finish(at(0), 1);
        assert_eq!(ok.outcome(), Outcome::Success);
        assert_eq!(ok.error_detail(), None);
    }

    #[test]
    fn test_serialized_field_names() {
        let event = EventDraft::conversation_turn(SubjectId::new(2, 47), "10.0.0.1", "model-a")
            .usage(Some(100), Some(200))
            .finish(at(1_700_000_000), 42);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "chat");
        assert_eq!(value["chapter"], 2);
        assert_eq!(value["verse"], 47);
        assert_eq!(value["inputTokens"], 100);
        assert_eq!(value["totalTokens"], 300);
        assert_eq!(value["durationMs"], 42);
        assert_eq!(value["ip"], "10.0.0.1");
        assert_eq!(value["model"], "model-a");
        assert_eq!(value["status"], "success");
        assert!(value.get("cacheHit").is_none());
        assert!(value.get("errorMessage").is_none());
    }

    #[test]
    fn test_reads_existing_records_with_unknown_fields() {
        let line = r#"{"timestamp":"2025-03-01T10:15:00.000Z","type":"verse","chapter":4,"verse":7,"inputTokens":null,"outputTokens":null,"totalTokens":null,"durationMs":3,"ip":"unknown","model":"cache","status":"success","cacheHit":true,"region":"eu"}"#;
        let event: Event = serde_json::from_str(line).unwrap();

        assert_eq!(event.kind(), EventKind::ContentFetch);
        assert_eq!(event.subject(), SubjectId::new(4, 7));
        assert!(event.is_cache_hit());
        assert_eq!(event.total_units(), None);
    }

    #[test]
    fn test_kind_accepts_descriptive_aliases() {
        let kind: EventKind = serde_json::from_str(r#""conversation-turn""#).unwrap();
        assert_eq!(kind, EventKind::ConversationTurn);
    }
}
