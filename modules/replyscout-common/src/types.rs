use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::MessageError;

/// Lower bound of the visibility delay applied to every queued reply.
pub const MIN_REPLY_DELAY_SECS: u32 = 60;
/// Upper bound of the visibility delay applied to every queued reply.
pub const MAX_REPLY_DELAY_SECS: u32 = 600;

// ---------------------------------------------------------------------------
// CandidatePost
// ---------------------------------------------------------------------------

/// A forum post fetched for one detector run. Never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePost {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: Option<String>,
    pub forum: String,
    pub url: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl CandidatePost {
    /// Title and body in the shape both LLM prompts expect.
    pub fn prompt_content(&self) -> String {
        format!("Title: {}\n\nContent: {}", self.title, self.body)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Match,
    NotRelevant,
    BelowThreshold,
    /// The author is an artist advertising their own services.
    ArtistSeekingWork,
    /// Title carries a `[for hire]` tag; never sent to the model.
    TaggedForHire,
    /// The model answered but the answer could not be read.
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub verdict: Verdict,
    pub confidence: f64,
}

impl Classification {
    pub fn new(verdict: Verdict, confidence: f64) -> Self {
        Self {
            verdict,
            confidence,
        }
    }

    /// No-match verdicts that carry no confidence signal.
    pub fn rejected(verdict: Verdict) -> Self {
        Self::new(verdict, 0.0)
    }

    pub fn is_match(&self) -> bool {
        self.verdict == Verdict::Match
    }
}

// ---------------------------------------------------------------------------
// QueueMessage
// ---------------------------------------------------------------------------

/// Body of a delay-queue message. `postId` and `responseBody` are the
/// contract; the rest is context for the responder's logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub post_id: String,
    pub response_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subreddit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f64>,
}

impl QueueMessage {
    pub fn new(post_id: impl Into<String>, response_body: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            response_body: response_body.into(),
            post_title: None,
            post_url: None,
            subreddit: None,
            ai_confidence: None,
        }
    }

    pub fn for_post(post: &CandidatePost, response_body: impl Into<String>, confidence: f64) -> Self {
        Self {
            post_title: Some(post.title.clone()),
            post_url: Some(post.url.clone()),
            subreddit: Some(post.forum.clone()),
            ai_confidence: Some(confidence),
            ..Self::new(post.id.clone(), response_body)
        }
    }

    /// Parse a queue body, rejecting messages without a target or a reply.
    pub fn parse(body: &str) -> Result<Self, MessageError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Loose {
            post_id: Option<String>,
            response_body: Option<String>,
            post_title: Option<String>,
            post_url: Option<String>,
            subreddit: Option<String>,
            ai_confidence: Option<f64>,
        }

        let loose: Loose = serde_json::from_str(body)?;
        let post_id = loose
            .post_id
            .filter(|s| !s.trim().is_empty())
            .ok_or(MessageError::MissingField("postId"))?;
        let response_body = loose
            .response_body
            .filter(|s| !s.trim().is_empty())
            .ok_or(MessageError::MissingField("responseBody"))?;

        Ok(Self {
            post_id,
            response_body,
            post_title: loose.post_title,
            post_url: loose.post_url,
            subreddit: loose.subreddit,
            ai_confidence: loose.ai_confidence,
        })
    }

    pub fn to_body(&self) -> String {
        // A struct of strings and an f64 always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// ProcessedPosts
// ---------------------------------------------------------------------------

/// Durable set of post ids the detector has already handled.
///
/// Serialized as a sorted JSON array. Also reads the older object-shaped log
/// keyed by post id, so a record written by an earlier deployment is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProcessedPosts(BTreeSet<String>);

impl<'de> Deserialize<'de> for ProcessedPosts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            List(Vec<String>),
            Keyed(BTreeMap<String, serde_json::Value>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::List(ids) => Self(ids.into_iter().collect()),
            Repr::Keyed(map) => Self(map.into_keys().collect()),
        })
    }
}

impl ProcessedPosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.0.contains(post_id)
    }

    /// Returns true if the id was not already present.
    pub fn insert(&mut self, post_id: impl Into<String>) -> bool {
        self.0.insert(post_id.into())
    }

    /// Merge `other` into `self`; returns how many ids were new.
    pub fn merge(&mut self, other: ProcessedPosts) -> usize {
        let before = self.0.len();
        self.0.extend(other.0);
        self.0.len() - before
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ProcessedPosts {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// SuccessfulReply
// ---------------------------------------------------------------------------

/// Audit entry for a reply that made it onto the delay queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessfulReply {
    pub post_id: String,
    /// Reply text, shortened for the log.
    pub reply: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub delay_seconds: u32,
}

// ---------------------------------------------------------------------------
// ReplyLog
// ---------------------------------------------------------------------------

/// Append-only audit log of queued replies, oldest first.
///
/// Written as a JSON array. Also reads the older object-shaped log keyed by
/// post id, whose entries carry epoch-second timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReplyLog(Vec<SuccessfulReply>);

#[derive(Deserialize)]
struct KeyedReply {
    #[serde(default)]
    timestamp: Option<f64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    ai_confidence: f64,
    #[serde(default)]
    queued_message_summary: String,
    #[serde(default)]
    delay_seconds: u32,
}

impl KeyedReply {
    fn into_reply(self, post_id: String) -> SuccessfulReply {
        SuccessfulReply {
            post_id,
            reply: self.queued_message_summary,
            timestamp: self
                .timestamp
                .and_then(|ts| DateTime::from_timestamp(ts as i64, 0))
                .unwrap_or_default(),
            title: self.title,
            url: self.url,
            subreddit: self.subreddit,
            confidence: self.ai_confidence,
            delay_seconds: self.delay_seconds,
        }
    }
}

impl<'de> Deserialize<'de> for ReplyLog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            List(Vec<SuccessfulReply>),
            Keyed(BTreeMap<String, KeyedReply>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::List(entries) => Self(entries),
            Repr::Keyed(map) => {
                let mut entries: Vec<SuccessfulReply> = map
                    .into_iter()
                    .map(|(post_id, entry)| entry.into_reply(post_id))
                    .collect();
                // Keyed logs have no order of their own.
                entries.sort_by_key(|e| e.timestamp);
                Self(entries)
            }
        })
    }
}

impl ReplyLog {
    pub fn extend(&mut self, entries: &[SuccessfulReply]) {
        self.0.extend_from_slice(entries);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &[SuccessfulReply] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> CandidatePost {
        CandidatePost {
            id: "abc123".into(),
            title: "Need a children's book illustrator".into(),
            body: "Looking for warm, whimsical art.".into(),
            author: Some("author1".into()),
            forum: "HireAnArtist".into(),
            url: "https://www.reddit.com/r/HireAnArtist/comments/abc123/".into(),
            created_at: None,
        }
    }

    #[test]
    fn queue_message_uses_camel_case_wire_names() {
        let msg = QueueMessage::for_post(&post(), "Hi, I'd love to help!", 0.9);
        let value: serde_json::Value = serde_json::from_str(&msg.to_body()).unwrap();
        assert_eq!(value["postId"], "abc123");
        assert_eq!(value["responseBody"], "Hi, I'd love to help!");
        assert_eq!(value["subreddit"], "HireAnArtist");
        assert_eq!(value["aiConfidence"], 0.9);
    }

    #[test]
    fn minimal_message_parses_without_context_fields() {
        let msg = QueueMessage::parse(r#"{"postId": "abc123", "responseBody": "Hi!"}"#).unwrap();
        assert_eq!(msg, QueueMessage::new("abc123", "Hi!"));
    }

    #[test]
    fn message_without_body_is_rejected() {
        let err = QueueMessage::parse(r#"{"postId": "abc123", "responseBody": "  "}"#).unwrap_err();
        assert!(matches!(err, MessageError::MissingField("responseBody")));

        let err = QueueMessage::parse("not json").unwrap_err();
        assert!(matches!(err, MessageError::Json(_)));
    }

    #[test]
    fn processed_posts_merge_counts_new_ids() {
        let mut record: ProcessedPosts = ["a", "b"].into_iter().collect();
        let added = record.merge(["b", "c", "d"].into_iter().collect());
        assert_eq!(added, 2);
        assert_eq!(record.len(), 4);
        assert!(record.contains("d"));
    }

    #[test]
    fn processed_posts_serialize_as_sorted_array() {
        let record: ProcessedPosts = ["zz9", "abc123"].into_iter().collect();
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"["abc123","zz9"]"#
        );
    }

    #[test]
    fn processed_posts_read_keyed_log() {
        let record: ProcessedPosts = serde_json::from_str(
            r#"{"abc123": {"analysis_status": "relevant"}, "xyz789": {}}"#,
        )
        .unwrap();
        assert!(record.contains("abc123"));
        assert!(record.contains("xyz789"));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn reply_log_reads_keyed_log() {
        let log: ReplyLog = serde_json::from_str(
            r#"{
                "zz9": {"timestamp": 1700000600, "readable_time": "2023-11-14 14:23:20 PST",
                        "title": "Later", "url": "u2", "subreddit": "HireAnArtist",
                        "ai_confidence": 0.8, "queued_message_summary": "Hello!", "delay_seconds": 90},
                "abc123": {"timestamp": 1700000000, "title": "Earlier", "url": "u1",
                           "subreddit": "HireAnArtist", "ai_confidence": 0.9,
                           "queued_message_summary": "Hi!", "delay_seconds": 300}
            }"#,
        )
        .unwrap();

        let ids: Vec<&str> = log.entries().iter().map(|e| e.post_id.as_str()).collect();
        assert_eq!(ids, vec!["abc123", "zz9"]);
        let first = &log.entries()[0];
        assert_eq!(first.reply, "Hi!");
        assert_eq!(first.confidence, 0.9);
        assert_eq!(first.delay_seconds, 300);
        assert_eq!(first.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn reply_log_writes_array_after_reading_keyed_log() {
        let mut log: ReplyLog = serde_json::from_str(r#"{"abc123": {"timestamp": 1700000000}}"#).unwrap();
        let mut next = log.entries()[0].clone();
        next.post_id = "new1".into();
        next.timestamp = Utc::now();
        log.extend(&[next]);

        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[1]["post_id"], "new1");
        assert!(!log.is_empty());
    }

    #[test]
    fn classification_match_only_for_match_verdict() {
        assert!(Classification::new(Verdict::Match, 0.8).is_match());
        assert!(!Classification::new(Verdict::BelowThreshold, 0.5).is_match());
        assert!(!Classification::rejected(Verdict::ArtistSeekingWork).is_match());
    }

    #[test]
    fn prompt_content_combines_title_and_body() {
        assert_eq!(
            post().prompt_content(),
            "Title: Need a children's book illustrator\n\nContent: Looking for warm, whimsical art."
        );
    }
}
