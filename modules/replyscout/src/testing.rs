// Test mocks for the detector and responder.
//
// One mock per trait seam:
// - MockForum (ForumReader + ForumWriter): forum → posts, id → target state
// - MockClassifier (PostClassifier + ReplyDrafter): id → scripted answer
// - MemoryStore (RecordStore): key → bytes, with switchable failures
// - MockQueue (DelayQueue): records every send
// - FixedDelay (DelaySource): always the same draw
//
// Every mock counts its calls so tests can assert on side effects.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use replyscout_common::{CandidatePost, Classification, QueueMessage, Verdict};

use crate::traits::{
    CommentResult, DelayQueue, DelaySource, ForumReader, ForumWriter, PostClassifier, RecordStore,
    ReplyDrafter, TargetPost,
};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn post(id: &str, forum: &str, title: &str) -> CandidatePost {
    CandidatePost {
        id: id.to_string(),
        title: title.to_string(),
        body: format!("Body of {id}"),
        author: Some(format!("author_{id}")),
        forum: forum.to_string(),
        url: format!("https://www.reddit.com/r/{forum}/comments/{id}/"),
        created_at: None,
    }
}

// ---------------------------------------------------------------------------
// MockForum
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockForum {
    listings: HashMap<String, Vec<CandidatePost>>,
    failing_forums: HashSet<String>,
    targets: HashMap<String, TargetPost>,
    failing_comments: bool,
    refusal: Option<String>,
    listing_calls: Mutex<Vec<(String, u32)>>,
    comments: Mutex<Vec<(String, String)>>,
}

impl MockForum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_listing(mut self, forum: &str, posts: Vec<CandidatePost>) -> Self {
        self.listings.insert(forum.to_string(), posts);
        self
    }

    pub fn failing_listing(mut self, forum: &str) -> Self {
        self.failing_forums.insert(forum.to_string());
        self
    }

    pub fn on_target(mut self, post_id: &str, target: TargetPost) -> Self {
        self.targets.insert(post_id.to_string(), target);
        self
    }

    pub fn open_target(self, post_id: &str) -> Self {
        self.on_target(
            post_id,
            TargetPost::Open {
                title: format!("Post {post_id}"),
            },
        )
    }

    pub fn failing_comments(mut self) -> Self {
        self.failing_comments = true;
        self
    }

    pub fn refusing_comments(mut self, reason: &str) -> Self {
        self.refusal = Some(reason.to_string());
        self
    }

    /// `(forum, limit)` for every listing request.
    pub fn listing_calls(&self) -> Vec<(String, u32)> {
        self.listing_calls.lock().unwrap().clone()
    }

    /// `(post_id, body)` for every comment submitted.
    pub fn comments(&self) -> Vec<(String, String)> {
        self.comments.lock().unwrap().clone()
    }
}

#[async_trait]
impl ForumReader for MockForum {
    async fn newest_posts(&self, forum: &str, limit: u32) -> Result<Vec<CandidatePost>> {
        self.listing_calls
            .lock()
            .unwrap()
            .push((forum.to_string(), limit));
        if self.failing_forums.contains(forum) {
            bail!("MockForum: listing r/{forum} failed");
        }
        // Deliberately ignores `limit` so callers must enforce it themselves.
        Ok(self.listings.get(forum).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ForumWriter for MockForum {
    async fn target(&self, post_id: &str) -> Result<TargetPost> {
        Ok(self
            .targets
            .get(post_id)
            .cloned()
            .unwrap_or(TargetPost::Missing))
    }

    async fn comment(&self, post_id: &str, body: &str) -> Result<CommentResult> {
        if self.failing_comments {
            bail!("MockForum: rate limited");
        }
        if let Some(reason) = &self.refusal {
            return Ok(CommentResult::Refused(reason.clone()));
        }
        self.comments
            .lock()
            .unwrap()
            .push((post_id.to_string(), body.to_string()));
        Ok(CommentResult::Posted)
    }
}

// ---------------------------------------------------------------------------
// MockClassifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Scripted {
    Match { confidence: f64, reply: String },
    Reject(Verdict),
    Timeout,
    DraftFails,
}

/// Unscripted posts are classified `NotRelevant`.
#[derive(Default)]
pub struct MockClassifier {
    answers: HashMap<String, Scripted>,
    classify_calls: Mutex<Vec<String>>,
    draft_calls: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, post_id: &str, answer: Scripted) -> Self {
        self.answers.insert(post_id.to_string(), answer);
        self
    }

    pub fn matching(self, post_id: &str, reply: &str) -> Self {
        self.on(
            post_id,
            Scripted::Match {
                confidence: 0.9,
                reply: reply.to_string(),
            },
        )
    }

    pub fn classify_calls(&self) -> Vec<String> {
        self.classify_calls.lock().unwrap().clone()
    }

    pub fn draft_calls(&self) -> Vec<String> {
        self.draft_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostClassifier for MockClassifier {
    async fn classify(&self, post: &CandidatePost) -> Result<Classification> {
        self.classify_calls.lock().unwrap().push(post.id.clone());
        match self.answers.get(&post.id) {
            Some(Scripted::Match { confidence, .. }) => {
                Ok(Classification::new(Verdict::Match, *confidence))
            }
            Some(Scripted::DraftFails) => Ok(Classification::new(Verdict::Match, 0.9)),
            Some(Scripted::Reject(verdict)) => Ok(Classification::rejected(*verdict)),
            Some(Scripted::Timeout) => Err(anyhow!("operation timed out")),
            None => Ok(Classification::new(Verdict::NotRelevant, 0.1)),
        }
    }
}

#[async_trait]
impl ReplyDrafter for MockClassifier {
    async fn draft(&self, post: &CandidatePost) -> Result<String> {
        self.draft_calls.lock().unwrap().push(post.id.clone());
        match self.answers.get(&post.id) {
            Some(Scripted::Match { reply, .. }) => Ok(reply.clone()),
            _ => bail!("MockClassifier: drafting failed for {}", post.id),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_gets: bool,
    fail_puts: bool,
    puts: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, body: &[u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), body.to_vec());
        self
    }

    pub fn failing_gets(mut self) -> Self {
        self.fail_gets = true;
        self
    }

    pub fn failing_puts(mut self) -> Self {
        self.fail_puts = true;
        self
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Keys written, in order.
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_gets {
            bail!("MemoryStore: access denied reading {key}");
        }
        Ok(self.object(key))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        if self.fail_puts {
            bail!("MemoryStore: access denied writing {key}");
        }
        self.puts.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockQueue / FixedDelay
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockQueue {
    sent: Mutex<Vec<(QueueMessage, u32)>>,
    failing: bool,
}

impl MockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(QueueMessage, u32)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DelayQueue for MockQueue {
    async fn send(&self, message: &QueueMessage, delay_seconds: u32) -> Result<()> {
        if self.failing {
            bail!("MockQueue: send failed");
        }
        self.sent
            .lock()
            .unwrap()
            .push((message.clone(), delay_seconds));
        Ok(())
    }
}

/// Always returns the same value, even outside the requested range, so tests
/// can check that callers clamp.
pub struct FixedDelay(pub u32);

impl DelaySource for FixedDelay {
    fn delay_seconds(&self, _range: RangeInclusive<u32>) -> u32 {
        self.0
    }
}
