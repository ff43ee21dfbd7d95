// Trait seams for the two workflows.
//
// Every external collaborator sits behind one of these: the forum (read for
// the detector, write for the responder), the classification service, the
// object store holding both records, the delay queue, and the random delay
// draw. Production impls live in `reddit`, `classifier`, `aws` and `delay`;
// in-memory mocks live in `testing`.

use std::ops::RangeInclusive;

use anyhow::Result;
use async_trait::async_trait;
use reddit_client::RedditPost;

use replyscout_common::{CandidatePost, Classification, QueueMessage};

// ---------------------------------------------------------------------------
// Forum
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ForumReader: Send + Sync {
    /// Newest posts in `forum`, at most `limit`, from one listing call.
    async fn newest_posts(&self, forum: &str, limit: u32) -> Result<Vec<CandidatePost>>;
}

/// State of a reply target at the time the responder looks it up.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetPost {
    Open { title: String },
    /// Locked, archived, removed or out of reach; a comment would be refused.
    Closed { reason: &'static str },
    Missing,
}

impl TargetPost {
    pub fn from_post(post: Option<&RedditPost>) -> Self {
        match post {
            None => TargetPost::Missing,
            Some(p) => match p.closed_reason() {
                Some(reason) => TargetPost::Closed { reason },
                None => TargetPost::Open {
                    title: p.title.clone(),
                },
            },
        }
    }
}

/// Result of a comment the forum answered definitively.
#[derive(Debug, Clone, PartialEq)]
pub enum CommentResult {
    Posted,
    /// The forum will never take this comment (banned, locked after lookup,
    /// deleted, too old).
    Refused(String),
}

#[async_trait]
pub trait ForumWriter: Send + Sync {
    async fn target(&self, post_id: &str) -> Result<TargetPost>;

    /// Submit `body` as a top-level comment on the post. `Err` only for
    /// failures a later attempt could get past.
    async fn comment(&self, post_id: &str, body: &str) -> Result<CommentResult>;
}

// ---------------------------------------------------------------------------
// Classification service
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PostClassifier: Send + Sync {
    /// `Err` only for transport failures; an unreadable answer is a
    /// `Verdict::Malformed` classification.
    async fn classify(&self, post: &CandidatePost) -> Result<Classification>;
}

#[async_trait]
pub trait ReplyDrafter: Send + Sync {
    async fn draft(&self, post: &CandidatePost) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Storage and queue
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// `Ok(None)` when the object does not exist yet.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;
}

#[async_trait]
pub trait DelayQueue: Send + Sync {
    async fn send(&self, message: &QueueMessage, delay_seconds: u32) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

pub trait DelaySource: Send + Sync {
    /// A delay in seconds drawn from `range`.
    fn delay_seconds(&self, range: RangeInclusive<u32>) -> u32;
}
