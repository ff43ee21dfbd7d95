//! Responder workflow: turn one delay-queue message into one posted comment.
//!
//! Stateless. A normal return means the queue may drop the message; an error
//! leaves it to the queue's redelivery. Messages that can never succeed
//! (unparseable, target gone) are logged and reported as handled.

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, warn};

use replyscout_common::{MessageError, QueueMessage};

use crate::traits::{CommentResult, ForumWriter, TargetPost};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplyOutcome {
    Posted,
    TargetMissing,
    TargetClosed { reason: &'static str },
    /// Open at lookup, but the forum turned the comment down.
    Refused { reason: String },
}

/// Disposition of one raw queue record.
#[derive(Debug)]
pub enum RecordOutcome {
    Handled(ReplyOutcome),
    /// Bad body; redelivery cannot fix it.
    Discarded(MessageError),
    /// Transient failure; hand it back to the queue.
    Retry(anyhow::Error),
}

impl RecordOutcome {
    pub fn should_retry(&self) -> bool {
        matches!(self, RecordOutcome::Retry(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    pub posted: u32,
    pub skipped: u32,
    pub discarded: u32,
    pub failed: u32,
}

impl BatchStats {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Handled(ReplyOutcome::Posted) => self.posted += 1,
            RecordOutcome::Handled(_) => self.skipped += 1,
            RecordOutcome::Discarded(_) => self.discarded += 1,
            RecordOutcome::Retry(_) => self.failed += 1,
        }
    }
}

pub struct Responder<'a> {
    forum: &'a dyn ForumWriter,
}

impl<'a> Responder<'a> {
    pub fn new(forum: &'a dyn ForumWriter) -> Self {
        Self { forum }
    }

    pub async fn handle(&self, message: &QueueMessage) -> Result<ReplyOutcome> {
        let post_id = message.post_id.as_str();
        let title = message.post_title.as_deref().unwrap_or("N/A");

        match self.forum.target(post_id).await? {
            TargetPost::Missing => {
                warn!(post_id, title, "Target post no longer exists, dropping reply");
                Ok(ReplyOutcome::TargetMissing)
            }
            TargetPost::Closed { reason } => {
                warn!(post_id, title, reason, "Target post closed to comments, dropping reply");
                Ok(ReplyOutcome::TargetClosed { reason })
            }
            TargetPost::Open { title } => {
                info!(post_id, title = %title, "Replying to post");
                match self.forum.comment(post_id, &message.response_body).await? {
                    CommentResult::Posted => {
                        info!(post_id, "Reply posted");
                        Ok(ReplyOutcome::Posted)
                    }
                    CommentResult::Refused(reason) => {
                        warn!(post_id, reason = %reason, "Comment refused, dropping reply");
                        Ok(ReplyOutcome::Refused { reason })
                    }
                }
            }
        }
    }

    /// Parse and handle one raw queue body.
    pub async fn handle_body(&self, message_id: &str, body: &str) -> RecordOutcome {
        let message = match QueueMessage::parse(body) {
            Ok(message) => message,
            Err(e) => {
                error!(message_id, error = %e, body, "Discarding unusable queue message");
                return RecordOutcome::Discarded(e);
            }
        };

        match self.handle(&message).await {
            Ok(outcome) => RecordOutcome::Handled(outcome),
            Err(e) => {
                error!(
                    message_id,
                    post_id = %message.post_id,
                    error = %format!("{e:#}"),
                    "Reply failed, leaving message for redelivery"
                );
                RecordOutcome::Retry(e)
            }
        }
    }
}
