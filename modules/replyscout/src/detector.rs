//! Detector workflow: scan forums, classify new posts, draft and enqueue
//! replies for matches, and fold every handled post into the processed record.
//!
//! The processed record is an explicit value: [`Detector::run`] takes the
//! loaded record and hands back the merged one; [`run_and_persist`] owns the
//! single load and the single save around it.

use std::fmt;

use ai_client::util::summarize;
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use replyscout_common::{
    CandidatePost, ProcessedPosts, QueueMessage, SuccessfulReply, Verdict, MAX_REPLY_DELAY_SECS,
    MIN_REPLY_DELAY_SECS,
};

use crate::records::Records;
use crate::traits::{DelayQueue, DelaySource, ForumReader, PostClassifier, RecordStore, ReplyDrafter};

/// Reply text kept in the audit log.
const REPLY_LOG_SUMMARY_BYTES: usize = 200;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectorStats {
    pub forums_checked: u32,
    pub forums_failed: u32,
    pub posts_scanned: u32,
    pub already_processed: u32,
    pub pre_filtered: u32,
    pub classified: u32,
    pub matched: u32,
    pub rejected: u32,
    pub malformed: u32,
    pub queued: u32,
    pub failed: u32,
}

impl fmt::Display for DetectorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "forums={} (failed {}), scanned={}, already_processed={}, pre_filtered={}, \
             classified={}, matched={}, rejected={}, malformed={}, queued={}, failed={}",
            self.forums_checked,
            self.forums_failed,
            self.posts_scanned,
            self.already_processed,
            self.pre_filtered,
            self.classified,
            self.matched,
            self.rejected,
            self.malformed,
            self.queued,
            self.failed,
        )
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

pub struct Detector<'a> {
    pub reader: &'a dyn ForumReader,
    pub classifier: &'a dyn PostClassifier,
    pub drafter: &'a dyn ReplyDrafter,
    pub queue: &'a dyn DelayQueue,
    pub delays: &'a dyn DelaySource,
    pub forums: Vec<String>,
    pub scan_limit: u32,
}

/// Result of one pass, before anything is persisted.
#[derive(Debug, Clone, Default)]
pub struct DetectorOutcome {
    /// Loaded record merged with this run's newly processed ids.
    pub processed: ProcessedPosts,
    /// Ids handled during this run only.
    pub newly_processed: ProcessedPosts,
    /// Audit entries for replies that reached the queue.
    pub replies: Vec<SuccessfulReply>,
    pub stats: DetectorStats,
}

enum PostOutcome {
    Queued(SuccessfulReply),
    NoMatch(Verdict),
    /// Transient failure; the post stays unprocessed and is retried next run.
    Failed,
}

impl Detector<'_> {
    pub async fn run(&self, known: ProcessedPosts) -> DetectorOutcome {
        let mut newly = ProcessedPosts::new();
        let mut replies = Vec::new();
        let mut stats = DetectorStats::default();

        for forum in &self.forums {
            info!(forum = forum.as_str(), limit = self.scan_limit, "Checking forum");
            stats.forums_checked += 1;

            let posts = match self.reader.newest_posts(forum, self.scan_limit).await {
                Ok(posts) => posts,
                Err(e) => {
                    error!(forum = forum.as_str(), error = %format!("{e:#}"), "Failed to fetch posts, skipping forum");
                    stats.forums_failed += 1;
                    continue;
                }
            };

            for post in posts.into_iter().take(self.scan_limit as usize) {
                stats.posts_scanned += 1;

                if known.contains(&post.id) || newly.contains(&post.id) {
                    info!(post_id = %post.id, "Post already processed, skipping");
                    stats.already_processed += 1;
                    continue;
                }

                match self.process_post(&post, &mut stats).await {
                    PostOutcome::Queued(reply) => {
                        newly.insert(post.id.clone());
                        replies.push(reply);
                    }
                    PostOutcome::NoMatch(verdict) => {
                        debug!(post_id = %post.id, ?verdict, "No match");
                        newly.insert(post.id.clone());
                    }
                    PostOutcome::Failed => stats.failed += 1,
                }
            }
        }

        let mut processed = known;
        processed.merge(newly.clone());

        DetectorOutcome {
            processed,
            newly_processed: newly,
            replies,
            stats,
        }
    }

    async fn process_post(&self, post: &CandidatePost, stats: &mut DetectorStats) -> PostOutcome {
        let classification = match self.classifier.classify(post).await {
            Ok(c) => c,
            Err(e) => {
                error!(post_id = %post.id, error = %format!("{e:#}"), "Classification failed, will retry next run");
                return PostOutcome::Failed;
            }
        };

        if !classification.is_match() {
            match classification.verdict {
                Verdict::TaggedForHire => stats.pre_filtered += 1,
                Verdict::Malformed => {
                    stats.classified += 1;
                    stats.malformed += 1;
                }
                _ => {
                    stats.classified += 1;
                    stats.rejected += 1;
                }
            }
            return PostOutcome::NoMatch(classification.verdict);
        }
        stats.classified += 1;
        stats.matched += 1;

        let body = match self.drafter.draft(post).await {
            Ok(body) => body,
            Err(e) => {
                error!(post_id = %post.id, error = %format!("{e:#}"), "Drafting reply failed, will retry next run");
                return PostOutcome::Failed;
            }
        };

        let delay_seconds = self
            .delays
            .delay_seconds(MIN_REPLY_DELAY_SECS..=MAX_REPLY_DELAY_SECS)
            .clamp(MIN_REPLY_DELAY_SECS, MAX_REPLY_DELAY_SECS);
        let message = QueueMessage::for_post(post, body, classification.confidence);

        if let Err(e) = self.queue.send(&message, delay_seconds).await {
            error!(post_id = %post.id, error = %format!("{e:#}"), "Enqueue failed, will retry next run");
            return PostOutcome::Failed;
        }

        stats.queued += 1;
        info!(
            post_id = %post.id,
            title = %post.title,
            delay_seconds,
            "Queued reply"
        );

        PostOutcome::Queued(SuccessfulReply {
            post_id: post.id.clone(),
            reply: summarize(&message.response_body, REPLY_LOG_SUMMARY_BYTES),
            timestamp: Utc::now(),
            title: post.title.clone(),
            url: post.url.clone(),
            subreddit: post.forum.clone(),
            confidence: classification.confidence,
            delay_seconds,
        })
    }
}

// ---------------------------------------------------------------------------
// Load → run → persist
// ---------------------------------------------------------------------------

/// What a scheduled invocation reports back.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub forums: Vec<String>,
    pub stats: DetectorStats,
    pub new_messages_queued: bool,
    pub processed_record_updated: bool,
    pub reply_log_updated: bool,
}

/// One full detector invocation against durable storage.
///
/// Fails only if the processed record cannot be loaded. Save failures are
/// logged and reflected in the summary; already-enqueued replies stay queued.
pub async fn run_and_persist(detector: &Detector<'_>, store: &dyn RecordStore) -> Result<RunSummary> {
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("detector_run", run_id = %run_id);

    async {
        let records = Records::new(store);
        let known = records.load_processed().await?;

        let outcome = detector.run(known).await;
        info!("Detector pass complete. {}", outcome.stats);

        let processed_record_updated = if outcome.newly_processed.is_empty() {
            info!("No new posts processed, processed-post record unchanged");
            false
        } else {
            match records.save_processed(&outcome.processed).await {
                Ok(()) => true,
                Err(e) => {
                    error!(error = %format!("{e:#}"), "Failed to save processed-post record; posts may be reprocessed next run");
                    false
                }
            }
        };

        let reply_log_updated = if outcome.replies.is_empty() {
            false
        } else {
            match records.append_replies(&outcome.replies).await {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "Failed to append successful-reply log");
                    false
                }
            }
        };

        Ok::<_, anyhow::Error>(RunSummary {
            run_id: run_id.clone(),
            forums: detector.forums.clone(),
            new_messages_queued: !outcome.replies.is_empty(),
            stats: outcome.stats,
            processed_record_updated,
            reply_log_updated,
        })
    }
    .instrument(span)
    .await
}
