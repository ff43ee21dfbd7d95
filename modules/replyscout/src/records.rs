//! The two durable JSON records: processed post ids and the successful-reply
//! audit log.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use replyscout_common::{ProcessedPosts, ReplyLog, SuccessfulReply};

use crate::traits::RecordStore;

pub const PROCESSED_POSTS_KEY: &str = "processed_posts_log.json";
pub const SUCCESSFUL_REPLIES_KEY: &str = "successful_queued_messages_log.json";

pub struct Records<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> Records<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.store.get(key).await? {
            None => Ok(T::default()),
            Some(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("{key} is not a valid record")),
        }
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value)?;
        self.store.put(key, body).await
    }

    /// Missing object → empty record. Any other failure is an error: starting
    /// from an empty record would re-reply to every recent post.
    pub async fn load_processed(&self) -> Result<ProcessedPosts> {
        let record: ProcessedPosts = self.load(PROCESSED_POSTS_KEY).await?;
        info!(known_posts = record.len(), "Loaded processed-post record");
        Ok(record)
    }

    pub async fn save_processed(&self, record: &ProcessedPosts) -> Result<()> {
        self.save(PROCESSED_POSTS_KEY, record).await?;
        info!(known_posts = record.len(), "Saved processed-post record");
        Ok(())
    }

    /// Read-append-write of the audit log. Returns the log's new length.
    pub async fn append_replies(&self, entries: &[SuccessfulReply]) -> Result<usize> {
        let mut log: ReplyLog = self.load(SUCCESSFUL_REPLIES_KEY).await?;
        log.extend(entries);
        self.save(SUCCESSFUL_REPLIES_KEY, &log).await?;
        info!(appended = entries.len(), total = log.len(), "Saved successful-reply log");
        Ok(log.len())
    }
}
