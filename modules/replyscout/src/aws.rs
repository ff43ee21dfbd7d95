//! S3-backed record store and SQS-backed delay queue.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

use replyscout_common::{QueueMessage, MAX_REPLY_DELAY_SECS};

use crate::traits::{DelayQueue, RecordStore};

pub async fn load_sdk_config() -> aws_config::SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

pub struct S3RecordStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3RecordStore {
    pub fn new(sdk_config: &aws_config::SdkConfig, bucket: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl RecordStore for S3RecordStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                info!(bucket = %self.bucket, key, "No existing object, starting empty");
                return Ok(None);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("GetObject s3://{}/{key} failed", self.bucket))
            }
        };

        let bytes = output
            .body
            .collect()
            .await
            .with_context(|| format!("reading s3://{}/{key} failed", self.bucket))?
            .into_bytes();
        Ok(Some(bytes.to_vec()))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("PutObject s3://{}/{key} failed", self.bucket))?;
        debug!(bucket = %self.bucket, key, "Saved object");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQS
// ---------------------------------------------------------------------------

/// A message pulled from the queue by hand (outside the function trigger).
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

pub struct SqsDelayQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsDelayQueue {
    pub fn new(sdk_config: &aws_config::SdkConfig, queue_url: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_sqs::Client::new(sdk_config),
            queue_url: queue_url.into(),
        }
    }

    /// Long-poll for up to `max` visible messages (SQS caps a batch at 10).
    pub async fn receive(&self, max: i32, wait_seconds: i32) -> Result<Vec<ReceivedMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max.clamp(1, 10))
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .context("ReceiveMessage failed")?;

        Ok(output
            .messages()
            .iter()
            .filter_map(|m| {
                Some(ReceivedMessage {
                    message_id: m.message_id()?.to_string(),
                    receipt_handle: m.receipt_handle()?.to_string(),
                    body: m.body().unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    pub async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .context("DeleteMessage failed")?;
        Ok(())
    }
}

#[async_trait]
impl DelayQueue for SqsDelayQueue {
    async fn send(&self, message: &QueueMessage, delay_seconds: u32) -> Result<()> {
        // SQS rejects DelaySeconds above 900; the reply range stays well inside.
        let delay = delay_seconds.min(MAX_REPLY_DELAY_SECS) as i32;
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(message.to_body())
            .delay_seconds(delay)
            .send()
            .await
            .with_context(|| format!("SendMessage for post {} failed", message.post_id))?;
        debug!(
            post_id = %message.post_id,
            message_id = output.message_id().unwrap_or_default(),
            delay_seconds = delay,
            "Enqueued reply"
        );
        Ok(())
    }
}
