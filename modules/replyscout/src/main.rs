use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::info;

use ai_client::OpenAi;
use replyscout::aws::{load_sdk_config, S3RecordStore, SqsDelayQueue};
use replyscout::classifier::OpenAiClassifier;
use replyscout::delay::RandomDelay;
use replyscout::detector::{run_and_persist, Detector};
use replyscout::records::Records;
use replyscout::responder::{BatchStats, Responder};
use replyscout::telemetry::{self, LogFormat};
use replyscout::traits::DelayQueue;
use replyscout::reddit;
use replyscout_common::{DetectorConfig, QueueMessage, ResponderConfig};

#[derive(Parser)]
#[command(name = "replyscout", about = "Find Reddit posts worth answering and reply on a delay")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one detector pass.
    Detect {
        /// Classify and draft, but log replies instead of enqueueing them and
        /// leave both records untouched.
        #[arg(long)]
        dry_run: bool,
    },
    /// Drain visible messages from the reply queue and post them.
    Respond {
        #[arg(long, default_value_t = 10)]
        max_messages: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init(LogFormat::from_env_or(LogFormat::Text));

    match Cli::parse().command {
        Command::Detect { dry_run } => detect(dry_run).await,
        Command::Respond { max_messages } => respond(max_messages).await,
    }
}

async fn detect(dry_run: bool) -> Result<()> {
    let config = DetectorConfig::from_env()?;
    config.log_keys();

    let forum = reddit::client(&config.reddit)?;
    let classifier = OpenAiClassifier::new(
        OpenAi::new(&config.openai_api_key, &config.openai_model),
        config.match_threshold,
        config.portfolio_url.clone(),
    );
    let sdk_config = load_sdk_config().await;
    let store = S3RecordStore::new(&sdk_config, &config.bucket);
    let sqs = SqsDelayQueue::new(&sdk_config, &config.queue_url);
    let queue: &dyn DelayQueue = if dry_run { &DryRunQueue } else { &sqs };

    let detector = Detector {
        reader: &forum,
        classifier: &classifier,
        drafter: &classifier,
        queue,
        delays: &RandomDelay,
        forums: config.subreddits.clone(),
        scan_limit: config.post_scan_limit,
    };

    if dry_run {
        let known = Records::new(&store).load_processed().await?;
        let outcome = detector.run(known).await;
        info!(
            would_mark_processed = outcome.newly_processed.len(),
            "Dry run complete, records not saved. {}", outcome.stats
        );
        return Ok(());
    }

    let summary = run_and_persist(&detector, &store).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn respond(max_messages: u32) -> Result<()> {
    let config = ResponderConfig::from_env()?;
    config.log_keys();
    let Some(queue_url) = config.queue_url.as_deref() else {
        anyhow::bail!("SQS_QUEUE_URL is required to drain the queue by hand");
    };

    let forum = reddit::client(&config.reddit)?;
    let me = forum.me().await?;
    info!(username = %me.name, "Reddit credentials verified");

    let queue = SqsDelayQueue::new(&load_sdk_config().await, queue_url);
    let responder = Responder::new(&forum);
    let mut stats = BatchStats::default();
    let mut remaining = max_messages;

    while remaining > 0 {
        let batch = queue.receive(remaining.min(10) as i32, 2).await?;
        if batch.is_empty() {
            break;
        }
        for message in batch {
            remaining = remaining.saturating_sub(1);
            let outcome = responder.handle_body(&message.message_id, &message.body).await;
            stats.record(&outcome);
            // Retried messages become visible again once their timeout lapses.
            if !outcome.should_retry() {
                queue.delete(&message.receipt_handle).await?;
            }
        }
    }

    info!(
        posted = stats.posted,
        skipped = stats.skipped,
        discarded = stats.discarded,
        failed = stats.failed,
        "Queue drain complete"
    );
    Ok(())
}

/// Logs what would have been enqueued.
struct DryRunQueue;

#[async_trait]
impl DelayQueue for DryRunQueue {
    async fn send(&self, message: &QueueMessage, delay_seconds: u32) -> Result<()> {
        info!(
            post_id = %message.post_id,
            delay_seconds,
            reply = %message.response_body,
            "[dry run] would enqueue reply"
        );
        Ok(())
    }
}
