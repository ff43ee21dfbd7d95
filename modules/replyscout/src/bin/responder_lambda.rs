//! Queue-triggered entry point: posts each delivered reply.
//!
//! Reports a partial batch response so only transiently failed records are
//! redelivered. The event source mapping needs `ReportBatchItemFailures`.

use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse, SqsEvent};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use reddit_client::RedditClient;
use tracing::{info, warn};

use replyscout::reddit;
use replyscout::responder::{BatchStats, Responder};
use replyscout::telemetry::{self, LogFormat};
use replyscout_common::ResponderConfig;

async fn handle(
    forum: &RedditClient,
    event: LambdaEvent<SqsEvent>,
) -> Result<SqsBatchResponse, Error> {
    let records = event.payload.records;
    info!(
        request_id = %event.context.request_id,
        records = records.len(),
        "Responder invoked"
    );

    let responder = Responder::new(forum);
    let mut stats = BatchStats::default();
    let mut failures = Vec::new();

    for record in records {
        let message_id = record.message_id.unwrap_or_default();
        let body = record.body.unwrap_or_default();

        let outcome = responder.handle_body(&message_id, &body).await;
        stats.record(&outcome);

        if outcome.should_retry() {
            if message_id.is_empty() {
                // Without an id the record cannot be singled out; fail the batch.
                return Err("failed record has no message id".into());
            }
            failures.push(BatchItemFailure {
                item_identifier: message_id,
            });
        }
    }

    if !failures.is_empty() {
        warn!(failed = failures.len(), "Returning records for redelivery");
    }
    info!(
        posted = stats.posted,
        skipped = stats.skipped,
        discarded = stats.discarded,
        failed = stats.failed,
        "Batch complete"
    );

    Ok(SqsBatchResponse {
        batch_item_failures: failures,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init(LogFormat::from_env_or(LogFormat::Json));

    let config = ResponderConfig::from_env()?;
    config.log_keys();

    let forum = reddit::client(&config.reddit)?;
    let me = forum.me().await?;
    info!(username = %me.name, "Reddit credentials verified");

    let forum = &forum;
    lambda_runtime::run(service_fn(move |event| async move { handle(forum, event).await })).await
}
