//! Scheduled-event entry point: one detector pass per invocation.

use lambda_runtime::{service_fn, Error, LambdaEvent};
use reddit_client::RedditClient;
use serde_json::Value;
use tracing::info;

use ai_client::OpenAi;
use replyscout::aws::{load_sdk_config, S3RecordStore, SqsDelayQueue};
use replyscout::classifier::OpenAiClassifier;
use replyscout::delay::RandomDelay;
use replyscout::detector::{run_and_persist, Detector};
use replyscout::reddit;
use replyscout::telemetry::{self, LogFormat};
use replyscout_common::DetectorConfig;

/// Clients built once per cold start and reused across invocations.
struct Handler {
    config: DetectorConfig,
    forum: RedditClient,
    classifier: OpenAiClassifier,
    store: S3RecordStore,
    queue: SqsDelayQueue,
}

impl Handler {
    async fn run(&self, event: LambdaEvent<Value>) -> Result<Value, Error> {
        info!(request_id = %event.context.request_id, "Detector invoked");

        let detector = Detector {
            reader: &self.forum,
            classifier: &self.classifier,
            drafter: &self.classifier,
            queue: &self.queue,
            delays: &RandomDelay,
            forums: self.config.subreddits.clone(),
            scan_limit: self.config.post_scan_limit,
        };

        let summary = run_and_persist(&detector, &self.store).await?;
        Ok(serde_json::to_value(summary)?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init(LogFormat::from_env_or(LogFormat::Json));

    let config = DetectorConfig::from_env()?;
    config.log_keys();

    let sdk_config = load_sdk_config().await;
    let handler = Handler {
        forum: reddit::client(&config.reddit)?,
        classifier: OpenAiClassifier::new(
            OpenAi::new(&config.openai_api_key, &config.openai_model),
            config.match_threshold,
            config.portfolio_url.clone(),
        ),
        store: S3RecordStore::new(&sdk_config, &config.bucket),
        queue: SqsDelayQueue::new(&sdk_config, &config.queue_url),
        config,
    };

    let handler = &handler;
    lambda_runtime::run(service_fn(move |event| async move { handler.run(event).await })).await
}
