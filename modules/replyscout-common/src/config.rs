use std::str::FromStr;

use crate::error::ConfigError;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SUBREDDITS: &str = "testingground4bots";
const DEFAULT_POST_SCAN_LIMIT: u32 = 25;
const DEFAULT_MATCH_THRESHOLD: f64 = 0.7;

/// Reddit script-app credentials, shared by both workflows.
#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl RedditConfig {
    fn from_lookup(env: &Env<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            username: env.required("REDDIT_USERNAME")?,
            password: env.required("REDDIT_PASSWORD")?,
            client_id: env.required("REDDIT_CLIENT_ID")?,
            client_secret: env.required("REDDIT_CLIENT_SECRET")?,
            user_agent: env.required("REDDIT_USER_AGENT")?,
        })
    }
}

/// Configuration for the scheduled detector.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub reddit: RedditConfig,

    // Classification service
    pub openai_api_key: String,
    pub openai_model: String,
    pub match_threshold: f64,
    pub portfolio_url: Option<String>,

    // Scanning
    pub subreddits: Vec<String>,
    pub post_scan_limit: u32,

    // Storage and queue
    pub bucket: String,
    pub queue_url: String,
}

impl DetectorConfig {
    /// Load from the process environment (and a `.env` file if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let subreddits: Vec<String> = env
            .optional("SUBREDDITS")
            .unwrap_or_else(|| DEFAULT_SUBREDDITS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if subreddits.is_empty() {
            return Err(ConfigError::Invalid {
                key: "SUBREDDITS".into(),
                value: env.optional("SUBREDDITS").unwrap_or_default(),
                reason: "no subreddit names".into(),
            });
        }

        let post_scan_limit: u32 = env.parsed("POST_SCAN_LIMIT", DEFAULT_POST_SCAN_LIMIT)?;
        if !(1..=100).contains(&post_scan_limit) {
            return Err(ConfigError::Invalid {
                key: "POST_SCAN_LIMIT".into(),
                value: post_scan_limit.to_string(),
                reason: "must be between 1 and 100".into(),
            });
        }

        let match_threshold: f64 =
            env.parsed("MATCH_CONFIDENCE_THRESHOLD", DEFAULT_MATCH_THRESHOLD)?;
        if !(0.0..=1.0).contains(&match_threshold) {
            return Err(ConfigError::Invalid {
                key: "MATCH_CONFIDENCE_THRESHOLD".into(),
                value: match_threshold.to_string(),
                reason: "must be between 0.0 and 1.0".into(),
            });
        }

        Ok(Self {
            reddit: RedditConfig::from_lookup(&env)?,
            openai_api_key: env.required("OPENAI_API_KEY")?,
            openai_model: env
                .optional("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            match_threshold,
            portfolio_url: env.optional("PORTFOLIO_URL"),
            subreddits,
            post_scan_limit,
            bucket: env.required("S3_BUCKET_NAME")?,
            queue_url: env.required("SQS_QUEUE_URL")?,
        })
    }

    pub fn log_keys(&self) {
        tracing::info!("Detector config loaded:");
        log_reddit(&self.reddit);
        tracing::info!("  OPENAI_API_KEY: {}", preview(&self.openai_api_key));
        tracing::info!("  OPENAI_MODEL: {}", self.openai_model);
        tracing::info!("  SUBREDDITS: {}", self.subreddits.join(","));
        tracing::info!("  POST_SCAN_LIMIT: {}", self.post_scan_limit);
        tracing::info!("  MATCH_CONFIDENCE_THRESHOLD: {}", self.match_threshold);
        tracing::info!(
            "  PORTFOLIO_URL: {}",
            self.portfolio_url.as_deref().unwrap_or("<not set>")
        );
        tracing::info!("  S3_BUCKET_NAME: {}", self.bucket);
        tracing::info!("  SQS_QUEUE_URL: {}", self.queue_url);
    }
}

/// Configuration for the queue-triggered responder.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub reddit: RedditConfig,
    /// Only needed when draining the queue by hand; the function trigger
    /// delivers messages itself.
    pub queue_url: Option<String>,
}

impl ResponderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);
        Ok(Self {
            reddit: RedditConfig::from_lookup(&env)?,
            queue_url: env.optional("SQS_QUEUE_URL"),
        })
    }

    pub fn log_keys(&self) {
        tracing::info!("Responder config loaded:");
        log_reddit(&self.reddit);
        tracing::info!(
            "  SQS_QUEUE_URL: {}",
            self.queue_url.as_deref().unwrap_or("<not set>")
        );
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Set and non-blank, trimmed.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

fn preview(val: &str) -> String {
    let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
    format!("{}...({} chars)", &val[..n], val.chars().count())
}

fn log_reddit(reddit: &RedditConfig) {
    tracing::info!("  REDDIT_USERNAME: {}", reddit.username);
    tracing::info!("  REDDIT_PASSWORD: <{} chars>", reddit.password.chars().count());
    tracing::info!("  REDDIT_CLIENT_ID: {}", preview(&reddit.client_id));
    tracing::info!("  REDDIT_CLIENT_SECRET: {}", preview(&reddit.client_secret));
    tracing::info!("  REDDIT_USER_AGENT: {}", reddit.user_agent);
}
