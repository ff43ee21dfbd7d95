use thiserror::Error;

/// Startup configuration problems. Always fatal for the invocation.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(String),

    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// A delay-queue body that can never be handled, however often it is redelivered.
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("message body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is missing {0}")]
    MissingField(&'static str),
}
