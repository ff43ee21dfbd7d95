pub mod config;
pub mod error;
pub mod types;

pub use config::{DetectorConfig, RedditConfig, ResponderConfig};
pub use error::{ConfigError, MessageError};
pub use types::{
    CandidatePost, Classification, ProcessedPosts, QueueMessage, ReplyLog, SuccessfulReply, Verdict,
    MAX_REPLY_DELAY_SECS, MIN_REPLY_DELAY_SECS,
};
