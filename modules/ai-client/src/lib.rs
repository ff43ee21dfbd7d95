//! Thin OpenAI chat-completions client.
//!
//! Two call shapes are supported: plain text completion and strict
//! JSON-schema structured output derived from a `schemars` type.

pub mod openai;
pub mod util;

pub use openai::{ChatOptions, OpenAi, StructuredOutput};
