mod client;
pub(crate) mod schema;
pub(crate) mod types;

pub use schema::StructuredOutput;

use anyhow::{anyhow, Result};

use client::{OpenAiClient, OPENAI_API_URL};
use types::ChatRequest;

// =============================================================================
// Options
// =============================================================================

/// Per-call knobs for a plain chat completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

// =============================================================================
// OpenAi
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: Option<String>,
}

impl std::fmt::Debug for OpenAi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAi")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    fn client(&self) -> Result<OpenAiClient> {
        OpenAiClient::new(
            &self.api_key,
            self.base_url.as_deref().unwrap_or(OPENAI_API_URL),
        )
    }

    /// Plain chat completion: one system message, one user message.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
        options: ChatOptions,
    ) -> Result<String> {
        let mut request = ChatRequest::new(&self.model, system, user);
        if let Some(limit) = options.max_tokens {
            request = request.token_limit(limit);
        }
        self.client()?.chat(&request).await
    }

    /// Structured output with a caller-supplied strict schema. Returns the raw
    /// JSON text so callers decide how to treat a body that does not parse.
    pub async fn structured_output(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
        schema: serde_json::Value,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model, system, user)
            .temperature(0.0)
            .json_schema(schema);
        self.client()?.chat(&request).await
    }

    /// Type-safe structured output extraction.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<T> {
        let json = self
            .structured_output(system, user, T::openai_schema())
            .await?;
        serde_json::from_str(crate::util::strip_code_blocks(&json))
            .map_err(|e| anyhow!("Failed to deserialize response: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-test",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Verdict {
        is_relevant: bool,
    }

    #[test]
    fn debug_output_hides_api_key() {
        let ai = OpenAi::new("sk-secret", "gpt-4o-mini");
        let debug = format!("{ai:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn chat_completion_sends_token_limit_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "max_tokens": 250
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hello there")))
            .expect(1)
            .mount(&server)
            .await;

        let ai = OpenAi::new("sk-test", "gpt-4o-mini").with_base_url(server.uri());
        let text = ai
            .chat_completion("sys", "user", ChatOptions::default().max_tokens(250))
            .await
            .unwrap();
        assert_eq!(text, "Hello there");
    }

    #[tokio::test]
    async fn extract_parses_structured_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_schema"}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion(r#"{"is_relevant": true}"#)),
            )
            .mount(&server)
            .await;

        let ai = OpenAi::new("sk-test", "gpt-4o-mini").with_base_url(server.uri());
        let verdict: Verdict = ai.extract("sys", "user").await.unwrap();
        assert!(verdict.is_relevant);
    }

    #[tokio::test]
    async fn api_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let ai = OpenAi::new("sk-test", "gpt-4o-mini").with_base_url(server.uri());
        let err = ai
            .chat_completion("sys", "user", ChatOptions::default())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("429"), "{message}");
        assert!(message.contains("slow down"), "{message}");
    }
}
