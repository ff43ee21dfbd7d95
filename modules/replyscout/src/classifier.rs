//! LLM-backed relevance classification and reply drafting.
//!
//! Classification is one strict structured-output call returning
//! [`StyleMatchResponse`]; drafting is a plain completion capped at a short
//! reply, with the portfolio signature appended locally so the model never
//! invents contact details.

use std::sync::LazyLock;

use ai_client::util::strip_code_blocks;
use ai_client::{ChatOptions, OpenAi, StructuredOutput};
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use replyscout_common::{CandidatePost, Classification, Verdict};

use crate::traits::{PostClassifier, ReplyDrafter};

/// Token cap for the drafted reply (about fifty words plus slack).
const DRAFT_MAX_TOKENS: u32 = 250;

static FOR_HIRE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\s*for\s+hire\s*\]").expect("static regex"));

const STYLE_PROFILE: &str = "\
- Light-hearted, healing, whimsical, humorous, and warm
- Aims to convey warmth and happiness while positively influencing young minds
- Focuses on children's books and products, but is versatile across mediums
- Works with illustrations, paper sculptures, fabric mascots, stop-motion animation
- Strong emphasis on conceptual exploration
- Thoughtful use of color theory";

pub fn classification_system_prompt() -> String {
    format!(
        "You are an assistant that determines if a Reddit post is seeking an artist with a specific style.

First, determine if the post is FROM an artist looking for work (which we should ignore) or FROM someone LOOKING TO HIRE an artist (which we want to respond to).

IGNORE posts where the person is an artist advertising their services or looking for clients.
ONLY consider posts where someone is looking to hire or commission an artist.

If the post is from an artist looking for work, set is_artist_seeking_work to true, is_relevant to false and confidence to 0.0.

If the post is from someone looking to hire an artist, evaluate whether they are looking for an artist with this style:
{STYLE_PROFILE}

Consider posts seeking artists for:
- Children's books or products
- Light-hearted, whimsical, or warm illustration styles
- Projects needing a positive, uplifting aesthetic
- Family-friendly or educational content
- Character design with warmth and personality

Set is_relevant to true only when the requested work matches or is compatible with this style. Set confidence to your confidence from 0.0 to 1.0."
    )
}

pub fn classification_user_prompt(post: &CandidatePost) -> String {
    format!(
        "Is the following Reddit post seeking an artist with a style matching or compatible with the description above? \
The post doesn't have to be specifically about children's books; it could be any project where this style would be appropriate. \
Remember to first determine if the post is FROM an artist looking for work (ignore) or FROM someone LOOKING TO HIRE an artist (consider).\n\n{}",
        post.prompt_content()
    )
}

pub fn draft_system_prompt() -> String {
    format!(
        "You are an illustrator with a light-hearted, whimsical, warm style who specializes in children's content but is versatile across different mediums.

Your art style is:
{STYLE_PROFILE}

Create a VERY BRIEF personalized reply to this Reddit post (maximum 50 words). Make it friendly and directly relevant to what they're looking for. Focus only on how your style matches their specific needs.

DO NOT include a website or contact information; that is added separately."
    )
}

/// Whether the title carries a `[for hire]` tag, the convention artists use
/// to advertise themselves.
pub fn is_tagged_for_hire(title: &str) -> bool {
    FOR_HIRE_TAG.is_match(title)
}

// ---------------------------------------------------------------------------
// Response interpretation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StyleMatchResponse {
    pub is_relevant: bool,
    pub confidence: f64,
    pub is_artist_seeking_work: bool,
}

impl StyleMatchResponse {
    pub fn into_classification(self, threshold: f64) -> Classification {
        if self.is_artist_seeking_work {
            return Classification::rejected(Verdict::ArtistSeekingWork);
        }
        let confidence = self.confidence.clamp(0.0, 1.0);
        match (self.is_relevant, confidence >= threshold) {
            (true, true) => Classification::new(Verdict::Match, confidence),
            (true, false) => Classification::new(Verdict::BelowThreshold, confidence),
            (false, _) => Classification::new(Verdict::NotRelevant, confidence),
        }
    }
}

/// Read a raw model answer. Anything that does not parse is `Malformed`.
pub fn interpret(raw: &str, threshold: f64) -> Classification {
    match serde_json::from_str::<StyleMatchResponse>(strip_code_blocks(raw)) {
        Ok(response) => response.into_classification(threshold),
        Err(e) => {
            warn!(error = %e, raw, "Unreadable classification response, treating as no match");
            Classification::rejected(Verdict::Malformed)
        }
    }
}

/// Model reply followed by the portfolio line, when one is configured.
pub fn compose_reply(personalized: &str, portfolio_url: Option<&str>) -> String {
    let personalized = personalized.trim();
    match portfolio_url {
        Some(url) => format!(
            "{personalized}\n\nYou can see my portfolio and contact me at: {url}"
        ),
        None => personalized.to_string(),
    }
}

// ---------------------------------------------------------------------------
// OpenAI implementation
// ---------------------------------------------------------------------------

pub struct OpenAiClassifier {
    ai: OpenAi,
    threshold: f64,
    portfolio_url: Option<String>,
}

impl OpenAiClassifier {
    pub fn new(ai: OpenAi, threshold: f64, portfolio_url: Option<String>) -> Self {
        Self {
            ai,
            threshold,
            portfolio_url,
        }
    }
}

#[async_trait]
impl PostClassifier for OpenAiClassifier {
    async fn classify(&self, post: &CandidatePost) -> Result<Classification> {
        if is_tagged_for_hire(&post.title) {
            info!(post_id = %post.id, title = %post.title, "Skipping [for hire] post");
            return Ok(Classification::rejected(Verdict::TaggedForHire));
        }

        let raw = self
            .ai
            .structured_output(
                classification_system_prompt(),
                classification_user_prompt(post),
                StyleMatchResponse::openai_schema(),
            )
            .await?;

        let classification = interpret(&raw, self.threshold);
        info!(
            post_id = %post.id,
            title = %post.title,
            verdict = ?classification.verdict,
            confidence = classification.confidence,
            "Classified post"
        );
        Ok(classification)
    }
}

#[async_trait]
impl ReplyDrafter for OpenAiClassifier {
    async fn draft(&self, post: &CandidatePost) -> Result<String> {
        let personalized = self
            .ai
            .chat_completion(
                draft_system_prompt(),
                format!("Here's the Reddit post to respond to:\n\n{}", post.prompt_content()),
                ChatOptions::default().max_tokens(DRAFT_MAX_TOKENS),
            )
            .await?;

        if personalized.trim().is_empty() {
            anyhow::bail!("model returned an empty reply for post {}", post.id);
        }

        Ok(compose_reply(&personalized, self.portfolio_url.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn for_hire_tag_detection_tolerates_case_and_spacing() {
        assert!(is_tagged_for_hire("[For Hire] Cute character art"));
        assert!(is_tagged_for_hire("[ for  hire ] commissions open"));
        assert!(!is_tagged_for_hire("[Hiring] Illustrator for picture book"));
        assert!(!is_tagged_for_hire("Looking for hire-able artists"));
    }

    #[test]
    fn artist_seeking_work_overrides_confidence() {
        let c = interpret(
            r#"{"is_relevant": true, "confidence": 0.99, "is_artist_seeking_work": true}"#,
            0.7,
        );
        assert_eq!(c.verdict, Verdict::ArtistSeekingWork);
        assert!(!c.is_match());
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn relevance_needs_threshold_confidence() {
        let high = interpret(
            r#"{"is_relevant": true, "confidence": 0.85, "is_artist_seeking_work": false}"#,
            0.7,
        );
        assert!(high.is_match());

        let low = interpret(
            r#"{"is_relevant": true, "confidence": 0.5, "is_artist_seeking_work": false}"#,
            0.7,
        );
        assert_eq!(low.verdict, Verdict::BelowThreshold);

        let exact = interpret(
            r#"{"is_relevant": true, "confidence": 0.7, "is_artist_seeking_work": false}"#,
            0.7,
        );
        assert!(exact.is_match());
    }

    #[test]
    fn fenced_json_is_accepted() {
        let c = interpret(
            "```json\n{\"is_relevant\": false, \"confidence\": 0.2, \"is_artist_seeking_work\": false}\n```",
            0.7,
        );
        assert_eq!(c.verdict, Verdict::NotRelevant);
    }

    #[test]
    fn garbage_is_malformed_no_match() {
        let c = interpret("Sure! This post looks relevant.", 0.7);
        assert_eq!(c.verdict, Verdict::Malformed);
        assert!(!c.is_match());
    }

    #[test]
    fn system_prompt_carries_exclusion_rule() {
        let prompt = classification_system_prompt();
        assert!(prompt.contains("IGNORE posts where the person is an artist advertising their services"));
        assert!(prompt.contains("is_artist_seeking_work"));
    }

    #[test]
    fn reply_gets_portfolio_signature() {
        assert_eq!(
            compose_reply("  Love this project!  ", Some("https://example.com")),
            "Love this project!\n\nYou can see my portfolio and contact me at: https://example.com"
        );
        assert_eq!(compose_reply("Love this project!", None), "Love this project!");
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-test",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    async fn classifier_against(server: &MockServer) -> OpenAiClassifier {
        OpenAiClassifier::new(
            OpenAi::new("sk-test", "gpt-4o-mini").with_base_url(server.uri()),
            0.7,
            Some("https://example.com".into()),
        )
    }

    #[tokio::test]
    async fn for_hire_posts_never_reach_the_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let classifier = classifier_against(&server).await;
        let post = crate::testing::post("art1", "HungryArtists", "[FOR HIRE] Whimsical kids' art");
        let c = classifier.classify(&post).await.unwrap();
        assert_eq!(c.verdict, Verdict::TaggedForHire);
    }

    #[tokio::test]
    async fn classify_then_draft_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "response_format": {"type": "json_schema"}
            })))
            .and(body_string_contains("IGNORE posts where the person is an artist"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"{"is_relevant": true, "confidence": 0.9, "is_artist_seeking_work": false}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"max_tokens": DRAFT_MAX_TOKENS})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("Your book sounds lovely!")),
            )
            .mount(&server)
            .await;

        let classifier = classifier_against(&server).await;
        let post = crate::testing::post("abc123", "HungryArtists", "[Hiring] Picture book illustrator");

        let c = classifier.classify(&post).await.unwrap();
        assert!(c.is_match());
        assert_eq!(c.confidence, 0.9);

        let reply = classifier.draft(&post).await.unwrap();
        assert!(reply.starts_with("Your book sounds lovely!"));
        assert!(reply.ends_with("https://example.com"));
    }

    #[tokio::test]
    async fn empty_draft_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
            .mount(&server)
            .await;

        let classifier = classifier_against(&server).await;
        let post = crate::testing::post("abc123", "HungryArtists", "Need a mascot");
        assert!(classifier.draft(&post).await.is_err());
    }

    #[test]
    fn schema_requires_all_three_fields() {
        let schema = StyleMatchResponse::openai_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 3);
    }
}
