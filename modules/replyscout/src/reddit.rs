//! Forum adapters over the Reddit client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reddit_client::{Credentials, RedditClient, RedditError, RedditPost};

use replyscout_common::{CandidatePost, RedditConfig};

use crate::traits::{CommentResult, ForumReader, ForumWriter, TargetPost};

pub fn credentials(config: &RedditConfig) -> Credentials {
    Credentials {
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        username: config.username.clone(),
        password: config.password.clone(),
        user_agent: config.user_agent.clone(),
    }
}

pub fn client(config: &RedditConfig) -> Result<RedditClient> {
    RedditClient::new(credentials(config)).context("failed to build Reddit client")
}

pub fn to_candidate(post: RedditPost) -> CandidatePost {
    let url = post.url();
    let created_at = post.created_at();
    CandidatePost {
        id: post.id,
        title: post.title,
        body: post.selftext,
        author: post.author,
        forum: post.subreddit,
        url,
        created_at,
    }
}

#[async_trait]
impl ForumReader for RedditClient {
    async fn newest_posts(&self, forum: &str, limit: u32) -> Result<Vec<CandidatePost>> {
        let posts = self
            .new_posts(forum, limit)
            .await
            .with_context(|| format!("listing r/{forum}/new failed"))?;
        Ok(posts.into_iter().map(to_candidate).collect())
    }
}

#[async_trait]
impl ForumWriter for RedditClient {
    async fn target(&self, post_id: &str) -> Result<TargetPost> {
        match self.submission(post_id).await {
            Ok(post) => Ok(TargetPost::from_post(post.as_ref())),
            // Private or quarantined subreddit: the post is out of reach.
            Err(RedditError::Forbidden(_)) => Ok(TargetPost::Closed {
                reason: "forbidden",
            }),
            Err(e) => Err(e).with_context(|| format!("looking up post {post_id} failed")),
        }
    }

    async fn comment(&self, post_id: &str, body: &str) -> Result<CommentResult> {
        match self.reply(post_id, body).await {
            Ok(name) => {
                tracing::debug!(post_id, comment = name.as_deref().unwrap_or("?"), "Comment created");
                Ok(CommentResult::Posted)
            }
            Err(RedditError::Forbidden(reason)) => Ok(CommentResult::Refused(reason)),
            Err(e) => Err(e).with_context(|| format!("commenting on post {post_id} failed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{RecordOutcome, ReplyOutcome, Responder};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Client against `server` with a token endpoint and an open `abc123`.
    async fn client_with_open_post(server: &MockServer) -> RedditClient {
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok",
                "expires_in": 3600
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "Listing",
                "data": {"children": [{"kind": "t3", "data": {
                    "id": "abc123",
                    "title": "Need a picture book illustrator",
                    "subreddit": "HireAnArtist",
                    "permalink": "/r/HireAnArtist/comments/abc123/need/"
                }}]}
            })))
            .mount(server)
            .await;

        RedditClient::new(credentials(&RedditConfig {
            username: "bot".into(),
            password: "pw".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            user_agent: "replyscout-test/0.1".into(),
        }))
        .unwrap()
        .with_base_urls(server.uri(), server.uri())
    }

    const BODY: &str = r#"{"postId":"abc123","responseBody":"Hi!"}"#;

    #[tokio::test]
    async fn banned_from_subreddit_is_handled_not_retried() {
        let server = MockServer::start().await;
        let client = client_with_open_post(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/comment"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = Responder::new(&client).handle_body("m-1", BODY).await;

        assert!(!outcome.should_retry());
        assert!(matches!(
            outcome,
            RecordOutcome::Handled(ReplyOutcome::Refused { .. })
        ));
    }

    #[tokio::test]
    async fn thread_locked_after_lookup_is_handled_not_retried() {
        let server = MockServer::start().await;
        let client = client_with_open_post(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/comment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "json": {"errors": [["THREAD_LOCKED", "that thread is locked", "parent"]]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = Responder::new(&client).handle_body("m-1", BODY).await;

        match outcome {
            RecordOutcome::Handled(ReplyOutcome::Refused { reason }) => {
                assert!(reason.starts_with("THREAD_LOCKED"), "{reason}");
            }
            other => panic!("expected a refused reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_on_comment_is_retried() {
        let server = MockServer::start().await;
        let client = client_with_open_post(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/comment"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let outcome = Responder::new(&client).handle_body("m-1", BODY).await;
        assert!(outcome.should_retry());
    }

    #[test]
    fn candidate_carries_absolute_url_and_forum() {
        let post: RedditPost = serde_json::from_value(serde_json::json!({
            "id": "abc123",
            "title": "LF children's book illustrator",
            "selftext": "Budget $500",
            "author": "writer",
            "subreddit": "HireAnArtist",
            "permalink": "/r/HireAnArtist/comments/abc123/lf/",
            "created_utc": 1_700_000_000.0
        }))
        .unwrap();

        let candidate = to_candidate(post);
        assert_eq!(candidate.id, "abc123");
        assert_eq!(candidate.forum, "HireAnArtist");
        assert_eq!(candidate.body, "Budget $500");
        assert_eq!(
            candidate.url,
            "https://www.reddit.com/r/HireAnArtist/comments/abc123/lf/"
        );
    }

    #[test]
    fn target_state_reflects_post_flags() {
        let mut post: RedditPost = serde_json::from_value(serde_json::json!({
            "id": "abc123",
            "title": "t",
            "subreddit": "s",
            "permalink": "/r/s/comments/abc123/t/"
        }))
        .unwrap();
        assert_eq!(
            TargetPost::from_post(Some(&post)),
            TargetPost::Open { title: "t".into() }
        );
        post.archived = true;
        assert_eq!(
            TargetPost::from_post(Some(&post)),
            TargetPost::Closed { reason: "archived" }
        );
        assert_eq!(TargetPost::from_post(None), TargetPost::Missing);
    }
}
