pub mod error;
pub mod types;

pub use error::{RedditError, Result};
pub use types::{Credentials, RedditPost, RedditUser};

use std::time::{Duration, Instant};

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use types::{AccessTokenResponse, CommentResponse, Listing};

const AUTH_URL: &str = "https://www.reddit.com";
const API_URL: &str = "https://oauth.reddit.com";

/// Listing endpoints cap `limit` at 100.
const MAX_LISTING_LIMIT: u32 = 100;

/// Refresh the bearer token this long before Reddit says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `json.errors` codes from `/api/comment` that no retry can get past.
const REFUSAL_CODES: &[&str] = &[
    "THREAD_LOCKED",
    "DELETED_LINK",
    "TOO_OLD",
    "SUBREDDIT_NOTALLOWED",
];

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditClient {
    client: reqwest::Client,
    credentials: Credentials,
    auth_url: String,
    api_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl RedditClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(credentials.user_agent.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            credentials,
            auth_url: AUTH_URL.to_string(),
            api_url: API_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Point the client at other hosts (tests, proxies).
    pub fn with_base_urls(mut self, auth_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into().trim_end_matches('/').to_string();
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bearer token for the script app, fetched with the password grant and
    /// cached until shortly before expiry.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!(username = %self.credentials.username, "Requesting Reddit access token");

        let url = format!("{}/api/v1/access_token", self.auth_url);
        let resp = self
            .client
            .post(&url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RedditError::Auth(format!(
                "token endpoint rejected client credentials ({status})"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RedditError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: AccessTokenResponse = resp.json().await?;
        if let Some(error) = body.error {
            return Err(RedditError::Auth(error));
        }
        let value = body
            .access_token
            .ok_or_else(|| RedditError::Auth("token response had no access_token".into()))?;
        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));

        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        Ok(value)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.access_token().await?;
        let resp = request.bearer_auth(token).send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED => {
                // Token revoked or expired early; the next call re-authenticates.
                self.token.lock().await.take();
                Err(RedditError::Auth(format!("bearer token rejected: {body}")))
            }
            StatusCode::FORBIDDEN => Err(RedditError::Forbidden(body)),
            StatusCode::TOO_MANY_REQUESTS => Err(RedditError::RateLimited(body)),
            _ => Err(RedditError::Api {
                status: status.as_u16(),
                message: body,
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.api_url, path);
        let resp = self.send(self.client.get(&url).query(query)).await?;
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The account the credentials belong to.
    pub async fn me(&self) -> Result<RedditUser> {
        self.get_json("/api/v1/me", &[]).await
    }

    /// Newest submissions in a subreddit, at most `limit` of them, from a
    /// single listing request.
    pub async fn new_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<RedditPost>> {
        let name = normalize_subreddit(subreddit);
        let limit = limit.clamp(1, MAX_LISTING_LIMIT);

        tracing::debug!(subreddit = name, limit, "Fetching newest posts");

        let listing: Listing<RedditPost> = self
            .get_json(
                &format!("/r/{name}/new"),
                &[("limit", limit.to_string()), ("raw_json", "1".to_string())],
            )
            .await?;

        let mut posts = listing.into_kind("t3");
        posts.truncate(limit as usize);
        Ok(posts)
    }

    /// Look up a submission by id. `None` when Reddit no longer knows it.
    pub async fn submission(&self, post_id: &str) -> Result<Option<RedditPost>> {
        let listing: Listing<RedditPost> = self
            .get_json("/api/info", &[("id", fullname(post_id)), ("raw_json", "1".to_string())])
            .await?;
        Ok(listing.into_kind("t3").into_iter().next())
    }

    /// Post a top-level comment. Returns the new comment's fullname when
    /// Reddit reports it.
    pub async fn reply(&self, post_id: &str, text: &str) -> Result<Option<String>> {
        let url = format!("{}/api/comment", self.api_url);
        let thing_id = fullname(post_id);
        let request = self.client.post(&url).form(&[
            ("api_type", "json"),
            ("thing_id", thing_id.as_str()),
            ("text", text),
        ]);

        let resp = self.send(request).await?;
        let body: CommentResponse = resp.json().await?;

        if let Some((code, message)) = body.json.first_error() {
            return Err(match code.as_str() {
                "RATELIMIT" => RedditError::RateLimited(message),
                code if REFUSAL_CODES.contains(&code) => {
                    RedditError::Forbidden(format!("{code}: {message}"))
                }
                _ => RedditError::Api {
                    status: 200,
                    message: format!("{code}: {message}"),
                },
            });
        }

        Ok(body
            .json
            .data
            .and_then(|d| d.things.into_iter().next())
            .and_then(|t| t.data.name))
    }
}

fn normalize_subreddit(name: &str) -> &str {
    let name = name.trim().trim_matches('/');
    name.strip_prefix("r/").unwrap_or(name)
}

fn fullname(post_id: &str) -> String {
    if post_id.starts_with("t3_") {
        post_id.to_string()
    } else {
        format!("t3_{post_id}")
    }
}
