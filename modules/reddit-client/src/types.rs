use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Script-app credentials for the password grant.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

// --- OAuth ---

/// Body of `/api/v1/access_token`. Reddit answers bad credentials with a 200
/// and an `error` field, so every field is optional.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccessTokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
    pub error: Option<String>,
}

// --- Listings ---

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ListingData<T> {
    pub children: Vec<Thing<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Thing<T> {
    pub kind: String,
    pub data: T,
}

impl<T> Listing<T> {
    /// Children of the given kind (`t3` = link/post, `t1` = comment).
    pub fn into_kind(self, kind: &str) -> Vec<T> {
        self.data
            .children
            .into_iter()
            .filter(|thing| thing.kind == kind)
            .map(|thing| thing.data)
            .collect()
    }
}

/// A submission (`t3`) as returned by listing and info endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RedditPost {
    /// Base-36 id without the `t3_` prefix.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub author: Option<String>,
    pub subreddit: String,
    pub permalink: String,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub archived: bool,
    pub removed_by_category: Option<String>,
}

impl RedditPost {
    pub fn url(&self) -> String {
        format!("https://www.reddit.com{}", self.permalink)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_utc as i64, 0)
    }

    /// Why a new top-level comment would be refused, if it would be.
    pub fn closed_reason(&self) -> Option<&'static str> {
        if self.removed_by_category.is_some() {
            Some("removed")
        } else if self.locked {
            Some("locked")
        } else if self.archived {
            Some("archived")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditUser {
    pub name: String,
}

// --- Comment submission ---

/// Body of `POST /api/comment` with `api_type=json`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommentResponse {
    pub json: CommentJson,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommentJson {
    /// Each entry is `[code, message, field]`.
    #[serde(default)]
    pub errors: Vec<Vec<serde_json::Value>>,
    pub data: Option<CommentData>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommentData {
    #[serde(default)]
    pub things: Vec<Thing<CreatedComment>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreatedComment {
    pub name: Option<String>,
}

impl CommentJson {
    /// First error code and message, if Reddit rejected the comment.
    pub fn first_error(&self) -> Option<(String, String)> {
        let entry = self.errors.first()?;
        let code = entry.first().and_then(|v| v.as_str()).unwrap_or("UNKNOWN");
        let message = entry.get(1).and_then(|v| v.as_str()).unwrap_or_default();
        Some((code.to_string(), message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_keeps_only_requested_kind() {
        let listing: Listing<serde_json::Value> = serde_json::from_value(serde_json::json!({
            "kind": "Listing",
            "data": {"children": [
                {"kind": "t3", "data": {"id": "a"}},
                {"kind": "t1", "data": {"id": "b"}}
            ]}
        }))
        .unwrap();
        let posts = listing.into_kind("t3");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["id"], "a");
    }

    #[test]
    fn closed_reason_prefers_removed_then_locked() {
        let mut post: RedditPost = serde_json::from_value(serde_json::json!({
            "id": "abc123",
            "title": "Looking for an illustrator",
            "subreddit": "HireAnArtist",
            "permalink": "/r/HireAnArtist/comments/abc123/looking/",
            "created_utc": 1_700_000_000.0
        }))
        .unwrap();
        assert_eq!(post.closed_reason(), None);
        assert_eq!(
            post.url(),
            "https://www.reddit.com/r/HireAnArtist/comments/abc123/looking/"
        );
        assert!(post.created_at().is_some());

        post.locked = true;
        assert_eq!(post.closed_reason(), Some("locked"));
        post.removed_by_category = Some("moderator".into());
        assert_eq!(post.closed_reason(), Some("removed"));
    }

    #[test]
    fn comment_errors_are_extracted() {
        let json: CommentJson = serde_json::from_value(serde_json::json!({
            "errors": [["RATELIMIT", "you are doing that too much", "ratelimit"]]
        }))
        .unwrap();
        assert_eq!(
            json.first_error(),
            Some(("RATELIMIT".into(), "you are doing that too much".into()))
        );
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let creds = Credentials {
            client_id: "id".into(),
            client_secret: "shh".into(),
            username: "bot".into(),
            password: "hunter2".into(),
            user_agent: "ua".into(),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("shh"));
        assert!(!debug.contains("hunter2"));
    }
}
