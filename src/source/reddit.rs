//! Reddit post source over the OAuth JSON API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{PostSource, SourceError, TimeFilter};
use crate::types::{ConfigError, RawPost, DELETED_AUTHOR};

/// Refresh the token this long before the server says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Script-app credentials for the password grant.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Searches subreddits and loads each match's comment thread.
pub struct RedditClient {
    client: Client,
    credentials: RedditCredentials,
    auth_url: String,
    api_url: String,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

/// Fields of a `t3` (link) thing that the pipeline needs.
#[derive(Debug, Deserialize)]
struct LinkData {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    author: Option<String>,
    subreddit: String,
    subreddit_id: String,
    created_utc: f64,
    #[serde(default)]
    selftext: String,
}

impl RedditClient {
    /// Create a new client.
    pub fn new(
        credentials: RedditCredentials,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Client {
                client: "reddit",
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            credentials,
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            api_url: "https://oauth.reddit.com".to_string(),
            token: Mutex::new(None),
        })
    }

    /// Override the OAuth and API endpoints.
    pub fn with_endpoints(mut self, auth_url: &str, api_url: &str) -> Self {
        self.auth_url = auth_url.to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Return a valid bearer token, fetching a new one when needed.
    async fn bearer_token(&self) -> Result<String, SourceError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(&self.auth_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth(format!("{status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        info!(expires_in = token.expires_in, "Obtained Reddit access token");

        let value = token.access_token;
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    /// GET a JSON document. A rejected token is refreshed and the request
    /// retried once.
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, SourceError> {
        let mut refreshed = false;
        loop {
            let token = self.bearer_token().await?;
            let response = self
                .client
                .get(url)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                *self.token.lock().await = None;
                if !refreshed {
                    debug!(url, "Access token rejected, refreshing");
                    refreshed = true;
                    continue;
                }
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(SourceError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            return Ok(response.json().await?);
        }
    }

    /// Load every comment body of a post, depth-first.
    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<String>, SourceError> {
        let url = format!("{}/comments/{}", self.api_url, post_id);
        let body = self.get_json(&url, &[("raw_json", "1".to_string())]).await?;

        // The response is [link listing, comment listing].
        let listing = body
            .get(1)
            .ok_or_else(|| SourceError::Malformed(format!("no comment listing for {post_id}")))?;
        let mut comments = Vec::new();
        flatten_comments(listing, &mut comments);
        Ok(comments)
    }
}

#[async_trait]
impl PostSource for RedditClient {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn search(
        &self,
        forum: &str,
        term: &str,
        time_filter: TimeFilter,
        limit: usize,
    ) -> Result<Vec<RawPost>, SourceError> {
        let url = format!("{}/r/{}/search", self.api_url, forum);
        let body = self
            .get_json(
                &url,
                &[
                    ("q", term.to_string()),
                    ("restrict_sr", "1".to_string()),
                    ("syntax", "plain".to_string()),
                    ("t", time_filter.as_str().to_string()),
                    ("limit", limit.to_string()),
                    ("raw_json", "1".to_string()),
                ],
            )
            .await?;

        let links = parse_links(&body)?;
        debug!(forum, term, matches = links.len(), "Search returned");

        let mut posts = Vec::with_capacity(links.len().min(limit));
        for link in links.into_iter().take(limit) {
            let comments = self.fetch_comments(&link.id).await?;
            posts.push(link.into_post(comments));
        }
        Ok(posts)
    }
}

impl LinkData {
    fn into_post(self, comments: Vec<String>) -> RawPost {
        RawPost {
            id: self.id,
            title: self.title,
            score: self.score,
            num_comments: self.num_comments,
            author: self.author.unwrap_or_else(|| DELETED_AUTHOR.to_string()),
            forum: self.subreddit,
            forum_id: self.subreddit_id,
            created_utc: self.created_utc,
            selftext: self.selftext,
            comments,
        }
    }
}

/// Extract `t3` things from a search listing.
fn parse_links(listing: &Value) -> Result<Vec<LinkData>, SourceError> {
    let children = listing
        .pointer("/data/children")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Malformed("search listing has no children".to_string()))?;

    children
        .iter()
        .filter(|child| child.get("kind").and_then(Value::as_str) == Some("t3"))
        .map(|child| {
            let data = child.get("data").cloned().unwrap_or(Value::Null);
            serde_json::from_value(data).map_err(|e| SourceError::Malformed(e.to_string()))
        })
        .collect()
}

/// Collect comment bodies from a listing, recursing into replies.
///
/// Only `t1` things are comments; `more` placeholders are skipped.
fn flatten_comments(listing: &Value, out: &mut Vec<String>) {
    let Some(children) = listing.pointer("/data/children").and_then(Value::as_array) else {
        return;
    };

    for child in children {
        if child.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let Some(data) = child.get("data") else {
            continue;
        };
        if let Some(body) = data.get("body").and_then(Value::as_str) {
            out.push(body.to_string());
        }
        // `replies` is "" when there are none
        if let Some(replies) = data.get("replies").filter(|r| r.is_object()) {
            flatten_comments(replies, out);
        }
    }
}
