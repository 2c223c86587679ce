use crate::traits::{FeedSource, Submitter};
use crate::types::{AgentError, Item, Reaction, RedditConfig, Result, SubmitError, SubmitErrorCategory};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

const PAGE_SIZE: usize = 100;

/// Tokens are renewed this long before they actually expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Identity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    after: Option<String>,
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    data: PostData,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    locked: bool,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Option<Instant>,
}

impl AccessToken {
    fn new(value: String, expires_in: Option<u64>, issued_at: Instant) -> Self {
        Self {
            value,
            expires_at: expires_in.map(|secs| issued_at + Duration::from_secs(secs)),
        }
    }

    fn needs_refresh(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now + TOKEN_REFRESH_MARGIN >= expires_at,
            None => false,
        }
    }
}

/// Reddit OAuth client: hot listing as the feed, comments as reactions,
/// and comment submission. The access token is renewed when it is about to
/// expire and once more whenever the API answers 401.
pub struct RedditClient {
    client: Client,
    config: RedditConfig,
    access_token: RwLock<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            config,
            access_token: RwLock::new(None),
        })
    }

    /// Password-grant login followed by an identity check
    pub async fn login(&self) -> Result<String> {
        self.authenticate().await?;

        let me: Identity = self.get_json(self.api_url("/api/v1/me")?).await?;
        info!("Logged in as {}", me.name);
        Ok(me.name)
    }

    async fn authenticate(&self) -> Result<String> {
        let issued_at = Instant::now();
        let response = self
            .client
            .post(&self.config.auth_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AgentError::Auth(format!("token endpoint returned {}", response.status())));
        }

        let token: TokenResponse = response.json().await?;
        let value = match (token.access_token, token.error) {
            (Some(access_token), _) => access_token,
            (None, Some(error)) => return Err(AgentError::Auth(error)),
            (None, None) => return Err(AgentError::Auth("no access token in response".to_string())),
        };

        debug!("Obtained access token valid for {:?}s", token.expires_in);
        *self.access_token.write().await = Some(AccessToken::new(value.clone(), token.expires_in, issued_at));
        Ok(value)
    }

    fn api_url(&self, path: &str) -> Result<Url> {
        let base = Url::parse(&self.config.api_url)?;
        Ok(base.join(path)?)
    }

    fn hot_page_url(&self, page_size: usize, after: Option<&str>) -> Result<Url> {
        let mut url = self.api_url(&format!("/r/{}/hot", self.config.subreddit))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &page_size.to_string());
            query.append_pair("raw_json", "1");
            if let Some(after) = after {
                query.append_pair("after", after);
            }
        }
        Ok(url)
    }

    /// Current token, renewed first if it is close to expiring
    async fn bearer(&self) -> Result<String> {
        let current = self.access_token.read().await.clone();
        match current {
            None => Err(AgentError::Auth("not logged in".to_string())),
            Some(token) if token.needs_refresh(Instant::now()) => {
                info!("Access token about to expire, logging in again");
                self.authenticate().await
            }
            Some(token) => Ok(token.value),
        }
    }

    /// GET with exponential backoff on transport errors and 5xx/429 replies.
    /// A 401 triggers one fresh login before the request is given up on.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let mut token = self.bearer().await?;
        let mut reauthenticated = false;
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error = None;
        let mut attempt = 0;
        while attempt <= self.config.max_retries {
            debug!("GET {} (attempt {})", url, attempt + 1);
            let error = match self.client.get(url.clone()).bearer_auth(&token).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response.json().await?);
                    }
                    if status == StatusCode::UNAUTHORIZED {
                        if reauthenticated {
                            return Err(AgentError::Auth(format!("HTTP {} for {}", status, url)));
                        }
                        warn!("Access token rejected for {}, logging in again", url);
                        token = self.authenticate().await?;
                        reauthenticated = true;
                        continue;
                    }
                    if !status.is_server_error() && status != StatusCode::TOO_MANY_REQUESTS {
                        return Err(AgentError::Feed(format!("HTTP {} for {}", status, url)));
                    }
                    AgentError::Feed(format!("HTTP {} for {}", status, url))
                }
                Err(e) => AgentError::Http(e),
            };

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}: {}, retrying in {:?}", attempt + 1, url, error, delay);
                    last_error = Some(error);
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            last_error = Some(error);
            break;
        }

        Err(last_error.unwrap_or_else(|| AgentError::Feed(format!("giving up on {}", url))))
    }

    async fn post_comment(&self, token: &str, thing_id: &str, reply_text: &str) -> std::result::Result<reqwest::Response, SubmitError> {
        let url = self
            .api_url("/api/comment")
            .map_err(|e| SubmitError::Unavailable(e.to_string()))?;

        self.client
            .post(url)
            .bearer_auth(token)
            .form(&[("api_type", "json"), ("thing_id", thing_id), ("text", reply_text)])
            .send()
            .await
            .map_err(|e| SubmitError::Unavailable(e.to_string()))
    }
}

fn page_size(limit: usize, fetched: usize) -> usize {
    PAGE_SIZE.min(limit.saturating_sub(fetched))
}

/// Append one hot-listing page to `items`, capped at `limit`, and return the
/// cursor of the next page when more should be fetched.
fn absorb_page(items: &mut Vec<Item>, listing: Listing, limit: usize) -> Option<String> {
    if listing.data.children.is_empty() {
        return None;
    }

    items.extend(listing.data.children.into_iter().map(|thing| Item {
        id: thing.data.id,
        title: thing.data.title,
        body: thing.data.selftext,
        locked: thing.data.locked,
        ..Default::default()
    }));
    items.truncate(limit);

    if items.len() < limit {
        listing.data.after
    } else {
        None
    }
}

/// Flatten a comment tree depth-first, dropping "load more" stubs
pub fn flatten_comments(listing: &Value, out: &mut Vec<Reaction>) {
    let children = listing
        .pointer("/data/children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for child in children {
        if child.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let Some(data) = child.get("data") else {
            continue;
        };
        if let Some(body) = data.get("body").and_then(Value::as_str) {
            let score = data.get("score").and_then(Value::as_i64).unwrap_or(0);
            out.push(Reaction::new(body, score));
        }
        // "replies" is an empty string when there are none
        if let Some(replies) = data.get("replies").filter(|r| r.is_object()) {
            flatten_comments(replies, out);
        }
    }
}

/// Map a `/api/comment` body with `api_type=json` to a submission result
pub fn classify_comment_response(body: &Value) -> std::result::Result<(), SubmitError> {
    let first_error = body
        .pointer("/json/errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(Value::as_array);

    match first_error {
        None => Ok(()),
        Some(error) => {
            let tag = error.first().and_then(Value::as_str).unwrap_or("UNKNOWN");
            let message = error.get(1).and_then(Value::as_str).unwrap_or_default();
            Err(SubmitError::classified(SubmitErrorCategory::from_tag(tag), message))
        }
    }
}

#[async_trait]
impl FeedSource for RedditClient {
    fn source_name(&self) -> String {
        format!("r/{} hot", self.config.subreddit)
    }

    async fn fetch_candidates(&self, limit: usize) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        while items.len() < limit {
            let url = self.hot_page_url(page_size(limit, items.len()), after.as_deref())?;
            let listing: Listing = self.get_json(url).await?;
            match absorb_page(&mut items, listing, limit) {
                Some(next) => after = Some(next),
                None => break,
            }
        }

        info!("Fetched {} trending posts", items.len());
        Ok(items)
    }

    async fn hydrate(&self, item: &mut Item) -> Result<()> {
        let mut url = self.api_url(&format!("/comments/{}", item.id))?;
        url.query_pairs_mut().append_pair("raw_json", "1");

        // [post listing, comment listing]
        let pages: Vec<Value> = self.get_json(url).await?;
        let mut reactions = Vec::new();
        if let Some(comments) = pages.get(1) {
            flatten_comments(comments, &mut reactions);
        }

        debug!("Loaded {} comments for {}", reactions.len(), item.id);
        item.reactions = reactions;
        Ok(())
    }
}

#[async_trait]
impl Submitter for RedditClient {
    async fn submit(&self, item_id: &str, reply_text: &str) -> std::result::Result<(), SubmitError> {
        let token = self
            .bearer()
            .await
            .map_err(|e| SubmitError::Unavailable(e.to_string()))?;
        let thing_id = format!("t3_{}", item_id);

        let mut response = self.post_comment(&token, &thing_id, reply_text).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Access token rejected while replying to {}, logging in again", item_id);
            let token = self
                .authenticate()
                .await
                .map_err(|e| SubmitError::Unavailable(e.to_string()))?;
            response = self.post_comment(&token, &thing_id, reply_text).await?;
        }

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SubmitError::classified(SubmitErrorCategory::RateLimit, "HTTP 429"));
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(SubmitError::Unavailable("access token rejected".to_string()));
        }
        if !status.is_success() {
            return Err(SubmitError::classified(
                SubmitErrorCategory::Other(format!("HTTP_{}", status.as_u16())),
                status.canonical_reason().unwrap_or("Unknown"),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SubmitError::classified(SubmitErrorCategory::Other("BAD_RESPONSE".to_string()), e.to_string()))?;
        classify_comment_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_comments_and_skips_more_stubs() {
        let listing = json!({
            "data": { "children": [
                { "kind": "t1", "data": { "body": "top", "score": 10, "replies": {
                    "data": { "children": [
                        { "kind": "t1", "data": { "body": "nested", "score": 3, "replies": "" } },
                        { "kind": "more", "data": { "count": 12 } }
                    ]}
                }}},
                { "kind": "t1", "data": { "body": "second", "score": -2, "replies": "" } }
            ]}
        });

        let mut out = Vec::new();
        flatten_comments(&listing, &mut out);

        assert_eq!(
            out,
            vec![
                Reaction::new("top", 10),
                Reaction::new("nested", 3),
                Reaction::new("second", -2),
            ]
        );
    }

    #[test]
    fn classifies_provider_error_tags() {
        let ok = json!({ "json": { "errors": [], "data": {} } });
        assert!(classify_comment_response(&ok).is_ok());

        let limited = json!({ "json": { "errors": [["RATELIMIT", "try again in 9 minutes", "ratelimit"]] } });
        match classify_comment_response(&limited) {
            Err(SubmitError::Classified { category, .. }) => assert_eq!(category, SubmitErrorCategory::RateLimit),
            other => panic!("unexpected result: {:?}", other),
        }

        let locked = json!({ "json": { "errors": [["THREAD_LOCKED", "that thread is locked", "parent"]] } });
        match classify_comment_response(&locked) {
            Err(SubmitError::Classified { category, .. }) => assert_eq!(category, SubmitErrorCategory::ThreadLocked),
            other => panic!("unexpected result: {:?}", other),
        }

        let other = json!({ "json": { "errors": [["TOO_OLD", "that's too old", "parent"]] } });
        match classify_comment_response(&other) {
            Err(SubmitError::Classified { category, .. }) => {
                assert_eq!(category, SubmitErrorCategory::Other("TOO_OLD".to_string()))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    fn listing(ids: &[&str], after: Option<&str>) -> Listing {
        let children: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "kind": "t3", "data": { "id": id, "title": format!("post {}", id), "selftext": "", "locked": false } }))
            .collect();
        serde_json::from_value(json!({ "data": { "after": after, "children": children } })).unwrap()
    }

    #[test]
    fn page_size_never_exceeds_remaining_budget() {
        assert_eq!(page_size(500, 0), 100);
        assert_eq!(page_size(500, 450), 50);
        assert_eq!(page_size(150, 100), 50);
        assert_eq!(page_size(10, 10), 0);
    }

    #[test]
    fn absorbs_pages_until_limit_then_stops() {
        let mut items = Vec::new();

        let next = absorb_page(&mut items, listing(&["a", "b"], Some("t3_b")), 3);
        assert_eq!(next.as_deref(), Some("t3_b"));
        assert_eq!(items.len(), 2);

        // Second page overshoots the limit and is cut back
        let next = absorb_page(&mut items, listing(&["c", "d"], Some("t3_d")), 3);
        assert_eq!(next, None);
        let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(items[2].title, "post c");
    }

    #[test]
    fn stops_on_missing_cursor_or_empty_page() {
        let mut items = Vec::new();
        assert_eq!(absorb_page(&mut items, listing(&["a"], None), 500), None);
        assert_eq!(items.len(), 1);

        let mut items = Vec::new();
        assert_eq!(absorb_page(&mut items, listing(&[], Some("t3_z")), 500), None);
        assert!(items.is_empty());
    }

    #[test]
    fn hot_page_url_carries_limit_and_cursor() {
        let client = RedditClient::new(RedditConfig {
            subreddit: "rust".to_string(),
            ..RedditConfig::default()
        })
        .unwrap();

        let first = client.hot_page_url(100, None).unwrap();
        assert_eq!(first.path(), "/r/rust/hot");
        assert_eq!(first.query(), Some("limit=100&raw_json=1"));

        let next = client.hot_page_url(25, Some("t3_abc")).unwrap();
        assert_eq!(next.query(), Some("limit=25&raw_json=1&after=t3_abc"));
    }

    #[test]
    fn token_is_refreshed_before_expiry() {
        let issued = Instant::now();
        let token = AccessToken::new("secret".to_string(), Some(3600), issued);

        assert!(!token.needs_refresh(issued));
        assert!(!token.needs_refresh(issued + Duration::from_secs(3000)));
        assert!(token.needs_refresh(issued + Duration::from_secs(3500)));
        assert!(token.needs_refresh(issued + Duration::from_secs(4000)));

        let no_expiry = AccessToken::new("secret".to_string(), None, issued);
        assert!(!no_expiry.needs_refresh(issued + Duration::from_secs(100_000)));
    }
}
