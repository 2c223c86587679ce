use crate::reactions::TOP_REACTIONS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A single feed entry eligible for a reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Only trustworthy once a submission has been attempted
    pub locked: bool,
    pub reactions: Vec<Reaction>,
    pub reply: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_reactions(mut self, reactions: Vec<Reaction>) -> Self {
        self.reactions = reactions;
        self
    }
}

/// A community response with its popularity score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub text: String,
    pub score: i64,
}

impl Reaction {
    pub fn new(text: impl Into<String>, score: i64) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Why an item was given up on without a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ThreadLocked,
    Unclassified(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ThreadLocked => write!(f, "thread locked"),
            SkipReason::Unclassified(tag) => write!(f, "unclassified provider error {}", tag),
        }
    }
}

/// Result of pushing one reply through the submission retrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Success,
    /// Only returned when a rate-limit retry cap is configured and used up
    RateLimited(Duration),
    Terminal(SkipReason),
    FatalError(String),
}

impl RetryOutcome {
    /// Outcomes after which the item counts as handled and must be recorded
    pub fn is_resolved(&self) -> bool {
        matches!(self, RetryOutcome::Success | RetryOutcome::Terminal(_))
    }
}

/// Provider-reported classification of a failed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitErrorCategory {
    RateLimit,
    ThreadLocked,
    Other(String),
}

impl SubmitErrorCategory {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "RATELIMIT" => SubmitErrorCategory::RateLimit,
            "THREAD_LOCKED" => SubmitErrorCategory::ThreadLocked,
            other => SubmitErrorCategory::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            SubmitErrorCategory::RateLimit => "RATELIMIT",
            SubmitErrorCategory::ThreadLocked => "THREAD_LOCKED",
            SubmitErrorCategory::Other(tag) => tag,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("submission rejected ({}): {message}", .category.tag())]
    Classified {
        category: SubmitErrorCategory,
        message: String,
    },

    #[error("submission service unavailable: {0}")]
    Unavailable(String),
}

impl SubmitError {
    pub fn classified(category: SubmitErrorCategory, message: impl Into<String>) -> Self {
        SubmitError::Classified {
            category,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub dedup_log_path: PathBuf,
    pub batch_limit: usize,
    pub top_reactions: usize,
    pub rate_limit_backoff: Duration,
    pub cooldown: Duration,
    /// `None` keeps retrying a rate-limited submission forever
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            dedup_log_path: PathBuf::from("commented_posts.txt"),
            batch_limit: 500,
            top_reactions: TOP_REACTIONS,
            rate_limit_backoff: Duration::from_secs(600),
            cooldown: Duration::from_secs(600),
            max_rate_limit_retries: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub subreddit: String,
    pub auth_url: String,
    pub api_url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            user_agent: "reply-agent/0.1".to_string(),
            subreddit: "all".to_string(),
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            api_url: "https://oauth.reddit.com".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Reply generation failed: {0}")]
    Generation(String),

    #[error("Failed to persist dedup record to {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Identifier {0:?} cannot be stored in the dedup log")]
    InvalidIdentifier(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
