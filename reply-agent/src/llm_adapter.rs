use crate::reactions;
use crate::types::{AgentError, Item, LlmConfig, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

/// Trait for LLM adapters that turn a prompt into reply text
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Get the name of this adapter
    fn generator_name(&self) -> String;

    /// Generate a reply for the given system framing and user content
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Two-role prompt handed to a generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub user_prompt: String,
}

pub const SYSTEM_INSTRUCTION: &str = "You are a long-time member of an online discussion community who writes \
short, interesting comments that people like to upvote. You will be given a post and its most upvoted \
comments. Write a comment that fits in with the group: match their tone, share their general opinion and \
answer the way the other commenters do.";

/// Build the prompt for one item from its title, body and top reactions
pub fn build_request(item: &Item, top_k: usize) -> GenerationRequest {
    let top = reactions::select(&item.reactions, top_k);
    let user_prompt = format!(
        "The post is titled: {}. Its text content is: {}. The most upvoted comments are: {}. \
Write one comment that fits in with these and would earn upvotes. Use the same tone as the other comments, \
with short phrases and simple words, and do not be verbose. Reply with a single short natural sentence that \
mirrors their mood. Do not sound overly simple, cheerful or friendly; make it a little interesting. Never be \
aggressive or offensive. Respond with the comment text only and nothing else.",
        item.title, item.body, top
    );

    GenerationRequest {
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        user_prompt,
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Generator backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiReplyGenerator {
    client: Client,
    config: LlmConfig,
}

impl OpenAiReplyGenerator {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiReplyGenerator {
    fn generator_name(&self) -> String {
        format!("OpenAI-compatible ({})", self.config.model)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
        };

        debug!("Requesting completion from {}", self.endpoint());
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AgentError::Generation(format!("HTTP {}: {}", status, detail)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Generation(e.to_string()))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(AgentError::Generation("model returned an empty reply".to_string()));
        }

        info!("Generated reply ({} chars)", text.len());
        Ok(text)
    }
}

/// Mock generator for development and testing. Serves scripted replies in
/// order, falling back to a fixed reply, and keeps every request it saw.
pub struct MockReplyGenerator {
    name: String,
    default_reply: Option<String>,
    scripted: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockReplyGenerator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_reply: Some("same energy as the top comment tbh".to_string()),
            scripted: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Every request fails unless a scripted response says otherwise
    pub fn failing(mut self) -> Self {
        self.default_reply = None;
        self
    }

    pub fn push_response(&self, response: Result<String>) {
        if let Ok(mut scripted) = self.scripted.lock() {
            scripted.push_back(response);
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReplyGenerator for MockReplyGenerator {
    fn generator_name(&self) -> String {
        format!("Mock generator ({})", self.name)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let scripted = self
            .scripted
            .lock()
            .ok()
            .and_then(|mut scripted| scripted.pop_front());
        if let Some(response) = scripted {
            return response;
        }

        self.default_reply
            .clone()
            .ok_or_else(|| AgentError::Generation(format!("{} is configured to fail", self.name)))
    }
}
