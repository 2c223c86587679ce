use anyhow::Context;
use clap::Parser;
use reply_agent::{
    AgentConfig, FileDedupStore, LlmConfig, OpenAiReplyGenerator, RedditClient, RedditConfig,
    ReplyPipeline,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Replies to trending posts once each, pacing itself between replies
#[derive(Debug, Parser)]
#[command(name = "reply-agent", version)]
struct Cli {
    #[arg(long, env = "REDDIT_CLIENT_ID")]
    client_id: String,

    #[arg(long, env = "REDDIT_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    #[arg(long, env = "REDDIT_USERNAME")]
    username: String,

    #[arg(long, env = "REDDIT_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long, env = "REDDIT_USER_AGENT")]
    user_agent: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Append-only log of items already handled
    #[arg(long, env = "REPLY_AGENT_LOG_FILE", default_value = "commented_posts.txt")]
    log_file: PathBuf,
}

impl Cli {
    fn reddit_config(&self) -> RedditConfig {
        let defaults = RedditConfig::default();
        RedditConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent.clone()),
            ..defaults
        }
    }

    fn llm_config(&self) -> LlmConfig {
        let defaults = LlmConfig::default();
        LlmConfig {
            api_key: self.api_key.clone(),
            api_base: self.api_base.clone().unwrap_or(defaults.api_base.clone()),
            model: self.model.clone().unwrap_or(defaults.model.clone()),
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    info!("Starting reply agent");

    let reddit = Arc::new(RedditClient::new(cli.reddit_config())?);
    reddit.login().await.context("failed to log in to Reddit")?;

    let generator = Arc::new(OpenAiReplyGenerator::new(cli.llm_config())?);
    let config = AgentConfig {
        dedup_log_path: cli.log_file.clone(),
        ..AgentConfig::default()
    };
    let store = Arc::new(FileDedupStore::new(config.dedup_log_path.clone()));

    let pipeline = ReplyPipeline::builder()
        .config(config)
        .feed(reddit.clone())
        .submitter(reddit)
        .generator(generator)
        .store(store)
        .build()?;

    match pipeline.run().await {
        Ok(report) => {
            info!("Run statistics:");
            info!("  candidates: {}", report.candidates);
            info!("  already seen: {}", report.already_seen);
            info!("  replied: {}", report.replied);
            info!("  skipped (locked): {}", report.skipped_locked);
            info!("  skipped (unclassified): {}", report.skipped_unclassified);
            info!("  generation failures: {}", report.generation_failures);
            info!("  comment load failures: {}", report.hydration_failures);
            Ok(())
        }
        Err(e) => {
            error!("Run aborted: {}", e);
            Err(e.into())
        }
    }
}
