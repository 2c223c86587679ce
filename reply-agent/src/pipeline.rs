use crate::llm_adapter::{self, ReplyGenerator};
use crate::retrier::SubmissionRetrier;
use crate::throttle::{Throttler, TokioWaiter};
use crate::traits::{DedupStore, FeedSource, Submitter, Waiter};
use crate::types::{AgentConfig, AgentError, Item, Result, RetryOutcome, SkipReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Counters for one pass over a candidate batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub candidates: usize,
    pub already_seen: usize,
    pub hydration_failures: usize,
    pub generation_failures: usize,
    pub replied: usize,
    pub skipped_locked: usize,
    pub skipped_unclassified: usize,
    pub rate_limit_exhausted: usize,
}

impl RunReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            candidates: 0,
            already_seen: 0,
            hydration_failures: 0,
            generation_failures: 0,
            replied: 0,
            skipped_locked: 0,
            skipped_unclassified: 0,
            rate_limit_exhausted: 0,
        }
    }

    /// Items that got a dedup record this run
    pub fn recorded(&self) -> usize {
        self.replied + self.skipped_locked + self.skipped_unclassified
    }
}

/// Per-item dedup, generate, submit, record and cool-down loop
pub struct ReplyPipeline {
    config: AgentConfig,
    feed: Arc<dyn FeedSource>,
    generator: Arc<dyn ReplyGenerator>,
    store: Arc<dyn DedupStore>,
    retrier: SubmissionRetrier,
    throttler: Throttler,
}

impl ReplyPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Process one bounded batch of candidates from the feed.
    /// Only persistence failures and an unavailable feed or submission
    /// service end the run early; everything else is contained per item.
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::new();
        let mut seen = self.store.load().await?;
        info!("Loaded {} previously handled items", seen.len());

        let candidates = self.feed.fetch_candidates(self.config.batch_limit).await?;
        report.candidates = candidates.len();
        info!(
            "Fetched {} candidates from {}",
            candidates.len(),
            self.feed.source_name()
        );

        for item in candidates {
            self.process_item(item, &mut seen, &mut report).await?;
        }

        report.finished_at = Some(Utc::now());
        info!(
            "Run finished: {} replied, {} locked, {} unclassified, {} already seen",
            report.replied, report.skipped_locked, report.skipped_unclassified, report.already_seen
        );
        Ok(report)
    }

    async fn process_item(
        &self,
        mut item: Item,
        seen: &mut HashSet<String>,
        report: &mut RunReport,
    ) -> Result<()> {
        if seen.contains(&item.id) {
            debug!("Skipping already handled item {}", item.id);
            report.already_seen += 1;
            return Ok(());
        }

        match self.feed.hydrate(&mut item).await {
            Ok(()) => {}
            Err(e @ (AgentError::Auth(_) | AgentError::Unavailable(_))) => {
                error!("Feed unavailable while loading item {}: {}", item.id, e);
                return Err(e);
            }
            Err(e) => {
                warn!("Could not load reactions for item {}: {}", item.id, e);
                report.hydration_failures += 1;
                return Ok(());
            }
        }

        let request = llm_adapter::build_request(&item, self.config.top_reactions);
        let reply = match self.generator.generate(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Reply generation failed for item {}: {}", item.id, e);
                report.generation_failures += 1;
                return Ok(());
            }
        };
        item.reply = Some(reply);
        let reply = item.reply.as_deref().unwrap_or_default();

        let outcome = self.retrier.submit(&item, reply).await;
        match &outcome {
            RetryOutcome::Success => {
                info!("Replied to '{}' with '{}'", item.title, reply);
                report.replied += 1;
            }
            RetryOutcome::Terminal(SkipReason::ThreadLocked) => {
                item.locked = true;
                report.skipped_locked += 1;
            }
            RetryOutcome::Terminal(SkipReason::Unclassified(_)) => {
                report.skipped_unclassified += 1;
            }
            RetryOutcome::RateLimited(_) => {
                report.rate_limit_exhausted += 1;
            }
            RetryOutcome::FatalError(cause) => {
                error!("Stopping run at item {}", item.id);
                return Err(AgentError::Unavailable(cause.clone()));
            }
        }

        if outcome.is_resolved() {
            if let Err(e) = self.store.record(&item.id).await {
                error!("Could not record item {}: {}", item.id, e);
                return Err(e);
            }
            seen.insert(item.id.clone());
        }

        self.throttler.cooldown().await;
        Ok(())
    }
}

/// Pipeline builder for easier configuration
pub struct PipelineBuilder {
    config: AgentConfig,
    feed: Option<Arc<dyn FeedSource>>,
    generator: Option<Arc<dyn ReplyGenerator>>,
    store: Option<Arc<dyn DedupStore>>,
    submitter: Option<Arc<dyn Submitter>>,
    waiter: Option<Arc<dyn Waiter>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: AgentConfig::default(),
            feed: None,
            generator: None,
            store: None,
            submitter: None,
            waiter: None,
        }
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn feed(mut self, feed: Arc<dyn FeedSource>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn ReplyGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn store(mut self, store: Arc<dyn DedupStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn submitter(mut self, submitter: Arc<dyn Submitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Defaults to real sleeping when not set
    pub fn waiter(mut self, waiter: Arc<dyn Waiter>) -> Self {
        self.waiter = Some(waiter);
        self
    }

    pub fn build(self) -> Result<ReplyPipeline> {
        let missing = |what: &str| AgentError::General(format!("pipeline needs a {}", what));

        let feed = self.feed.ok_or_else(|| missing("feed source"))?;
        let generator = self.generator.ok_or_else(|| missing("reply generator"))?;
        let store = self.store.ok_or_else(|| missing("dedup store"))?;
        let submitter = self.submitter.ok_or_else(|| missing("submitter"))?;
        let waiter = self
            .waiter
            .unwrap_or_else(|| Arc::new(TokioWaiter) as Arc<dyn Waiter>);

        let retrier = SubmissionRetrier::new(submitter, waiter.clone(), self.config.rate_limit_backoff)
            .with_max_rate_limit_retries(self.config.max_rate_limit_retries);
        let throttler = Throttler::new(waiter, self.config.cooldown);

        info!("Built reply pipeline using {}", generator.generator_name());
        Ok(ReplyPipeline {
            config: self.config,
            feed,
            generator,
            store,
            retrier,
            throttler,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
