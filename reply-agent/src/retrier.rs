use crate::traits::{Submitter, Waiter};
use crate::types::{Item, RetryOutcome, SkipReason, SubmitError, SubmitErrorCategory};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Submits a reply, waiting out provider rate limits and resolving every
/// other failure into a returned outcome.
pub struct SubmissionRetrier {
    submitter: Arc<dyn Submitter>,
    waiter: Arc<dyn Waiter>,
    backoff: Duration,
    max_rate_limit_retries: Option<u32>,
}

impl SubmissionRetrier {
    pub fn new(submitter: Arc<dyn Submitter>, waiter: Arc<dyn Waiter>, backoff: Duration) -> Self {
        Self {
            submitter,
            waiter,
            backoff,
            max_rate_limit_retries: None,
        }
    }

    pub fn with_max_rate_limit_retries(mut self, max: Option<u32>) -> Self {
        self.max_rate_limit_retries = max;
        self
    }

    pub async fn submit(&self, item: &Item, reply_text: &str) -> RetryOutcome {
        let mut rate_limited = 0u32;

        loop {
            match self.submitter.submit(&item.id, reply_text).await {
                Ok(()) => {
                    info!("Replied to item {}", item.id);
                    return RetryOutcome::Success;
                }
                Err(SubmitError::Classified { category, message }) => match category {
                    SubmitErrorCategory::RateLimit => {
                        if let Some(max) = self.max_rate_limit_retries {
                            if rate_limited >= max {
                                warn!("Item {} still rate limited after {} retries, giving up for now", item.id, max);
                                return RetryOutcome::RateLimited(self.backoff);
                            }
                        }
                        rate_limited += 1;
                        warn!("Rate limited on item {} ({}), sleeping {:?}", item.id, message, self.backoff);
                        self.waiter.wait(self.backoff).await;
                    }
                    SubmitErrorCategory::ThreadLocked => {
                        info!("Item {} is locked, skipping", item.id);
                        return RetryOutcome::Terminal(SkipReason::ThreadLocked);
                    }
                    SubmitErrorCategory::Other(tag) => {
                        warn!("Submission for item {} failed with {}: {}", item.id, tag, message);
                        return RetryOutcome::Terminal(SkipReason::Unclassified(tag));
                    }
                },
                Err(SubmitError::Unavailable(cause)) => {
                    error!("Submission service unavailable while replying to {}: {}", item.id, cause);
                    return RetryOutcome::FatalError(cause);
                }
            }
        }
    }
}
