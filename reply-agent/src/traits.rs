use crate::types::{Item, Result, SubmitError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

/// Source of candidate items (posts) to reply to
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Fetch up to `limit` items in the source's native ranking order
    async fn fetch_candidates(&self, limit: usize) -> Result<Vec<Item>>;

    /// Populate reactions for a lazily loaded item.
    /// Sources that fill reactions eagerly keep the default.
    async fn hydrate(&self, _item: &mut Item) -> Result<()> {
        Ok(())
    }
}

/// Posts a reply under an item
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, item_id: &str, reply_text: &str) -> std::result::Result<(), SubmitError>;
}

/// Blocking wait capability, swapped for a recording fake in tests
#[async_trait]
pub trait Waiter: Send + Sync {
    async fn wait(&self, duration: Duration);
}

/// Persisted set of already processed item ids
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// All recorded ids. Missing state is an empty set, not an error.
    async fn load(&self) -> Result<HashSet<String>>;

    /// Append an id; durable once this returns `Ok`
    async fn record(&self, id: &str) -> Result<()>;
}
