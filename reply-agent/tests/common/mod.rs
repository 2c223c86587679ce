#![allow(dead_code)]

use async_trait::async_trait;
use reply_agent::{AgentError, DedupStore, FeedSource, Item, Result, SubmitError, Submitter};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Feed that serves a fixed batch of eagerly populated items
pub struct StaticFeed {
    items: Vec<Item>,
    hydrate_failures: HashSet<String>,
    auth_expired: bool,
}

impl StaticFeed {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            hydrate_failures: HashSet::new(),
            auth_expired: false,
        }
    }

    /// Every reaction lookup is rejected as unauthenticated
    pub fn with_expired_auth(mut self) -> Self {
        self.auth_expired = true;
        self
    }

    pub fn failing_hydration_for(mut self, id: &str) -> Self {
        self.hydrate_failures.insert(id.to_string());
        self
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    fn source_name(&self) -> String {
        "static test feed".to_string()
    }

    async fn fetch_candidates(&self, limit: usize) -> Result<Vec<Item>> {
        Ok(self.items.iter().take(limit).cloned().collect())
    }

    async fn hydrate(&self, item: &mut Item) -> Result<()> {
        if self.auth_expired {
            return Err(AgentError::Auth(format!("HTTP 401 Unauthorized for /comments/{}", item.id)));
        }
        if self.hydrate_failures.contains(&item.id) {
            return Err(AgentError::Feed(format!("comments for {} unavailable", item.id)));
        }
        Ok(())
    }
}

/// Submitter that plays back scripted results, then succeeds
#[derive(Default)]
pub struct ScriptedSubmitter {
    script: Mutex<VecDeque<std::result::Result<(), SubmitError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, result: std::result::Result<(), SubmitError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, item_id: &str) -> usize {
        self.calls().iter().filter(|(id, _)| id == item_id).count()
    }
}

#[async_trait]
impl Submitter for ScriptedSubmitter {
    async fn submit(&self, item_id: &str, reply_text: &str) -> std::result::Result<(), SubmitError> {
        self.calls
            .lock()
            .unwrap()
            .push((item_id.to_string(), reply_text.to_string()));
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Store whose writes always fail
pub struct BrokenStore {
    pub existing: HashSet<String>,
}

#[async_trait]
impl DedupStore for BrokenStore {
    async fn load(&self) -> Result<HashSet<String>> {
        Ok(self.existing.clone())
    }

    async fn record(&self, _id: &str) -> Result<()> {
        Err(AgentError::Persistence {
            path: "unwritable.txt".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only filesystem"),
        })
    }
}
