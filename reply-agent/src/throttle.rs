use crate::traits::Waiter;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// Waits for real on the tokio timer
#[derive(Debug, Default, Clone)]
pub struct TokioWaiter;

#[async_trait]
impl Waiter for TokioWaiter {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fake waiter that returns immediately and remembers what it was asked for
#[derive(Debug, Default)]
pub struct RecordingWaiter {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn total_waited(&self) -> Duration {
        self.waits().iter().sum()
    }
}

#[async_trait]
impl Waiter for RecordingWaiter {
    async fn wait(&self, duration: Duration) {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
    }
}

/// Fixed pacing between processed items, separate from rate-limit backoff
pub struct Throttler {
    waiter: Arc<dyn Waiter>,
    interval: Duration,
}

impl Throttler {
    pub fn new(waiter: Arc<dyn Waiter>, interval: Duration) -> Self {
        Self { waiter, interval }
    }

    pub async fn cooldown(&self) {
        info!("Going to sleep for {:?} before the next item", self.interval);
        self.waiter.wait(self.interval).await;
        info!("Cool-down complete, moving on");
    }
}
