use crate::traits::DedupStore;
use crate::types::{AgentError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Dedup store backed by an append-only text log, one id per line
pub struct FileDedupStore {
    path: PathBuf,
    // Serializes appends so lines never interleave
    write_lock: Mutex<()>,
}

impl FileDedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DedupStore for FileDedupStore {
    async fn load(&self) -> Result<HashSet<String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No dedup log at {}, starting fresh", self.path.display());
                return Ok(HashSet::new());
            }
            Err(e) => return Err(AgentError::Io(e)),
        };

        let ids: HashSet<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        debug!("Loaded {} recorded ids from {}", ids.len(), self.path.display());
        Ok(ids)
    }

    async fn record(&self, id: &str) -> Result<()> {
        if id.is_empty() || id.trim() != id || id.contains(['\n', '\r']) {
            return Err(AgentError::InvalidIdentifier(id.to_string()));
        }

        let _guard = self.write_lock.lock().await;
        let persistence = |source| AgentError::Persistence {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(persistence)?;
        file.write_all(format!("{}\n", id).as_bytes())
            .await
            .map_err(persistence)?;
        file.flush().await.map_err(persistence)?;
        file.sync_data().await.map_err(persistence)?;

        debug!("Recorded {} in {}", id, self.path.display());
        Ok(())
    }
}
