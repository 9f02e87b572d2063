use std::path::PathBuf;

use futures::future::BoxFuture;
use tracing::debug;

use marketmate_core::error::{MarketError, Result};
use marketmate_core::traits::SnapshotStore;
use marketmate_core::types::Snapshot;

/// One pretty-printed JSON file per key under a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SnapshotStore for JsonFileStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Snapshot>>> {
        let path = self.path_for(key);

        Box::pin(async move {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    return Err(MarketError::Storage(format!(
                        "read {}: {}",
                        path.display(),
                        e
                    )))
                }
            };

            let snapshot = serde_json::from_str(&content).map_err(|e| {
                MarketError::Storage(format!("corrupt snapshot {}: {}", path.display(), e))
            })?;
            Ok(Some(snapshot))
        })
    }

    fn put(&self, key: &str, snapshot: Snapshot) -> BoxFuture<'_, Result<()>> {
        let path = self.path_for(key);

        Box::pin(async move {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| MarketError::Storage(format!("create data dir: {}", e)))?;

            let body = serde_json::to_string_pretty(&snapshot)?;
            tokio::fs::write(&path, body)
                .await
                .map_err(|e| MarketError::Storage(format!("write {}: {}", path.display(), e)))?;

            debug!(path = %path.display(), "Snapshot written");
            Ok(())
        })
    }
}
