use std::collections::BTreeMap;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::Result;
use crate::types::*;

/// Model invoker: prompt in, text out.
pub trait ModelInvoker: Send + Sync + 'static {
    /// Provider name (used in logs and errors).
    fn name(&self) -> &str;

    /// Send one prompt and return the full response text.
    ///
    /// Fails with a provider error on quota, network, or timeout.
    fn invoke(&self, prompt: &str) -> BoxFuture<'_, Result<String>>;
}

/// Web and news search.
///
/// An empty result is a valid, non-error outcome.
pub trait SearchProvider: Send + Sync + 'static {
    /// Provider name (e.g., "serpapi", "tavily").
    fn name(&self) -> &str;

    /// Ranked web search snippets for a query.
    fn search(&self, query: &str) -> BoxFuture<'_, Result<Vec<Snippet>>>;

    /// Ranked news articles for a query.
    fn news_search(&self, query: &str) -> BoxFuture<'_, Result<Vec<Article>>>;
}

/// Last-write-wins snapshot persistence keyed by normalized subject.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Fetch the snapshot stored under `key`, if any.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Snapshot>>>;

    /// Store `snapshot` under `key`, replacing whatever was there.
    fn put(&self, key: &str, snapshot: Snapshot) -> BoxFuture<'_, Result<()>>;
}

/// Renders the final context to an artifact.
pub trait ReportSink: Send + Sync + 'static {
    /// Render the context; `Ok(None)` when no artifact is produced.
    fn render(&self, context: BTreeMap<String, Value>) -> BoxFuture<'_, Result<Option<String>>>;
}
