//! Test doubles for the collaborator ports.
//!
//! Every double is cheap to clone; clones share recorded state so a test can
//! keep one handle while the pipeline owns another.

pub mod fixtures;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::Value;

use marketmate_core::error::{MarketError, Result};
use marketmate_core::traits::{ModelInvoker, ReportSink, SearchProvider, SnapshotStore};
use marketmate_core::types::{Article, Snapshot, Snippet};

fn record(log: &Mutex<Vec<String>>, entry: &str) {
    if let Ok(mut log) = log.lock() {
        log.push(entry.to_string());
    }
}

fn recorded(log: &Mutex<Vec<String>>) -> Vec<String> {
    log.lock().map(|l| l.clone()).unwrap_or_default()
}

// ── Model ────────────────────────────────────────────────────────

/// Model that answers by case-insensitive substring match on the prompt.
///
/// Rules are checked in insertion order. Without a match and without an
/// `otherwise` reply, the call fails with a provider error.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    rules: Vec<(String, String)>,
    fallback: Option<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.to_lowercase(), reply.to_string()));
        self
    }

    pub fn otherwise(mut self, reply: &str) -> Self {
        self.fallback = Some(reply.to_string());
        self
    }

    /// Every prompt received, in order.
    pub fn prompts(&self) -> Vec<String> {
        recorded(&self.prompts)
    }
}

impl ModelInvoker for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn invoke(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        record(&self.prompts, prompt);
        let lower = prompt.to_lowercase();
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| lower.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.fallback.clone());

        Box::pin(async move {
            reply.ok_or_else(|| MarketError::provider("scripted", "no scripted reply for prompt"))
        })
    }
}

/// Model whose every call fails.
#[derive(Clone)]
pub struct FailingModel {
    timeout: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FailingModel {
    pub fn new() -> Self {
        Self {
            timeout: false,
            calls: Arc::default(),
        }
    }

    /// Fail with a timeout instead of a plain provider error.
    pub fn timing_out() -> Self {
        Self {
            timeout: true,
            calls: Arc::default(),
        }
    }

    pub fn call_count(&self) -> usize {
        recorded(&self.calls).len()
    }
}

impl Default for FailingModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelInvoker for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn invoke(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        record(&self.calls, prompt);
        let timeout = self.timeout;
        Box::pin(async move {
            if timeout {
                Err(MarketError::ProviderTimeout {
                    provider: "failing".into(),
                    timeout_secs: 60,
                })
            } else {
                Err(MarketError::provider("failing", "quota exceeded"))
            }
        })
    }
}

// ── Search ───────────────────────────────────────────────────────

/// Search with canned results keyed by case-insensitive query substring.
/// Unmatched queries return no results.
#[derive(Clone, Default)]
pub struct StaticSearch {
    results: Vec<(String, Vec<Snippet>)>,
    news: Vec<(String, Vec<Article>)>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl StaticSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, needle: &str, snippets: Vec<Snippet>) -> Self {
        self.results.push((needle.to_lowercase(), snippets));
        self
    }

    pub fn with_news(mut self, needle: &str, articles: Vec<Article>) -> Self {
        self.news.push((needle.to_lowercase(), articles));
        self
    }

    /// Every query received (web and news), in order.
    pub fn queries(&self) -> Vec<String> {
        recorded(&self.queries)
    }
}

fn lookup<T: Clone>(table: &[(String, Vec<T>)], query: &str) -> Vec<T> {
    let lower = query.to_lowercase();
    table
        .iter()
        .find(|(needle, _)| lower.contains(needle.as_str()))
        .map(|(_, items)| items.clone())
        .unwrap_or_default()
}

impl SearchProvider for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    fn search(&self, query: &str) -> BoxFuture<'_, Result<Vec<Snippet>>> {
        record(&self.queries, query);
        let found = lookup(&self.results, query);
        Box::pin(async move { Ok(found) })
    }

    fn news_search(&self, query: &str) -> BoxFuture<'_, Result<Vec<Article>>> {
        record(&self.queries, query);
        let found = lookup(&self.news, query);
        Box::pin(async move { Ok(found) })
    }
}

/// Search whose every call fails.
#[derive(Clone, Default)]
pub struct FailingSearch {
    queries: Arc<Mutex<Vec<String>>>,
}

impl FailingSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        recorded(&self.queries).len()
    }
}

impl SearchProvider for FailingSearch {
    fn name(&self) -> &str {
        "failing"
    }

    fn search(&self, query: &str) -> BoxFuture<'_, Result<Vec<Snippet>>> {
        record(&self.queries, query);
        Box::pin(async move { Err(MarketError::provider("failing", "HTTP 503")) })
    }

    fn news_search(&self, query: &str) -> BoxFuture<'_, Result<Vec<Article>>> {
        record(&self.queries, query);
        Box::pin(async move { Err(MarketError::provider("failing", "HTTP 503")) })
    }
}

// ── Store ────────────────────────────────────────────────────────

/// Snapshot store held in memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    data: Arc<Mutex<HashMap<String, Snapshot>>>,
    fail: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose reads and writes always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn snapshot(&self, key: &str) -> Option<Snapshot> {
        self.data.lock().ok().and_then(|d| d.get(key).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .lock()
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl SnapshotStore for InMemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Snapshot>>> {
        let result = if self.fail {
            Err(MarketError::Storage("store offline".into()))
        } else {
            Ok(self.snapshot(key))
        };
        Box::pin(async move { result })
    }

    fn put(&self, key: &str, snapshot: Snapshot) -> BoxFuture<'_, Result<()>> {
        let result = if self.fail {
            Err(MarketError::Storage("store offline".into()))
        } else {
            self.data
                .lock()
                .map(|mut d| {
                    d.insert(key.to_string(), snapshot);
                })
                .map_err(|e| MarketError::Storage(e.to_string()))
        };
        Box::pin(async move { result })
    }
}

// ── Report sink ──────────────────────────────────────────────────

/// Sink that keeps every rendered context and returns a fake reference.
#[derive(Clone, Default)]
pub struct RecordingSink {
    rendered: Arc<Mutex<Vec<BTreeMap<String, Value>>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> Vec<BTreeMap<String, Value>> {
        self.rendered.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ReportSink for RecordingSink {
    fn render(&self, context: BTreeMap<String, Value>) -> BoxFuture<'_, Result<Option<String>>> {
        let reference = self
            .rendered
            .lock()
            .map(|mut r| {
                r.push(context);
                format!("memory://report/{}", r.len())
            })
            .map_err(|e| MarketError::Report(e.to_string()));
        Box::pin(async move { reference.map(Some) })
    }
}

/// Sink whose every render fails.
#[derive(Clone, Default)]
pub struct FailingSink;

impl FailingSink {
    pub fn new() -> Self {
        Self
    }
}

impl ReportSink for FailingSink {
    fn render(&self, _context: BTreeMap<String, Value>) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(async move { Err(MarketError::Report("disk full".into())) })
    }
}
