use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known context keys.
pub mod keys {
    pub const SUBJECT: &str = "subject";
    pub const REGION: &str = "region";
    pub const COMPETITORS: &str = "competitors";
    pub const REVIEWS: &str = "reviews";
    pub const TRENDS: &str = "trends";
    pub const FORECAST: &str = "forecast";
    pub const RECOMMENDATIONS: &str = "recommendations";
    pub const REPORT: &str = "report";
    pub const HISTORICAL: &str = "historical";
}

/// Partial context update returned by a step.
pub type Writes = BTreeMap<String, Value>;

/// Shared key-value state threaded through a pipeline run.
///
/// Keys are strings; values are JSON. Keys are only ever added or
/// overwritten during a run, never removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    data: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context holding only the analysis subject.
    pub fn with_subject(subject: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.set_str(keys::SUBJECT, subject);
        ctx
    }

    pub fn from_map(data: BTreeMap<String, Value>) -> Self {
        Self { data }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Value for `key`, or `default` when absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.data.get(key).cloned().unwrap_or(default)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Overwrite-or-insert.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), Value::String(value.into()));
    }

    /// Merge a step's writes (key-wise overwrite).
    pub fn merge(&mut self, writes: Writes) {
        self.data.extend(writes);
    }

    /// Immutable copy for a step's read phase.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            data: Arc::new(self.data.clone()),
        }
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.data
    }
}

/// Read-only view of a context taken before a step runs.
///
/// Writes made to the live context afterwards are not visible here.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    data: Arc<BTreeMap<String, Value>>,
}

impl ContextSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.data.get(key).cloned().unwrap_or(default)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Current subject, or an empty string if it is missing or not text.
    pub fn subject(&self) -> &str {
        self.get_str(keys::SUBJECT).unwrap_or_default()
    }

    /// String items of an array value; non-strings are skipped.
    pub fn get_strings(&self, key: &str) -> Vec<String> {
        self.data
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_operations() {
        let mut ctx = Context::with_subject("brake pads");
        ctx.set("count", json!(3));

        assert_eq!(ctx.get_str(keys::SUBJECT), Some("brake pads"));
        assert_eq!(ctx.get("count"), Some(&json!(3)));
        assert_eq!(ctx.get_or("missing", json!([])), json!([]));
        assert!(!ctx.has("missing"));
    }

    #[test]
    fn test_merge_overwrites() {
        let mut ctx = Context::with_subject("brake pads");
        ctx.set_str("a", "1");

        let mut writes = Writes::new();
        writes.insert("a".into(), json!("overwritten"));
        writes.insert("b".into(), json!(["x"]));
        ctx.merge(writes);

        assert_eq!(ctx.get_str("a"), Some("overwritten"));
        assert_eq!(ctx.get("b"), Some(&json!(["x"])));
        assert_eq!(ctx.get_str(keys::SUBJECT), Some("brake pads"));
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let mut ctx = Context::with_subject("brake pads");
        let snap = ctx.snapshot();
        ctx.set_str(keys::SUBJECT, "ceramic brake pads");
        ctx.set("competitors", json!(["Brembo"]));

        assert_eq!(snap.subject(), "brake pads");
        assert!(snap.get("competitors").is_none());
    }

    #[test]
    fn test_get_strings_skips_non_text() {
        let mut ctx = Context::new();
        ctx.set("competitors", json!(["Brembo", 7, null, "EBC"]));
        let snap = ctx.snapshot();
        assert_eq!(snap.get_strings("competitors"), vec!["Brembo", "EBC"]);
        assert!(snap.get_strings("trends").is_empty());
    }
}
