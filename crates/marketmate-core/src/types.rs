use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one pipeline run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ranked web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub link: String,
}

impl Snippet {
    pub fn new(title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            link: String::new(),
        }
    }

    /// Render as a prompt-friendly block.
    pub fn render(&self) -> String {
        if self.link.is_empty() {
            format!("Title: {}\nSnippet: {}", self.title, self.snippet)
        } else {
            format!(
                "Title: {}\nSnippet: {}\nLink: {}",
                self.title, self.snippet, self.link
            )
        }
    }
}

/// A ranked news article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub date: Option<String>,
}

impl Article {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: None,
            link: String::new(),
            date: None,
        }
    }
}

/// Overall review sentiment label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Mixed,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Mixed => "Mixed",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The last persisted result for one analysis subject.
///
/// Values are kept as raw JSON so a snapshot read back into a context is
/// exactly what the earlier run wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: String,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub competitors: serde_json::Value,
    #[serde(default)]
    pub reviews: serde_json::Value,
    #[serde(default)]
    pub trends: serde_json::Value,
}

impl Snapshot {
    /// Build a snapshot stamped with the current time.
    pub fn now(
        competitors: serde_json::Value,
        reviews: serde_json::Value,
        trends: serde_json::Value,
    ) -> Self {
        let taken_at = Utc::now();
        Self {
            date: taken_at.format("%Y-%m-%d").to_string(),
            taken_at,
            competitors,
            reviews,
            trends,
        }
    }
}

/// Outcome of one step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step's collaborators answered and the output is genuine.
    Ok,
    /// A collaborator failed or came back empty; the step substituted its fallback.
    Degraded,
    /// The step's own fallback handling failed; the pipeline kept the prior context.
    FailedWithFallback,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::FailedWithFallback => "failed_with_fallback",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline event broadcast to monitoring subscribers.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A run started for a subject.
    RunStarted { run_id: RunId, subject: String },
    /// A prior snapshot was merged into the context.
    HistoryLoaded { run_id: RunId, key: String, date: String },
    /// A step is about to execute.
    StepStarted { run_id: RunId, step: String },
    /// A step finished (with any status).
    StepFinished {
        run_id: RunId,
        step: String,
        status: StepStatus,
        message: Option<String>,
        elapsed_ms: u64,
    },
    /// The current snapshot was persisted.
    SnapshotStored { run_id: RunId, key: String },
    /// The run finished; it always finishes.
    RunComplete {
        run_id: RunId,
        total_steps: usize,
        degraded_steps: usize,
        elapsed_ms: u64,
    },
}

impl PipelineEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::HistoryLoaded { run_id, .. }
            | Self::StepStarted { run_id, .. }
            | Self::StepFinished { run_id, .. }
            | Self::SnapshotStored { run_id, .. }
            | Self::RunComplete { run_id, .. } => run_id,
        }
    }
}
