use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketmate_core::types::{RunId, StepStatus};

/// One step's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub step: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub elapsed_ms: u64,
}

/// Audit trail of one pipeline execution, entries in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub entries: Vec<RunEntry>,
    pub elapsed_ms: u64,
}

impl RunRecord {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            entries: Vec::new(),
            elapsed_ms: 0,
        }
    }

    pub fn push(&mut self, entry: RunEntry) {
        self.entries.push(entry);
    }

    pub fn status_of(&self, step: &str) -> Option<StepStatus> {
        self.entries
            .iter()
            .find(|e| e.step == step)
            .map(|e| e.status)
    }

    /// Steps that did not finish `ok`.
    pub fn degraded_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status != StepStatus::Ok)
            .count()
    }

    pub fn all_ok(&self) -> bool {
        self.degraded_count() == 0
    }

    /// Worst status seen across the run.
    pub fn overall_status(&self) -> StepStatus {
        self.entries
            .iter()
            .map(|e| e.status)
            .max_by_key(|s| match s {
                StepStatus::Ok => 0,
                StepStatus::Degraded => 1,
                StepStatus::FailedWithFallback => 2,
            })
            .unwrap_or(StepStatus::Ok)
    }

    /// Human-readable per-step table.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "{:<18} {:<20} {:>6}ms",
                entry.step, entry.status, entry.elapsed_ms
            ));
            if let Some(ref msg) = entry.message {
                out.push_str(&format!("  {}", msg));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{} steps, {} degraded, {}ms total",
            self.entries.len(),
            self.degraded_count(),
            self.elapsed_ms
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(step: &str, status: StepStatus) -> RunEntry {
        RunEntry {
            step: step.into(),
            status,
            message: None,
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_status_accounting() {
        let mut record = RunRecord::new(RunId::new());
        assert!(record.all_ok());
        assert_eq!(record.overall_status(), StepStatus::Ok);

        record.push(entry("refine_subject", StepStatus::Ok));
        record.push(entry("find_competitors", StepStatus::Degraded));
        record.push(entry("forecast", StepStatus::Ok));

        assert_eq!(record.degraded_count(), 1);
        assert_eq!(record.status_of("find_competitors"), Some(StepStatus::Degraded));
        assert_eq!(record.status_of("missing"), None);
        assert_eq!(record.overall_status(), StepStatus::Degraded);

        record.push(entry("advise", StepStatus::FailedWithFallback));
        assert_eq!(record.overall_status(), StepStatus::FailedWithFallback);
    }

    #[test]
    fn test_serializes_snake_case_status() {
        let mut record = RunRecord::new(RunId::from_str("r1"));
        record.push(RunEntry {
            step: "advise".into(),
            status: StepStatus::FailedWithFallback,
            message: Some("panicked".into()),
            elapsed_ms: 3,
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["run_id"], "r1");
        assert_eq!(json["entries"][0]["status"], "failed_with_fallback");
    }
}
