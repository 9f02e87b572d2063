use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use marketmate_core::event::{EventBus, RunEvents};
use marketmate_core::types::{PipelineEvent, RunId};

/// JSONL run logger.
///
/// Subscribes to the EventBus and appends one JSON object per line to
/// `{log_dir}/{run_id}.jsonl`. Lines already written survive a crash.
pub struct RunLogger {
    log_dir: PathBuf,
    level: u8,
}

#[derive(Serialize)]
struct LogEntry {
    timestamp: String,
    run_id: String,
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<serde_json::Value>,
}

impl RunLogger {
    /// `level` controls verbosity: 1=run summary, 2=+step results, 3=+step starts.
    pub fn new(log_dir: PathBuf, level: u8) -> Self {
        Self { log_dir, level }
    }

    /// Subscribe to the bus and run the logger as a background task.
    ///
    /// Only events for `run_id` are written. Stops on `RunComplete` for that
    /// run, on cancellation, or when the bus closes.
    pub fn spawn(
        self,
        event_bus: &EventBus,
        run_id: RunId,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let events = event_bus.subscribe_run(run_id);
        tokio::spawn(self.run(events, cancel))
    }

    async fn run(self, mut events: RunEvents, cancel: CancellationToken) {
        if let Err(e) = tokio::fs::create_dir_all(&self.log_dir).await {
            error!(error = %e, "Failed to create log directory");
            return;
        }

        let log_path = self.log_dir.join(format!("{}.jsonl", events.run_id()));
        let file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %log_path.display(), "Failed to open log file");
                return;
            }
        };

        info!(path = %log_path.display(), "RunLogger started");
        let mut writer = tokio::io::BufWriter::new(file);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("RunLogger cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let Some(entry) = self.event_to_entry(&event) else {
                continue;
            };
            if let Ok(json) = serde_json::to_string(&entry) {
                let line = format!("{}\n", json);
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    error!(error = %e, "Failed to write log entry");
                    break;
                }
                if let Err(e) = writer.flush().await {
                    error!(error = %e, "Failed to flush log");
                }
            }
        }

        if events.lagged() > 0 {
            debug!(skipped = events.lagged(), "RunLogger lagged, skipped events");
        }
        writer.flush().await.ok();
        debug!(path = %log_path.display(), "RunLogger finished");
    }

    /// Convert an event to a log entry (None if filtered by level).
    fn event_to_entry(&self, event: &PipelineEvent) -> Option<LogEntry> {
        let entry = |event_type, step, detail| LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id: event.run_id().to_string(),
            event_type,
            step,
            detail,
        };

        match event {
            // L1: run summary
            PipelineEvent::RunStarted { subject, .. } => Some(entry(
                "run_started",
                None,
                Some(serde_json::json!({ "subject": subject })),
            )),
            PipelineEvent::RunComplete {
                total_steps,
                degraded_steps,
                elapsed_ms,
                ..
            } => Some(entry(
                "run_complete",
                None,
                Some(serde_json::json!({
                    "total_steps": total_steps,
                    "degraded_steps": degraded_steps,
                    "elapsed_ms": elapsed_ms,
                })),
            )),

            // L2: step results and memory traffic
            PipelineEvent::StepFinished {
                step,
                status,
                message,
                elapsed_ms,
                ..
            } if self.level >= 2 => Some(entry(
                "step_finished",
                Some(step.clone()),
                Some(serde_json::json!({
                    "status": status,
                    "message": message,
                    "elapsed_ms": elapsed_ms,
                })),
            )),
            PipelineEvent::HistoryLoaded { key, date, .. } if self.level >= 2 => Some(entry(
                "history_loaded",
                None,
                Some(serde_json::json!({ "key": key, "date": date })),
            )),
            PipelineEvent::SnapshotStored { key, .. } if self.level >= 2 => Some(entry(
                "snapshot_stored",
                None,
                Some(serde_json::json!({ "key": key })),
            )),

            // L3: step starts
            PipelineEvent::StepStarted { step, .. } if self.level >= 3 => {
                Some(entry("step_started", Some(step.clone()), None))
            }

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketmate_core::types::StepStatus;

    fn finished(run_id: &RunId) -> PipelineEvent {
        PipelineEvent::StepFinished {
            run_id: run_id.clone(),
            step: "forecast".into(),
            status: StepStatus::Ok,
            message: None,
            elapsed_ms: 4,
        }
    }

    #[test]
    fn test_level_filtering() {
        let run_id = RunId::new();
        let started = PipelineEvent::StepStarted {
            run_id: run_id.clone(),
            step: "forecast".into(),
        };

        let l1 = RunLogger::new(PathBuf::new(), 1);
        assert!(l1.event_to_entry(&finished(&run_id)).is_none());

        let l2 = RunLogger::new(PathBuf::new(), 2);
        let entry = l2.event_to_entry(&finished(&run_id)).unwrap();
        assert_eq!(entry.event_type, "step_finished");
        assert_eq!(entry.detail.unwrap()["status"], "ok");
        assert!(l2.event_to_entry(&started).is_none());

        let l3 = RunLogger::new(PathBuf::new(), 3);
        assert!(l3.event_to_entry(&started).is_some());
    }

    #[tokio::test]
    async fn test_writes_jsonl_until_complete() {
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::default();
        let run_id = RunId::from_str("run-1");
        let handle = RunLogger::new(dir.path().to_path_buf(), 2).spawn(
            &bus,
            run_id.clone(),
            CancellationToken::new(),
        );

        bus.publish(PipelineEvent::RunStarted {
            run_id: run_id.clone(),
            subject: "brake pads".into(),
        });
        bus.publish(PipelineEvent::RunStarted {
            run_id: RunId::from_str("other"),
            subject: "tyres".into(),
        });
        bus.publish(finished(&run_id));
        bus.publish(PipelineEvent::RunComplete {
            run_id: run_id.clone(),
            total_steps: 6,
            degraded_steps: 0,
            elapsed_ms: 10,
        });
        handle.await.unwrap();

        let body = std::fs::read_to_string(dir.path().join("run-1.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event_type"], "run_started");
        assert_eq!(lines[1]["step"], "forecast");
        assert_eq!(lines[2]["detail"]["total_steps"], 6);
    }
}
