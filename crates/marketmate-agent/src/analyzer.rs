use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use marketmate_core::config::PipelineConfig;
use marketmate_core::error::Result;
use marketmate_core::event::EventBus;
use marketmate_core::traits::SnapshotStore;
use marketmate_core::types::{PipelineEvent, RunId, Snapshot};
use marketmate_memory::normalize_key;

use crate::context::{keys, Context};
use crate::pipeline::{validate_subject, Pipeline};
use crate::run_record::RunRecord;
use crate::step::{Ports, Step};
use crate::steps::default_steps;

/// Entry point: one market analysis run per call.
///
/// Loads the previous snapshot for the subject, runs the pipeline, and
/// stores the new snapshot. Runs for the same subject must not overlap;
/// the store is last-write-wins with no locking.
pub struct MarketAnalyzer {
    pipeline: Pipeline,
    ports: Ports,
    store: Arc<dyn SnapshotStore>,
    events: Arc<EventBus>,
}

impl MarketAnalyzer {
    pub fn new(ports: Ports, store: Arc<dyn SnapshotStore>, config: &PipelineConfig) -> Self {
        Self::with_steps(ports, store, default_steps(config))
    }

    pub fn with_steps(
        ports: Ports,
        store: Arc<dyn SnapshotStore>,
        steps: Vec<Arc<dyn Step>>,
    ) -> Self {
        let events = Arc::new(EventBus::default());
        Self {
            pipeline: Pipeline::new(steps).with_events(events.clone()),
            ports,
            store,
            events,
        }
    }

    /// Publish run events on an existing bus instead of a private one.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.pipeline = self.pipeline.with_events(events.clone());
        self.events = events;
        self
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub async fn analyze(&self, initial: Context) -> Result<(Context, RunRecord)> {
        self.analyze_with_id(initial, RunId::new()).await
    }

    /// Run with a caller-chosen id, e.g. one a [`crate::RunLogger`] already listens for.
    pub async fn analyze_with_id(
        &self,
        initial: Context,
        run_id: RunId,
    ) -> Result<(Context, RunRecord)> {
        let subject = validate_subject(&initial)?.to_string();
        // Keyed on the caller's subject so a refined subject never moves the history.
        let key = normalize_key(&subject);

        info!(run_id = %run_id, subject = %subject, key = %key, "Market analysis started");
        self.events.publish(PipelineEvent::RunStarted {
            run_id: run_id.clone(),
            subject: subject.clone(),
        });

        let mut ctx = initial;
        self.load_history(&mut ctx, &key, &run_id).await;

        let (ctx, record) = self.pipeline.execute(ctx, &self.ports, &run_id).await?;

        self.store_snapshot(&ctx, &key, &run_id).await;

        info!(
            run_id = %run_id,
            steps = record.entries.len(),
            degraded = record.degraded_count(),
            elapsed_ms = record.elapsed_ms,
            "Market analysis complete"
        );
        self.events.publish(PipelineEvent::RunComplete {
            run_id,
            total_steps: record.entries.len(),
            degraded_steps: record.degraded_count(),
            elapsed_ms: record.elapsed_ms,
        });

        Ok((ctx, record))
    }

    async fn load_history(&self, ctx: &mut Context, key: &str, run_id: &RunId) {
        match self.store.get(key).await {
            Ok(Some(snapshot)) => {
                let date = snapshot.date.clone();
                match serde_json::to_value(snapshot) {
                    Ok(value) => {
                        ctx.set(keys::HISTORICAL, value);
                        debug!(key, date = %date, "Historical snapshot loaded");
                        self.events.publish(PipelineEvent::HistoryLoaded {
                            run_id: run_id.clone(),
                            key: key.to_string(),
                            date,
                        });
                    }
                    Err(e) => warn!(key, error = %e, "Historical snapshot unusable"),
                }
            }
            Ok(None) => debug!(key, "No historical snapshot"),
            Err(e) => warn!(key, error = %e, "Failed to load historical snapshot"),
        }
    }

    async fn store_snapshot(&self, ctx: &Context, key: &str, run_id: &RunId) {
        let snapshot = Snapshot::now(
            ctx.get_or(keys::COMPETITORS, json!([])),
            ctx.get_or(keys::REVIEWS, Value::Null),
            ctx.get_or(keys::TRENDS, json!([])),
        );

        match self.store.put(key, snapshot).await {
            Ok(()) => {
                debug!(key, "Snapshot stored");
                self.events.publish(PipelineEvent::SnapshotStored {
                    run_id: run_id.clone(),
                    key: key.to_string(),
                });
            }
            Err(e) => warn!(key, error = %e, "Failed to store snapshot"),
        }
    }
}
