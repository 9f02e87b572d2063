use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::types::{PipelineEvent, RunId};

/// Pipeline event bus on a tokio broadcast channel.
///
/// Several runs may share one bus; use [`EventBus::subscribe_run`] to follow
/// a single run.
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: PipelineEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }

    /// Every event from every run.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Events of one run only, ending after its `RunComplete`.
    pub fn subscribe_run(&self, run_id: RunId) -> RunEvents {
        RunEvents {
            rx: self.tx.subscribe(),
            run_id,
            finished: false,
            lagged: 0,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// A subscription filtered to a single run.
pub struct RunEvents {
    rx: broadcast::Receiver<PipelineEvent>,
    run_id: RunId,
    finished: bool,
    lagged: u64,
}

impl RunEvents {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Events dropped because this subscriber fell behind.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    /// Wait for the next event of this run.
    ///
    /// Returns `None` once `RunComplete` has been delivered or the bus is gone.
    /// Cancel safe.
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        while !self.finished {
            match self.rx.recv().await {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(n)) => self.lagged += n,
                Err(RecvError::Closed) => self.finished = true,
            }
        }
        None
    }

    /// Non-blocking variant of [`RunEvents::recv`]; `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        while !self.finished {
            match self.rx.try_recv() {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
                Err(TryRecvError::Lagged(n)) => self.lagged += n,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => self.finished = true,
            }
        }
        None
    }

    fn accept(&mut self, event: PipelineEvent) -> Option<PipelineEvent> {
        if event.run_id() != &self.run_id {
            return None;
        }
        if matches!(event, PipelineEvent::RunComplete { .. }) {
            self.finished = true;
        }
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(run_id: &RunId) -> PipelineEvent {
        PipelineEvent::StepStarted {
            run_id: run_id.clone(),
            step: "forecast".into(),
        }
    }

    fn complete(run_id: &RunId) -> PipelineEvent {
        PipelineEvent::RunComplete {
            run_id: run_id.clone(),
            total_steps: 6,
            degraded_steps: 0,
            elapsed_ms: 10,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        EventBus::default().publish(started(&RunId::new()));
    }

    #[tokio::test]
    async fn test_run_subscription_filters_and_ends() {
        let bus = EventBus::default();
        let mine = RunId::new();
        let other = RunId::new();
        let mut events = bus.subscribe_run(mine.clone());

        bus.publish(started(&other));
        bus.publish(started(&mine));
        bus.publish(complete(&other));
        bus.publish(complete(&mine));
        bus.publish(started(&mine));

        assert!(matches!(events.recv().await, Some(PipelineEvent::StepStarted { .. })));
        assert!(matches!(events.recv().await, Some(PipelineEvent::RunComplete { .. })));
        assert!(events.recv().await.is_none());
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_run_subscription_ends_when_bus_dropped() {
        let bus = EventBus::default();
        let run_id = RunId::new();
        let mut events = bus.subscribe_run(run_id.clone());
        bus.publish(started(&run_id));
        drop(bus);

        assert!(events.recv().await.is_some());
        assert!(events.recv().await.is_none());
    }

    #[test]
    fn test_lag_is_counted() {
        let bus = EventBus::new(2);
        let run_id = RunId::new();
        let mut events = bus.subscribe_run(run_id.clone());
        for _ in 0..5 {
            bus.publish(started(&run_id));
        }

        assert!(events.try_recv().is_some());
        assert_eq!(events.lagged(), 3);
        assert!(events.try_recv().is_some());
        assert!(events.try_recv().is_none());
        assert_eq!(events.run_id(), &run_id);
    }
}
