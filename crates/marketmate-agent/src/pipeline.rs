use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, info};

use marketmate_core::error::{MarketError, Result};
use marketmate_core::event::EventBus;
use marketmate_core::types::{PipelineEvent, RunId, StepStatus};

use crate::context::{keys, Context};
use crate::run_record::{RunEntry, RunRecord};
use crate::step::{run_isolated, Ports, Step, StepOutput};

/// Refuse contexts without a non-blank subject.
pub fn validate_subject(ctx: &Context) -> Result<&str> {
    match ctx.get_str(keys::SUBJECT).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        Some(_) => Err(MarketError::Validation("subject is blank".into())),
        None => Err(MarketError::Validation(
            "initial context must contain a text 'subject'".into(),
        )),
    }
}

/// Ordered list of steps run one at a time over a shared context.
pub struct Pipeline {
    steps: Vec<Arc<dyn Step>>,
    events: Option<Arc<EventBus>>,
}

impl Pipeline {
    pub fn new(steps: Vec<Arc<dyn Step>>) -> Self {
        Self {
            steps,
            events: None,
        }
    }

    /// Publish step events on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    fn publish(&self, event: PipelineEvent) {
        if let Some(ref bus) = self.events {
            bus.publish(event);
        }
    }

    /// Run every step in order.
    ///
    /// Only a missing subject fails; every step failure is recorded and the
    /// run continues with the context it had.
    pub async fn execute(
        &self,
        initial: Context,
        ports: &Ports,
        run_id: &RunId,
    ) -> Result<(Context, RunRecord)> {
        validate_subject(&initial)?;

        let start = Instant::now();
        let mut ctx = initial;
        let mut record = RunRecord::new(run_id.clone());

        for step in &self.steps {
            let name = step.name().to_string();
            self.publish(PipelineEvent::StepStarted {
                run_id: run_id.clone(),
                step: name.clone(),
            });
            debug!(step = %name, reads = ?step.reads(), "Running step");

            let snapshot = ctx.snapshot();
            let step_start = Instant::now();
            let outcome = AssertUnwindSafe(run_isolated(step.as_ref(), &snapshot, ports))
                .catch_unwind()
                .await;

            let output = match outcome {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    error!(step = %name, error = %e, "Step fallback failed");
                    failed_output(e.to_string())
                }
                Err(panic) => {
                    let msg = panic_message(panic.as_ref());
                    error!(step = %name, panic = %msg, "Step panicked");
                    failed_output(format!("panicked: {}", msg))
                }
            };
            let elapsed_ms = step_start.elapsed().as_millis() as u64;

            if output.status == StepStatus::FailedWithFallback {
                // Keep earlier values; only make sure every declared key exists.
                for key in step.writes() {
                    if !ctx.has(key) {
                        ctx.set(*key, Value::Null);
                    }
                }
            } else {
                ctx.merge(output.writes);
            }

            info!(
                step = %name,
                status = %output.status,
                elapsed_ms,
                "Step finished"
            );

            self.publish(PipelineEvent::StepFinished {
                run_id: run_id.clone(),
                step: name.clone(),
                status: output.status,
                message: output.message.clone(),
                elapsed_ms,
            });
            record.push(RunEntry {
                step: name,
                status: output.status,
                message: output.message,
                elapsed_ms,
            });
        }

        record.elapsed_ms = start.elapsed().as_millis() as u64;
        Ok((ctx, record))
    }
}

fn failed_output(message: String) -> StepOutput {
    StepOutput {
        writes: Default::default(),
        status: StepStatus::FailedWithFallback,
        message: Some(message),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_subject() {
        assert!(validate_subject(&Context::with_subject("brake pads")).is_ok());
        assert!(matches!(
            validate_subject(&Context::with_subject("   ")),
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            validate_subject(&Context::new()),
            Err(MarketError::Validation(_))
        ));
        let mut ctx = Context::new();
        ctx.set("subject", serde_json::json!(42));
        assert!(validate_subject(&ctx).is_err());
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }
}
