use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

use marketmate_core::error::Result;
use marketmate_core::traits::{ModelInvoker, ReportSink, SearchProvider};
use marketmate_core::types::StepStatus;

use crate::context::{ContextSnapshot, Writes};

/// Collaborator ports handed to every step.
#[derive(Clone)]
pub struct Ports {
    pub model: Arc<dyn ModelInvoker>,
    pub search: Arc<dyn SearchProvider>,
    pub reports: Arc<dyn ReportSink>,
}

impl Ports {
    pub fn new(
        model: Arc<dyn ModelInvoker>,
        search: Arc<dyn SearchProvider>,
        reports: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            model,
            search,
            reports,
        }
    }
}

/// What a step hands back to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub writes: Writes,
    pub status: StepStatus,
    pub message: Option<String>,
}

impl StepOutput {
    pub fn ok(writes: Writes) -> Self {
        Self {
            writes,
            status: StepStatus::Ok,
            message: None,
        }
    }

    pub fn degraded(writes: Writes, message: impl Into<String>) -> Self {
        Self {
            writes,
            status: StepStatus::Degraded,
            message: Some(message.into()),
        }
    }
}

/// A named unit of pipeline work.
///
/// `attempt` does the real work and may fail on any collaborator error.
/// `fallback` produces the documented substitute for every declared write.
/// Steps never handle collaborator errors themselves beyond what they choose
/// to report as degraded; [`run_isolated`] applies the fallback uniformly.
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    /// Context keys the step expects to exist.
    fn reads(&self) -> &[&'static str];

    /// Context keys the step sets on both success and failure paths.
    fn writes(&self) -> &[&'static str];

    fn attempt<'a>(
        &'a self,
        ctx: &'a ContextSnapshot,
        ports: &'a Ports,
    ) -> BoxFuture<'a, Result<StepOutput>>;

    fn fallback(&self, ctx: &ContextSnapshot) -> Result<Writes>;
}

/// Run a step, substituting its fallback when the attempt fails.
///
/// Declared writes missing from a successful attempt are filled from the
/// fallback and the step is marked degraded. An error here means the
/// fallback itself failed.
pub async fn run_isolated(
    step: &dyn Step,
    ctx: &ContextSnapshot,
    ports: &Ports,
) -> Result<StepOutput> {
    let mut output = match step.attempt(ctx, ports).await {
        Ok(output) => output,
        Err(e) => {
            warn!(step = step.name(), error = %e, "Step failed, using fallback");
            return Ok(StepOutput::degraded(step.fallback(ctx)?, e.to_string()));
        }
    };

    let missing: Vec<&str> = step
        .writes()
        .iter()
        .copied()
        .filter(|k| !output.writes.contains_key(*k))
        .collect();

    if !missing.is_empty() {
        warn!(step = step.name(), missing = ?missing, "Step omitted declared writes");
        let mut substitute = step.fallback(ctx)?;
        for key in &missing {
            if let Some(value) = substitute.remove(*key) {
                output.writes.insert(key.to_string(), value);
            }
        }
        output.status = StepStatus::Degraded;
        output.message = Some(format!("missing declared writes: {}", missing.join(", ")));
    }

    Ok(output)
}

/// Ports over concrete test doubles.
#[cfg(test)]
pub(crate) fn ports_with(
    model: impl ModelInvoker,
    search: impl SearchProvider,
    reports: impl ReportSink,
) -> Ports {
    Ports::new(Arc::new(model), Arc::new(search), Arc::new(reports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use marketmate_core::error::MarketError;
    use marketmate_test_utils::{FailingModel, FailingSearch, RecordingSink};
    use serde_json::json;

    struct Echo {
        fail: bool,
        partial: bool,
    }

    impl Step for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn reads(&self) -> &[&'static str] {
            &["subject"]
        }
        fn writes(&self) -> &[&'static str] {
            &["a", "b"]
        }
        fn attempt<'a>(
            &'a self,
            _ctx: &'a ContextSnapshot,
            _ports: &'a Ports,
        ) -> BoxFuture<'a, Result<StepOutput>> {
            Box::pin(async move {
                if self.fail {
                    return Err(MarketError::provider("model", "HTTP 429"));
                }
                let mut w = Writes::new();
                w.insert("a".into(), json!("real"));
                if !self.partial {
                    w.insert("b".into(), json!("real"));
                }
                Ok(StepOutput::ok(w))
            })
        }
        fn fallback(&self, _ctx: &ContextSnapshot) -> Result<Writes> {
            let mut w = Writes::new();
            w.insert("a".into(), json!("fallback"));
            w.insert("b".into(), json!("fallback"));
            Ok(w)
        }
    }

    fn ports() -> Ports {
        ports_with(
            FailingModel::new(),
            FailingSearch::new(),
            RecordingSink::new(),
        )
    }

    #[tokio::test]
    async fn test_ok_passes_through() {
        let snap = Context::with_subject("x").snapshot();
        let out = run_isolated(&Echo { fail: false, partial: false }, &snap, &ports())
            .await
            .unwrap();
        assert_eq!(out.status, StepStatus::Ok);
        assert_eq!(out.writes["b"], json!("real"));
    }

    #[tokio::test]
    async fn test_error_becomes_degraded_fallback() {
        let snap = Context::with_subject("x").snapshot();
        let out = run_isolated(&Echo { fail: true, partial: false }, &snap, &ports())
            .await
            .unwrap();
        assert_eq!(out.status, StepStatus::Degraded);
        assert_eq!(out.writes["a"], json!("fallback"));
        assert!(out.message.unwrap().contains("HTTP 429"));
    }

    #[tokio::test]
    async fn test_missing_write_filled_from_fallback() {
        let snap = Context::with_subject("x").snapshot();
        let out = run_isolated(&Echo { fail: false, partial: true }, &snap, &ports())
            .await
            .unwrap();
        assert_eq!(out.status, StepStatus::Degraded);
        assert_eq!(out.writes["a"], json!("real"));
        assert_eq!(out.writes["b"], json!("fallback"));
    }
}
