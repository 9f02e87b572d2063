use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::{json, Value};

use marketmate_core::error::Result;

use super::single;
use crate::context::{keys, ContextSnapshot, Writes};
use crate::forecast::Forecaster;
use crate::step::{Ports, Step, StepOutput};

/// Attach illustrative projections for the subject and its competitors.
pub struct ForecastStep {
    forecaster: Forecaster,
}

impl ForecastStep {
    pub fn new(seed: u64) -> Self {
        Self {
            forecaster: Forecaster::new(seed),
        }
    }
}

impl Step for ForecastStep {
    fn name(&self) -> &str {
        "forecast"
    }

    fn reads(&self) -> &[&'static str] {
        &[keys::SUBJECT, keys::COMPETITORS]
    }

    fn writes(&self) -> &[&'static str] {
        &[keys::FORECAST]
    }

    fn attempt<'a>(
        &'a self,
        ctx: &'a ContextSnapshot,
        _ports: &'a Ports,
    ) -> BoxFuture<'a, Result<StepOutput>> {
        Box::pin(async move {
            let competitors = ctx.get_strings(keys::COMPETITORS);
            let bundle = self
                .forecaster
                .generate(ctx.subject(), &competitors, Utc::now());
            let value: Value = serde_json::to_value(bundle)?;
            Ok(StepOutput::ok(single(keys::FORECAST, value)))
        })
    }

    fn fallback(&self, _ctx: &ContextSnapshot) -> Result<Writes> {
        Ok(single(keys::FORECAST, json!({})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::step::run_isolated;
    use marketmate_core::types::StepStatus;
    use crate::step::ports_with;
    use marketmate_test_utils::{FailingModel, FailingSearch, RecordingSink};

    #[tokio::test]
    async fn test_ok_without_collaborators() {
        let ports = ports_with(FailingModel::new(), FailingSearch::new(), RecordingSink::new());
        let mut ctx = Context::with_subject("brake pads");
        ctx.set(keys::COMPETITORS, json!(["Brembo", "EBC Brakes"]));

        let out = run_isolated(&ForecastStep::new(42), &ctx.snapshot(), &ports)
            .await
            .unwrap();
        assert_eq!(out.status, StepStatus::Ok);

        let forecast = &out.writes["forecast"];
        assert_eq!(forecast["subject"], "brake pads");
        assert_eq!(forecast["competitor_strategies"][1]["competitor"], "EBC Brakes");
        assert_eq!(forecast["sales_forecast"].as_array().unwrap().len(), 12);
    }
}
