use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use marketmate_core::error::{MarketError, Result};

use super::single;
use crate::context::{keys, ContextSnapshot, Writes};
use crate::parse::parse_refined_subject;
use crate::step::{Ports, Step, StepOutput};

/// Ask the model to sharpen a vague subject into a short product line.
pub struct RefineSubject;

fn prompt(subject: &str) -> String {
    format!(
        "You are a business analysis AI. Your task is to validate and refine a given product line.\n\
         If the input is vague, make it more specific.\n\
         Return ONLY a short, concise product line name (maximum 10 words).\n\n\
         Product line: {}\n\n\
         Refined product line:",
        subject
    )
}

impl Step for RefineSubject {
    fn name(&self) -> &str {
        "refine_subject"
    }

    fn reads(&self) -> &[&'static str] {
        &[keys::SUBJECT]
    }

    fn writes(&self) -> &[&'static str] {
        &[keys::SUBJECT]
    }

    fn attempt<'a>(
        &'a self,
        ctx: &'a ContextSnapshot,
        ports: &'a Ports,
    ) -> BoxFuture<'a, Result<StepOutput>> {
        Box::pin(async move {
            let subject = ctx.subject();
            let reply = ports.model.invoke(&prompt(subject)).await?;

            let refined = parse_refined_subject(&reply).ok_or_else(|| {
                MarketError::Parse("model reply had no usable subject".into())
            })?;
            debug!(from = subject, to = %refined, "Subject refined");
            Ok(StepOutput::ok(single(keys::SUBJECT, Value::String(refined))))
        })
    }

    fn fallback(&self, ctx: &ContextSnapshot) -> Result<Writes> {
        Ok(single(keys::SUBJECT, Value::String(ctx.subject().to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::step::run_isolated;
    use marketmate_core::types::StepStatus;
    use crate::step::ports_with;
    use marketmate_test_utils::{FailingModel, RecordingSink, ScriptedModel, StaticSearch};

    #[tokio::test]
    async fn test_refines_subject() {
        let ports = ports_with(
            ScriptedModel::new().on("Refined product line", "Refined product line: Ceramic motorcycle brake pads"),
            StaticSearch::new(),
            RecordingSink::new(),
        );
        let snap = Context::with_subject("brake pads").snapshot();
        let out = run_isolated(&RefineSubject, &snap, &ports).await.unwrap();
        assert_eq!(out.status, StepStatus::Ok);
        assert_eq!(out.writes["subject"], "Ceramic motorcycle brake pads");
    }

    #[tokio::test]
    async fn test_keeps_subject_on_failure() {
        let ports = ports_with(FailingModel::new(), StaticSearch::new(), RecordingSink::new());
        let snap = Context::with_subject("brake pads").snapshot();
        let out = run_isolated(&RefineSubject, &snap, &ports).await.unwrap();
        assert_eq!(out.status, StepStatus::Degraded);
        assert_eq!(out.writes["subject"], "brake pads");
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let model = FailingModel::timing_out();
        let ports = ports_with(model.clone(), StaticSearch::new(), RecordingSink::new());
        let snap = Context::with_subject("brake pads").snapshot();
        let out = run_isolated(&RefineSubject, &snap, &ports).await.unwrap();
        assert_eq!(out.status, StepStatus::Degraded);
        assert_eq!(out.writes["subject"], "brake pads");
        assert!(out.message.as_deref().unwrap().contains("timeout after 60s"));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_blank_reply_is_degraded() {
        let ports = ports_with(
            ScriptedModel::new().otherwise("Refined product line:"),
            StaticSearch::new(),
            RecordingSink::new(),
        );
        let snap = Context::with_subject("brake pads").snapshot();
        let out = run_isolated(&RefineSubject, &snap, &ports).await.unwrap();
        assert_eq!(out.status, StepStatus::Degraded);
        assert_eq!(out.writes["subject"], "brake pads");
        assert!(out.message.as_deref().unwrap().starts_with("Response parse error"));
    }
}
