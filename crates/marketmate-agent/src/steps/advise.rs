use futures::future::BoxFuture;
use serde_json::Value;
use tracing::warn;

use marketmate_core::error::Result;

use crate::context::{keys, ContextSnapshot, Writes};
use crate::step::{Ports, Step, StepOutput};

/// Synthesize recommendations from everything gathered, then render the report.
pub struct AdviseAndReport;

fn list_or(value: Option<&Value>, empty: &str) -> String {
    let items: Vec<&str> = value
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

fn historical_context(ctx: &ContextSnapshot) -> String {
    match ctx.get(keys::HISTORICAL) {
        Some(h) if h.is_object() => format!(
            "Previous analysis ({}):\n- Trends: {}\n- Sentiment: {}\n- Competitors: {}",
            h["date"].as_str().unwrap_or("unknown date"),
            list_or(h.get("trends"), "N/A"),
            h["reviews"]["sentiment"].as_str().unwrap_or("N/A"),
            list_or(h.get("competitors"), "N/A"),
        ),
        _ => "No historical data available for comparison.".to_string(),
    }
}

fn forecast_insights(ctx: &ContextSnapshot) -> String {
    let Some(f) = ctx.get(keys::FORECAST).filter(|f| f.as_object().is_some_and(|o| !o.is_empty()))
    else {
        return "No predictive analytics available.".to_string();
    };
    let count = |key: &str| f[key].as_array().map(|a| a.len()).unwrap_or(0);
    let high_risk: Vec<&str> = f["competitor_strategies"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter(|c| c["risk_level"] == "High")
                .filter_map(|c| c["competitor"].as_str())
                .collect()
        })
        .unwrap_or_default();

    format!(
        "- Sales forecast: {} months ahead\n\
         - Market growth: {} periods projected\n\
         - Competitor strategies: {} competitors analyzed (high risk: {})\n\
         - Price trends: {} months\n\
         - Seasonal analysis: {} quarters",
        count("sales_forecast"),
        count("market_growth"),
        count("competitor_strategies"),
        if high_risk.is_empty() {
            "none".to_string()
        } else {
            high_risk.join(", ")
        },
        count("price_trends"),
        count("seasonal_analysis"),
    )
}

fn prompt(ctx: &ContextSnapshot) -> String {
    let reviews = ctx.get(keys::REVIEWS);
    let summary = reviews
        .and_then(|r| r["summary"].as_str())
        .unwrap_or("No review data available.");
    let sentiment = reviews
        .and_then(|r| r["sentiment"].as_str())
        .unwrap_or("Mixed");
    let trends = ctx.get_strings(keys::TRENDS);

    format!(
        "You are a senior business advisor with expertise in market analysis and predictive analytics.\n\
         Provide comprehensive, actionable recommendations based on the following data.\n\n\
         Product line: {}\n\n\
         Competitors: {}\n\n\
         Customer sentiment ({}):\n{}\n\n\
         Current market trends:\n{}\n\n\
         Historical context:\n{}\n\n\
         Predictive analytics:\n{}\n\n\
         Based on this analysis, provide:\n\
         1. Executive Summary (2-3 sentences)\n\
         2. Strategic Recommendations (5-7 bullet points)\n\
         3. Risk Assessment (3-4 key risks)\n\
         4. Implementation Timeline (next 3, 6, 12 months)\n\
         5. Success Metrics (KPIs to track)",
        ctx.subject(),
        list_or(ctx.get(keys::COMPETITORS), "None identified"),
        sentiment,
        summary,
        if trends.is_empty() {
            "None identified".to_string()
        } else {
            trends.join("\n")
        },
        historical_context(ctx),
        forecast_insights(ctx),
    )
}

/// Recommendations used when the model is unavailable.
pub fn basic_recommendations(subject: &str, competitors: &[String]) -> String {
    let focus = if competitors.is_empty() {
        "No competitors identified".to_string()
    } else {
        competitors.join(", ")
    };
    format!(
        "Based on the analysis of {}, here are key recommendations:\n\n\
         1. Market Analysis: Focus on the identified competitors: {}\n\
         2. Strategic Positioning: Develop unique value propositions to differentiate from competitors\n\
         3. Customer Focus: Implement customer feedback mechanisms to improve product quality\n\
         4. Market Expansion: Explore new market segments and geographic regions\n\
         5. Technology Integration: Leverage technology to enhance product offerings\n\n\
         Note: This is a basic analysis because the language model was unavailable. \
         For comprehensive insights, make sure all data sources are configured.",
        subject, focus
    )
}

impl Step for AdviseAndReport {
    fn name(&self) -> &str {
        "advise_and_report"
    }

    fn reads(&self) -> &[&'static str] {
        &[
            keys::SUBJECT,
            keys::COMPETITORS,
            keys::REVIEWS,
            keys::TRENDS,
            keys::FORECAST,
            keys::HISTORICAL,
        ]
    }

    fn writes(&self) -> &[&'static str] {
        &[keys::RECOMMENDATIONS, keys::REPORT]
    }

    fn attempt<'a>(
        &'a self,
        ctx: &'a ContextSnapshot,
        ports: &'a Ports,
    ) -> BoxFuture<'a, Result<StepOutput>> {
        Box::pin(async move {
            let recommendations = ports.model.invoke(&prompt(ctx)).await?;
            let recommendations = recommendations.trim().to_string();

            let mut rendered = ctx.data().clone();
            rendered.insert(
                keys::RECOMMENDATIONS.to_string(),
                Value::String(recommendations.clone()),
            );

            let mut writes = Writes::new();
            writes.insert(keys::RECOMMENDATIONS.to_string(), Value::String(recommendations));

            match ports.reports.render(rendered).await {
                Ok(reference) => {
                    writes.insert(
                        keys::REPORT.to_string(),
                        reference.map(Value::String).unwrap_or(Value::Null),
                    );
                    Ok(StepOutput::ok(writes))
                }
                Err(e) => {
                    warn!(error = %e, "Report rendering failed");
                    writes.insert(keys::REPORT.to_string(), Value::Null);
                    Ok(StepOutput::degraded(writes, format!("report: {}", e)))
                }
            }
        })
    }

    fn fallback(&self, ctx: &ContextSnapshot) -> Result<Writes> {
        let mut writes = Writes::new();
        writes.insert(
            keys::RECOMMENDATIONS.to_string(),
            Value::String(basic_recommendations(
                ctx.subject(),
                &ctx.get_strings(keys::COMPETITORS),
            )),
        );
        writes.insert(keys::REPORT.to_string(), Value::Null);
        Ok(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::step::run_isolated;
    use marketmate_core::types::StepStatus;
    use crate::step::ports_with;
    use marketmate_test_utils::{
        FailingModel, FailingSink, RecordingSink, ScriptedModel, StaticSearch,
    };
    use serde_json::json;

    fn context() -> Context {
        let mut ctx = Context::with_subject("brake pads");
        ctx.set(keys::COMPETITORS, json!(["Brembo", "EBC Brakes"]));
        ctx.set(keys::TRENDS, json!(["Sintered compounds"]));
        ctx.set(
            keys::HISTORICAL,
            json!({"date": "2024-06-24", "competitors": ["Brembo"], "reviews": {"sentiment": "Positive"}, "trends": ["Old trend"]}),
        );
        ctx
    }

    #[test]
    fn test_prompt_includes_history() {
        let p = prompt(&context().snapshot());
        assert!(p.contains("Brembo, EBC Brakes"));
        assert!(p.contains("Previous analysis (2024-06-24)"));
        assert!(p.contains("Old trend"));
        assert!(p.contains("No predictive analytics available."));
    }

    #[tokio::test]
    async fn test_renders_report() {
        let sink = RecordingSink::new();
        let ports = ports_with(
            ScriptedModel::new().otherwise("Expand into sintered pads."),
            StaticSearch::new(),
            sink.clone(),
        );
        let out = run_isolated(&AdviseAndReport, &context().snapshot(), &ports)
            .await
            .unwrap();
        assert_eq!(out.status, StepStatus::Ok);
        assert_eq!(out.writes["recommendations"], "Expand into sintered pads.");
        assert!(out.writes["report"].is_string());

        let rendered = sink.rendered();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0]["recommendations"], "Expand into sintered pads.");
    }

    #[tokio::test]
    async fn test_model_failure_uses_basic_recommendations() {
        let ports = ports_with(FailingModel::new(), StaticSearch::new(), RecordingSink::new());
        let out = run_isolated(&AdviseAndReport, &context().snapshot(), &ports)
            .await
            .unwrap();
        assert_eq!(out.status, StepStatus::Degraded);
        assert!(out.writes["recommendations"]
            .as_str()
            .unwrap()
            .contains("Brembo, EBC Brakes"));
        assert!(out.writes["report"].is_null());
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_recommendations() {
        let ports = ports_with(
            ScriptedModel::new().otherwise("Expand into sintered pads."),
            StaticSearch::new(),
            FailingSink::new(),
        );
        let out = run_isolated(&AdviseAndReport, &context().snapshot(), &ports)
            .await
            .unwrap();
        assert_eq!(out.status, StepStatus::Degraded);
        assert_eq!(out.writes["recommendations"], "Expand into sintered pads.");
        assert!(out.writes["report"].is_null());
    }
}
