use futures::future::BoxFuture;
use serde_json::Value;

use marketmate_core::error::{MarketError, Result};
use marketmate_core::types::Article;

use super::single;
use crate::context::{keys, ContextSnapshot, Writes};
use crate::parse::parse_bullet_list;
use crate::step::{Ports, Step, StepOutput};

/// Distil market trends from recent news headlines.
pub struct ExtractTrends {
    cap: usize,
}

impl ExtractTrends {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }
}

/// The fixed trend list used when news or the model is unavailable.
pub fn template_trends(subject: &str) -> Vec<String> {
    vec![
        format!("Growing demand for {} in digital marketplaces", subject),
        format!("Innovation in {} technology and features", subject),
        format!("Consumer preference shifting towards sustainable {}", subject),
        format!("Market consolidation in {} sector", subject),
        format!("Emerging trends in {} pricing strategies", subject),
    ]
}

fn prompt(subject: &str, articles: &[Article], cap: usize) -> String {
    let headlines: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
    format!(
        "Based on the following news headlines, summarize the key market trends, \
         technological innovations, or consumer shifts related to \"{}\".\n\
         Return a bullet-point list of the top {} trends, one per line.\n\n\
         News headlines:\n{}\n\n\
         Trends:",
        subject,
        cap,
        headlines.join("\n")
    )
}

fn to_value(trends: Vec<String>) -> Value {
    Value::Array(trends.into_iter().map(Value::String).collect())
}

impl Step for ExtractTrends {
    fn name(&self) -> &str {
        "extract_trends"
    }

    fn reads(&self) -> &[&'static str] {
        &[keys::SUBJECT]
    }

    fn writes(&self) -> &[&'static str] {
        &[keys::TRENDS]
    }

    fn attempt<'a>(
        &'a self,
        ctx: &'a ContextSnapshot,
        ports: &'a Ports,
    ) -> BoxFuture<'a, Result<StepOutput>> {
        Box::pin(async move {
            let subject = ctx.subject();
            let articles = ports.search.news_search(subject).await?;
            if articles.is_empty() {
                return Ok(StepOutput::degraded(self.fallback(ctx)?, "no news found"));
            }

            let reply = ports
                .model
                .invoke(&prompt(subject, &articles, self.cap))
                .await?;
            let trends = parse_bullet_list(&reply, self.cap);
            if trends.is_empty() {
                return Err(MarketError::Parse("model reply had no trend lines".into()));
            }

            Ok(StepOutput::ok(single(keys::TRENDS, to_value(trends))))
        })
    }

    fn fallback(&self, ctx: &ContextSnapshot) -> Result<Writes> {
        let mut trends = template_trends(ctx.subject());
        trends.truncate(self.cap);
        Ok(single(keys::TRENDS, to_value(trends)))
    }
}
