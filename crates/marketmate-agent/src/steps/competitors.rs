use std::collections::HashSet;

use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use tracing::{debug, warn};

use marketmate_core::error::Result;
use marketmate_core::types::Snippet;

use super::single;
use crate::context::{keys, ContextSnapshot, Writes};
use crate::parse::parse_name_list;
use crate::step::{Ports, Step, StepOutput};

/// Search priority tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub label: &'static str,
    pub scope: Option<String>,
    pub query: String,
}

/// Build the search tiers for a subject, highest priority first.
///
/// A region yields a local tier; a comma-separated region with at least two
/// parts also yields a country tier from its last part. The global tier is
/// always present.
pub fn build_tiers(subject: &str, region: Option<&str>) -> Vec<Tier> {
    let mut tiers = Vec::new();
    let region = region.map(str::trim).filter(|r| !r.is_empty());

    if let Some(region) = region {
        tiers.push(Tier {
            label: "local",
            scope: Some(region.to_string()),
            query: format!("top {} competitors in {}", subject, region),
        });

        let parts: Vec<&str> = region
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() >= 2 {
            if let Some(country) = parts.last() {
                tiers.push(Tier {
                    label: "country",
                    scope: Some(country.to_string()),
                    query: format!("top {} companies in {}", subject, country),
                });
            }
        }
    }

    tiers.push(Tier {
        label: "global",
        scope: None,
        query: format!("top competitors for {}", subject),
    });
    tiers
}

/// Concatenate tiers in priority order, drop case-insensitive duplicates
/// keeping the first spelling, and keep at most `cap` names.
pub fn merge_by_priority(tiers: &[Vec<String>], cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    tiers
        .iter()
        .flatten()
        .filter(|name| seen.insert(name.to_lowercase()))
        .take(cap)
        .cloned()
        .collect()
}

fn prompt(subject: &str, tier: &Tier, snippets: &[Snippet]) -> String {
    let scope = match tier.scope {
        Some(ref s) => format!("Only include companies based in {}.", s),
        None => "Companies may be based anywhere.".to_string(),
    };
    let results: Vec<String> = snippets.iter().map(Snippet::render).collect();
    format!(
        "You are selecting real company competitors for the product line \"{}\" \
         using the web search snippets below.\n\
         Tier: {}\n\
         {}\n\
         Output only company names, comma-separated. Do not include locations or descriptions.\n\n\
         {}\n\n\
         Return:\nCompetitors:",
        subject,
        tier.label,
        scope,
        results.join("\n\n")
    )
}

/// Find competitors with region-first priority.
pub struct FindCompetitors {
    default_region: Option<String>,
    cap: usize,
}

impl FindCompetitors {
    pub fn new(default_region: Option<String>, cap: usize) -> Self {
        Self {
            default_region,
            cap,
        }
    }

    async fn run_tier(&self, subject: &str, tier: &Tier, ports: &Ports) -> Result<Vec<String>> {
        let snippets = ports.search.search(&tier.query).await?;
        if snippets.is_empty() {
            debug!(tier = tier.label, "No search results for tier");
            return Ok(Vec::new());
        }
        let reply = ports.model.invoke(&prompt(subject, tier, &snippets)).await?;
        Ok(parse_name_list(&reply))
    }
}

impl Step for FindCompetitors {
    fn name(&self) -> &str {
        "find_competitors"
    }

    fn reads(&self) -> &[&'static str] {
        &[keys::SUBJECT, keys::REGION]
    }

    fn writes(&self) -> &[&'static str] {
        &[keys::COMPETITORS]
    }

    fn attempt<'a>(
        &'a self,
        ctx: &'a ContextSnapshot,
        ports: &'a Ports,
    ) -> BoxFuture<'a, Result<StepOutput>> {
        Box::pin(async move {
            let subject = ctx.subject();
            let region = ctx
                .get_str(keys::REGION)
                .or(self.default_region.as_deref());
            let tiers = build_tiers(subject, region);

            let outcomes = join_all(tiers.iter().map(|t| self.run_tier(subject, t, ports))).await;

            let mut lists = Vec::with_capacity(tiers.len());
            let mut failures = Vec::new();
            for (tier, outcome) in tiers.iter().zip(outcomes) {
                match outcome {
                    Ok(names) => {
                        debug!(tier = tier.label, found = names.len(), "Tier complete");
                        lists.push(names);
                    }
                    Err(e) => {
                        warn!(tier = tier.label, error = %e, "Competitor tier failed");
                        failures.push(format!("{}: {}", tier.label, e));
                        lists.push(Vec::new());
                    }
                }
            }

            let merged = merge_by_priority(&lists, self.cap);
            let writes = single(
                keys::COMPETITORS,
                Value::Array(merged.into_iter().map(Value::String).collect()),
            );

            if failures.is_empty() {
                Ok(StepOutput::ok(writes))
            } else {
                Ok(StepOutput::degraded(
                    writes,
                    format!(
                        "{} of {} tiers failed ({})",
                        failures.len(),
                        tiers.len(),
                        failures.join("; ")
                    ),
                ))
            }
        })
    }

    fn fallback(&self, _ctx: &ContextSnapshot) -> Result<Writes> {
        Ok(single(keys::COMPETITORS, Value::Array(Vec::new())))
    }
}
