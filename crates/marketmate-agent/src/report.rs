use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::path::PathBuf;

use chrono::{Local, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::info;

use marketmate_core::config::AppConfig;
use marketmate_core::error::{MarketError, Result};
use marketmate_core::traits::ReportSink;
use marketmate_memory::normalize_key;

use crate::context::keys;

/// Writes a plain-text market analysis report per run.
pub struct TextReportSink {
    output_dir: PathBuf,
    enabled: bool,
}

impl TextReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            enabled: true,
        }
    }

    /// A sink that renders nothing.
    pub fn disabled() -> Self {
        Self {
            output_dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        if config.report.enabled {
            Self::new(config.report_dir())
        } else {
            Self::disabled()
        }
    }
}

fn heading(out: &mut impl Write, title: &str) -> fmt::Result {
    write!(out, "\n{}\n{}\n", title, "-".repeat(title.len()))
}

fn strings(value: Option<&Value>) -> Vec<&str> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default()
}

/// Render the report text for a final context.
pub fn render_text(ctx: &BTreeMap<String, Value>, date: &str) -> Result<String> {
    let mut out = String::new();
    write_report(&mut out, ctx, date)
        .map_err(|e| MarketError::Report(format!("render report: {}", e)))?;
    Ok(out)
}

fn write_report(out: &mut impl Write, ctx: &BTreeMap<String, Value>, date: &str) -> fmt::Result {
    let subject = ctx
        .get(keys::SUBJECT)
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    writeln!(out, "MARKET ANALYSIS REPORT")?;
    writeln!(out, "======================")?;
    writeln!(out, "\nTitle: Market Analysis Report for {}", subject)?;
    writeln!(out, "Date: {}", date)?;
    writeln!(out, "Product Line: {}", subject)?;

    heading(out, "COMPETITOR OVERVIEW")?;
    let competitors = strings(ctx.get(keys::COMPETITORS));
    if competitors.is_empty() {
        writeln!(out, "No competitors identified.")?;
    } else {
        writeln!(out, "Top Competitors: {}", competitors.join(", "))?;
    }

    heading(out, "REVIEW SUMMARY")?;
    let reviews = ctx.get(keys::REVIEWS).unwrap_or(&Value::Null);
    writeln!(
        out,
        "Overall Sentiment: {}",
        reviews["sentiment"].as_str().unwrap_or("N/A")
    )?;
    writeln!(out, "Summary: {}", reviews["summary"].as_str().unwrap_or("N/A"))?;

    heading(out, "MARKET TRENDS")?;
    let trends = strings(ctx.get(keys::TRENDS));
    if trends.is_empty() {
        writeln!(out, "No trends identified.")?;
    }
    for trend in trends {
        writeln!(out, "• {}", trend)?;
    }

    heading(out, "HISTORICAL COMPARISON")?;
    match ctx.get(keys::HISTORICAL).filter(|h| h.is_object()) {
        Some(h) => {
            writeln!(out, "Previous run: {}", h["date"].as_str().unwrap_or("N/A"))?;
            let prior = strings(h.get("trends"));
            if prior.is_empty() {
                writeln!(out, "• Trends: N/A")?;
            } else {
                writeln!(out, "• Trends: {}", prior.join(", "))?;
            }
            writeln!(
                out,
                "• Sentiment: {}",
                h["reviews"]["sentiment"].as_str().unwrap_or("N/A")
            )?;
        }
        None => writeln!(out, "No previous analysis for this subject.")?,
    }

    heading(out, "FORECAST HIGHLIGHTS")?;
    let forecast = ctx.get(keys::FORECAST).unwrap_or(&Value::Null);
    match forecast["sales_forecast"].as_array().and_then(|a| a.last()) {
        Some(last) => writeln!(
            out,
            "Projected sales in {}: {}",
            last["month"].as_str().unwrap_or("?"),
            last["predicted_sales"]
        )?,
        None => writeln!(out, "No forecast available.")?,
    }
    for season in forecast["seasonal_analysis"].as_array().into_iter().flatten() {
        writeln!(
            out,
            "• {}: {}",
            season["season"].as_str().unwrap_or("?"),
            season["recommendation"].as_str().unwrap_or("?")
        )?;
    }

    heading(out, "FINAL RECOMMENDATIONS")?;
    writeln!(
        out,
        "{}",
        ctx.get(keys::RECOMMENDATIONS)
            .and_then(|v| v.as_str())
            .unwrap_or("No recommendations.")
    )?;

    writeln!(out, "\n======================")?;
    writeln!(
        out,
        "Report generated on: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

impl ReportSink for TextReportSink {
    fn render(&self, context: BTreeMap<String, Value>) -> BoxFuture<'_, Result<Option<String>>> {
        Box::pin(async move {
            if !self.enabled {
                return Ok(None);
            }

            let subject = context
                .get(keys::SUBJECT)
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let date = Utc::now().format("%Y-%m-%d").to_string();
            let path = self.output_dir.join(format!(
                "market_report_{}_{}.txt",
                normalize_key(subject),
                date
            ));

            tokio::fs::create_dir_all(&self.output_dir)
                .await
                .map_err(|e| MarketError::Report(format!("create report dir: {}", e)))?;
            let text = render_text(&context, &date)?;
            tokio::fs::write(&path, text)
                .await
                .map_err(|e| MarketError::Report(format!("write {}: {}", path.display(), e)))?;

            info!(path = %path.display(), "Report written");
            Ok(Some(path.display().to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn final_context() -> BTreeMap<String, Value> {
        let mut ctx = BTreeMap::new();
        ctx.insert("subject".into(), json!("Brake Pads"));
        ctx.insert("competitors".into(), json!(["Brembo", "EBC Brakes"]));
        ctx.insert(
            "reviews".into(),
            json!({"sentiment": "Positive", "summary": "Strong bite."}),
        );
        ctx.insert("trends".into(), json!(["Sintered compounds"]));
        ctx.insert("recommendations".into(), json!("Expand online."));
        ctx.insert("forecast".into(), json!({}));
        ctx
    }

    #[test]
    fn test_render_sections() {
        let text = render_text(&final_context(), "2024-07-01").unwrap();
        for section in [
            "COMPETITOR OVERVIEW",
            "REVIEW SUMMARY",
            "MARKET TRENDS",
            "HISTORICAL COMPARISON",
            "FORECAST HIGHLIGHTS",
            "FINAL RECOMMENDATIONS",
        ] {
            assert!(text.contains(section), "missing {}", section);
        }
        assert!(text.contains("Top Competitors: Brembo, EBC Brakes"));
        assert!(text.contains("• Sintered compounds"));
        assert!(text.contains("No previous analysis"));
        assert!(text.contains("No forecast available."));
    }

    #[test]
    fn test_render_history_and_forecast() {
        let mut ctx = final_context();
        ctx.insert(
            "historical".into(),
            json!({"date": "2024-06-01", "trends": ["Ceramic"], "reviews": {"sentiment": "Mixed"}}),
        );
        ctx.insert(
            "forecast".into(),
            json!({
                "sales_forecast": [{"month": "2024-08", "predicted_sales": 1200}],
                "seasonal_analysis": [{"season": "Monsoon", "recommendation": "Stock wet-weather pads"}]
            }),
        );
        let text = render_text(&ctx, "2024-07-01").unwrap();
        assert!(text.contains("Previous run: 2024-06-01"));
        assert!(text.contains("• Trends: Ceramic"));
        assert!(text.contains("• Sentiment: Mixed"));
        assert!(text.contains("Projected sales in 2024-08: 1200"));
        assert!(text.contains("• Monsoon: Stock wet-weather pads"));
    }

    #[tokio::test]
    async fn test_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = TextReportSink::new(dir.path().join("reports"));
        let path = sink.render(final_context()).await.unwrap().unwrap();
        assert!(path.contains("market_report_brake_pads_"));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("Expand online."));
    }

    #[tokio::test]
    async fn test_disabled_returns_none() {
        let sink = TextReportSink::disabled();
        assert!(sink.render(final_context()).await.unwrap().is_none());
    }
}
