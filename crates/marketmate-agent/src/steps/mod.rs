//! The six analysis steps, in pipeline order.

pub mod advise;
pub mod competitors;
pub mod forecast;
pub mod refine;
pub mod reviews;
pub mod trends;

use std::sync::Arc;

use serde_json::Value;

use marketmate_core::config::PipelineConfig;

use crate::context::Writes;
use crate::step::Step;

pub use advise::AdviseAndReport;
pub use competitors::{merge_by_priority, FindCompetitors};
pub use forecast::ForecastStep;
pub use refine::RefineSubject;
pub use reviews::AnalyzeReviews;
pub use trends::ExtractTrends;

/// The standard step list.
pub fn default_steps(config: &PipelineConfig) -> Vec<Arc<dyn Step>> {
    vec![
        Arc::new(RefineSubject),
        Arc::new(FindCompetitors::new(
            config.default_region.clone(),
            config.competitor_cap(),
        )),
        Arc::new(AnalyzeReviews),
        Arc::new(ExtractTrends::new(config.trend_cap())),
        Arc::new(ForecastStep::new(config.forecast_seed)),
        Arc::new(AdviseAndReport),
    ]
}

/// Single-key writes.
pub(crate) fn single(key: &str, value: Value) -> Writes {
    let mut writes = Writes::new();
    writes.insert(key.to_string(), value);
    writes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let steps = default_steps(&PipelineConfig::default());
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "refine_subject",
                "find_competitors",
                "analyze_reviews",
                "extract_trends",
                "forecast",
                "advise_and_report",
            ]
        );
    }

    #[test]
    fn test_declared_writes_cover_outputs() {
        let steps = default_steps(&PipelineConfig::default());
        let mut writes: Vec<&str> = steps.iter().flat_map(|s| s.writes().to_vec()).collect();
        writes.sort();
        assert_eq!(
            writes,
            vec![
                "competitors",
                "forecast",
                "recommendations",
                "report",
                "reviews",
                "subject",
                "trends",
            ]
        );
    }
}
