//! Recorded provider replies and search results.

use marketmate_core::types::{Article, Snippet};

pub const REFINE_REPLY: &str = "Refined product line: Motorcycle brake pads";

pub const COMPETITOR_REPLY: &str = "Competitors:\nBrembo, EBC Brakes, SBS, Galfer, brembo";

pub const REVIEW_REPLY: &str = "Riders praise the initial bite and wet-weather performance; \
a few mention squeal after bedding in.\nSentiment: Positive";

pub const TREND_REPLY: &str = "Trends:\n\
1. Shift to sintered compounds for sport bikes\n\
2. Rising demand for eco-friendly organic pads\n\
3. Online aftermarket sales growth\n\
4. Price competition from Asian manufacturers\n\
5. Smart wear sensors in premium pads\n\
6. Subscription maintenance plans";

pub const ADVICE_REPLY: &str = "Executive Summary: Focus on sintered pads for sport riders.\n\
- Partner with online retailers\n- Bundle wear sensors";

pub fn snippets(titles: &[&str]) -> Vec<Snippet> {
    titles
        .iter()
        .map(|t| Snippet::new(*t, format!("{} is a leading brake pad maker", t)))
        .collect()
}

pub fn review_snippets() -> Vec<Snippet> {
    vec![
        Snippet::new("Best brake pads 2024", "Great stopping power in the wet"),
        Snippet::new("EBC HH review", "Strong bite, some squeal"),
    ]
}

pub fn headlines() -> Vec<Article> {
    vec![
        Article::titled("Sintered brake pads gain share in sport segment"),
        Article::titled("Aftermarket parts move online"),
    ]
}
