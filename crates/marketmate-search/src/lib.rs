pub mod disabled;
pub mod serpapi;
pub mod tavily;

use std::sync::Arc;

use marketmate_core::config::SearchConfig;
use marketmate_core::http::{request_error, status_error};
use marketmate_core::traits::SearchProvider;

pub use disabled::DisabledSearch;
pub use serpapi::SerpApiSearch;
pub use tavily::TavilySearch;

/// Create a search provider from the `[search]` config section.
///
/// Without a section every query fails, which the pipeline turns into
/// degraded steps rather than a failed run.
pub fn create_search_provider(config: Option<&SearchConfig>) -> Arc<dyn SearchProvider> {
    match config {
        None => Arc::new(DisabledSearch::new("no [search] section configured")),
        Some(cfg) if cfg.api_key.trim().is_empty() => {
            Arc::new(DisabledSearch::new("search api_key is empty"))
        }
        Some(cfg) => match cfg.provider.as_str() {
            "serpapi" | "google" => Arc::new(SerpApiSearch::new(cfg.clone())),
            "tavily" => Arc::new(TavilySearch::new(cfg.clone())),
            other => Arc::new(DisabledSearch::new(format!(
                "unknown search provider: {}",
                other
            ))),
        },
    }
}

/// Send a request and decode a JSON body, mapping every failure to a provider error.
pub(crate) async fn send_json(
    provider: &str,
    timeout_secs: u64,
    req: reqwest::RequestBuilder,
) -> marketmate_core::Result<serde_json::Value> {
    let resp = req
        .send()
        .await
        .map_err(|e| request_error(provider, timeout_secs, e))?;

    if !resp.status().is_success() {
        return Err(status_error(provider, resp).await);
    }

    resp.json()
        .await
        .map_err(|e| request_error(provider, timeout_secs, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(provider: &str, key: &str) -> SearchConfig {
        SearchConfig {
            provider: provider.to_string(),
            api_key: key.to_string(),
            max_results: 5,
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_provider_selection() {
        assert_eq!(create_search_provider(None).name(), "disabled");
        assert_eq!(create_search_provider(Some(&cfg("serpapi", "k"))).name(), "serpapi");
        assert_eq!(create_search_provider(Some(&cfg("tavily", "k"))).name(), "tavily");
        assert_eq!(create_search_provider(Some(&cfg("tavily", " "))).name(), "disabled");
        assert_eq!(create_search_provider(Some(&cfg("bing", "k"))).name(), "disabled");
    }
}
