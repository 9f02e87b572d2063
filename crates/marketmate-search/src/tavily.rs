use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::debug;

use marketmate_core::config::SearchConfig;
use marketmate_core::error::Result;
use marketmate_core::traits::SearchProvider;
use marketmate_core::types::{Article, Snippet};

const TAVILY_URL: &str = "https://api.tavily.com/search";

pub struct TavilySearch {
    config: SearchConfig,
    http: reqwest::Client,
}

impl TavilySearch {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            http: marketmate_core::http::client(config.timeout_secs),
            config,
        }
    }

    fn request(&self, query: &str, topic: &str) -> reqwest::RequestBuilder {
        self.http.post(TAVILY_URL).json(&json!({
            "api_key": self.config.api_key,
            "query": query,
            "max_results": self.config.max_results,
            "topic": topic,
        }))
    }
}

fn results(body: &Value) -> impl Iterator<Item = &Value> {
    body["results"].as_array().into_iter().flatten()
}

pub(crate) fn parse_results(body: &Value, max: usize) -> Vec<Snippet> {
    results(body)
        .filter_map(|r| {
            Some(Snippet {
                title: r["title"].as_str()?.to_string(),
                snippet: r["content"].as_str().unwrap_or("").to_string(),
                link: r["url"].as_str().unwrap_or("").to_string(),
            })
        })
        .take(max)
        .collect()
}

/// Tavily news results carry no source name; the URL host stands in for it.
pub(crate) fn parse_news(body: &Value, max: usize) -> Vec<Article> {
    results(body)
        .filter_map(|r| {
            let link = r["url"].as_str().unwrap_or("").to_string();
            let source = link
                .split("://")
                .nth(1)
                .and_then(|rest| rest.split('/').next())
                .filter(|host| !host.is_empty())
                .map(|host| host.trim_start_matches("www.").to_string());
            Some(Article {
                title: r["title"].as_str()?.to_string(),
                source,
                link,
                date: r["published_date"].as_str().map(str::to_string),
            })
        })
        .take(max)
        .collect()
}

impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    fn search(&self, query: &str) -> BoxFuture<'_, Result<Vec<Snippet>>> {
        let req = self.request(query, "general");
        Box::pin(async move {
            let body = crate::send_json("tavily", self.config.timeout_secs, req).await?;
            let results = parse_results(&body, self.config.max_results);
            debug!(results = results.len(), "Tavily web search complete");
            Ok(results)
        })
    }

    fn news_search(&self, query: &str) -> BoxFuture<'_, Result<Vec<Article>>> {
        let req = self.request(query, "news");
        Box::pin(async move {
            let body = crate::send_json("tavily", self.config.timeout_secs, req).await?;
            let results = parse_news(&body, self.config.max_results);
            debug!(results = results.len(), "Tavily news search complete");
            Ok(results)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results() {
        let body = json!({
            "query": "motorcycle brake pads",
            "results": [
                {"title": "Best brake pads 2024", "content": "EBC and Brembo lead", "url": "https://example.com/a"},
                {"content": "untitled"}
            ]
        });
        let results = parse_results(&body, 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].snippet, "EBC and Brembo lead");
        assert_eq!(results[0].link, "https://example.com/a");
    }

    #[test]
    fn test_parse_news_source_from_host() {
        let body = json!({
            "results": [
                {"title": "Sintered pads demand", "url": "https://www.reuters.com/markets/x", "published_date": "Mon, 01 Jul 2024"}
            ]
        });
        let articles = parse_news(&body, 5);
        assert_eq!(articles[0].source.as_deref(), Some("reuters.com"));
        assert_eq!(articles[0].date.as_deref(), Some("Mon, 01 Jul 2024"));
    }

    #[test]
    fn test_no_results_key() {
        assert!(parse_results(&json!({"detail": "bad key"}), 5).is_empty());
    }
}
