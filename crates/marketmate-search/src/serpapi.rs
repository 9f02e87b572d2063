use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use marketmate_core::config::SearchConfig;
use marketmate_core::error::Result;
use marketmate_core::traits::SearchProvider;
use marketmate_core::types::{Article, Snippet};

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// Google results through SerpApi.
pub struct SerpApiSearch {
    config: SearchConfig,
    http: reqwest::Client,
}

impl SerpApiSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            http: marketmate_core::http::client(config.timeout_secs),
            config,
        }
    }

    fn request(&self, query: &str, news: bool) -> reqwest::RequestBuilder {
        let num = self.config.max_results.to_string();
        let mut params = vec![
            ("engine", "google"),
            ("q", query),
            ("api_key", self.config.api_key.as_str()),
            ("num", num.as_str()),
        ];
        if news {
            params.push(("tbm", "nws"));
        }
        self.http.get(SERPAPI_URL).query(&params)
    }
}

/// Pull `organic_results` out of a SerpApi response.
pub(crate) fn parse_organic(body: &Value, max: usize) -> Vec<Snippet> {
    body["organic_results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    let title = r["title"].as_str()?;
                    Some(Snippet {
                        title: title.to_string(),
                        snippet: r["snippet"].as_str().unwrap_or("").to_string(),
                        link: r["link"].as_str().unwrap_or("").to_string(),
                    })
                })
                .take(max)
                .collect()
        })
        .unwrap_or_default()
}

/// Pull `news_results` out of a SerpApi response.
///
/// `source` is a plain string on some engines and an object with a `name` on others.
pub(crate) fn parse_news(body: &Value, max: usize) -> Vec<Article> {
    body["news_results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    let title = r["title"].as_str()?;
                    let source = r["source"]
                        .as_str()
                        .or_else(|| r["source"]["name"].as_str())
                        .map(str::to_string);
                    Some(Article {
                        title: title.to_string(),
                        source,
                        link: r["link"].as_str().unwrap_or("").to_string(),
                        date: r["date"].as_str().map(str::to_string),
                    })
                })
                .take(max)
                .collect()
        })
        .unwrap_or_default()
}

impl SearchProvider for SerpApiSearch {
    fn name(&self) -> &str {
        "serpapi"
    }

    fn search(&self, query: &str) -> BoxFuture<'_, Result<Vec<Snippet>>> {
        let req = self.request(query, false);
        Box::pin(async move {
            let body = crate::send_json("serpapi", self.config.timeout_secs, req).await?;
            let results = parse_organic(&body, self.config.max_results);
            debug!(results = results.len(), "SerpApi web search complete");
            Ok(results)
        })
    }

    fn news_search(&self, query: &str) -> BoxFuture<'_, Result<Vec<Article>>> {
        let req = self.request(query, true);
        Box::pin(async move {
            let body = crate::send_json("serpapi", self.config.timeout_secs, req).await?;
            let results = parse_news(&body, self.config.max_results);
            debug!(results = results.len(), "SerpApi news search complete");
            Ok(results)
        })
    }
}
