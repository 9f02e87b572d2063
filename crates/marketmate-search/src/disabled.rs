use futures::future::BoxFuture;

use marketmate_core::error::{MarketError, Result};
use marketmate_core::traits::SearchProvider;
use marketmate_core::types::{Article, Snippet};

/// Stand-in provider used when search is not configured. Every call fails.
pub struct DisabledSearch {
    reason: String,
}

impl DisabledSearch {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SearchProvider for DisabledSearch {
    fn name(&self) -> &str {
        "disabled"
    }

    fn search(&self, _query: &str) -> BoxFuture<'_, Result<Vec<Snippet>>> {
        Box::pin(async move { Err(MarketError::provider("search", self.reason.clone())) })
    }

    fn news_search(&self, _query: &str) -> BoxFuture<'_, Result<Vec<Article>>> {
        Box::pin(async move { Err(MarketError::provider("search", self.reason.clone())) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_fails() {
        let s = DisabledSearch::new("no [search] section configured");
        let err = s.search("brake pads").await.unwrap_err();
        assert!(err.is_provider());
        assert!(err.to_string().contains("no [search]"));
        assert!(s.news_search("brake pads").await.is_err());
    }
}
