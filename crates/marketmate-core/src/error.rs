use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketError {
    // Collaborator errors
    #[error("Provider request failed: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("Provider timeout after {timeout_secs}s: {provider}")]
    ProviderTimeout { provider: String, timeout_secs: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Report error: {0}")]
    Report(String),

    // Input errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Response parse error: {0}")]
    Parse(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MarketError {
    /// Shorthand for a provider failure.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// True for any failure of an external collaborator (model, search, store, report).
    pub fn is_provider(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::ProviderTimeout { .. } | Self::Storage(_) | Self::Report(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
