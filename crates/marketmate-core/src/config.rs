use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// Upper bound on the competitor list, whatever the config says.
pub const MAX_COMPETITORS: usize = 10;
/// Upper bound on the trend list, whatever the config says.
pub const MAX_TRENDS: usize = 5;

/// Top-level MarketMate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_workspace")]
    pub workspace: String,
    pub model: ModelConfig,
    #[serde(default)]
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Run logging; off when the section is absent.
    #[serde(default)]
    pub log: Option<LogConfig>,
}

fn default_workspace() -> String { "~/.marketmate".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-request timeout. A call that exceeds it fails with a provider timeout.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
    /// Extra HTTP headers sent with every request (set by presets or user).
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_provider() -> String { "gemini".to_string() }
fn default_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f32 { 0.0 }
fn default_model_timeout() -> u64 { 60 }

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    pub api_key: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_search_provider() -> String { "serpapi".to_string() }
fn default_max_results() -> usize { 5 }
fn default_search_timeout() -> u64 { 30 }

/// Snapshot persistence backend.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackend {
    /// One pretty-printed JSON file per subject.
    #[default]
    File,
    /// A single SQLite database with one row per subject.
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: MemoryBackend,
    /// Directory for snapshot data. Default: <workspace>/data
    #[serde(default)]
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_enabled")]
    pub enabled: bool,
    /// Directory for rendered reports. Default: <workspace>/reports
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: None,
        }
    }
}

fn default_report_enabled() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Region used by competitor discovery when the caller gives none
    /// (e.g., "Madhya Pradesh, India").
    #[serde(default)]
    pub default_region: Option<String>,
    /// Seed for the synthetic forecast generator.
    #[serde(default = "default_forecast_seed")]
    pub forecast_seed: u64,
    #[serde(default = "default_max_competitors")]
    pub max_competitors: usize,
    #[serde(default = "default_max_trends")]
    pub max_trends: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_region: None,
            forecast_seed: default_forecast_seed(),
            max_competitors: default_max_competitors(),
            max_trends: default_max_trends(),
        }
    }
}

impl PipelineConfig {
    /// Competitor cap, clamped to `MAX_COMPETITORS`.
    pub fn competitor_cap(&self) -> usize {
        self.max_competitors.clamp(1, MAX_COMPETITORS)
    }

    /// Trend cap, clamped to `MAX_TRENDS`.
    pub fn trend_cap(&self) -> usize {
        self.max_trends.clamp(1, MAX_TRENDS)
    }
}

fn default_forecast_seed() -> u64 { 42 }
fn default_max_competitors() -> usize { MAX_COMPETITORS }
fn default_max_trends() -> usize { MAX_TRENDS }

/// JSONL run logging configuration. Only present sections turn logging on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Enable run logging (default: true when section is present).
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// Directory for log files. Default: <workspace>/logs
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Logging level: 1 = run summary only, 2 = per-step results, 3 = step starts too (default: 2).
    #[serde(default = "default_log_level")]
    pub level: u8,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_dir: None,
            level: 2,
        }
    }
}

fn default_log_enabled() -> bool { true }
fn default_log_level() -> u8 { 2 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| MarketError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse config text, expanding `${ENV_VAR}` references first.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| MarketError::Config(e.to_string()))
    }

    /// Build a config from well-known environment variables.
    ///
    /// `GOOGLE_API_KEY` selects Gemini, then `OPENAI_API_KEY` selects OpenAI,
    /// otherwise a local Ollama model. `SERPAPI_API_KEY` or `TAVILY_API_KEY`
    /// enables search.
    pub fn from_env() -> Self {
        let env = |k: &str| std::env::var(k).ok().filter(|v| !v.is_empty());

        let (provider, model_id, api_key, base_url) = if let Some(key) = env("GOOGLE_API_KEY") {
            ("gemini", "gemini-2.0-flash", Some(key), None)
        } else if let Some(key) = env("OPENAI_API_KEY") {
            ("openai", "gpt-4o-mini", Some(key), None)
        } else {
            (
                "ollama",
                "llama3.2",
                None,
                Some("http://localhost:11434/v1/chat/completions".to_string()),
            )
        };

        let search = if let Some(key) = env("SERPAPI_API_KEY") {
            Some(SearchConfig {
                provider: "serpapi".into(),
                api_key: key,
                max_results: default_max_results(),
                timeout_secs: default_search_timeout(),
            })
        } else {
            env("TAVILY_API_KEY").map(|key| SearchConfig {
                provider: "tavily".into(),
                api_key: key,
                max_results: default_max_results(),
                timeout_secs: default_search_timeout(),
            })
        };

        Self {
            workspace: default_workspace(),
            model: ModelConfig {
                provider: provider.to_string(),
                model_id: model_id.to_string(),
                api_key,
                base_url,
                max_tokens: default_max_tokens(),
                temperature: default_temperature(),
                timeout_secs: default_model_timeout(),
                extra_headers: HashMap::new(),
            },
            search,
            memory: MemoryConfig::default(),
            report: ReportConfig::default(),
            pipeline: PipelineConfig::default(),
            log: None,
        }
    }

    /// Resolve the workspace directory (expand ~).
    pub fn workspace_dir(&self) -> PathBuf {
        expand_home(&self.workspace)
    }

    /// Directory holding snapshot data.
    pub fn data_dir(&self) -> PathBuf {
        match self.memory.data_dir {
            Some(ref dir) => expand_home(dir),
            None => self.workspace_dir().join("data"),
        }
    }

    /// Directory receiving rendered reports.
    pub fn report_dir(&self) -> PathBuf {
        match self.report.output_dir {
            Some(ref dir) => expand_home(dir),
            None => self.workspace_dir().join("reports"),
        }
    }

    /// Directory receiving JSONL run logs.
    pub fn log_dir(&self) -> PathBuf {
        match self.log.as_ref().and_then(|l| l.log_dir.as_ref()) {
            Some(dir) => expand_home(dir),
            None => self.workspace_dir().join("logs"),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_MARKETMATE_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_MARKETMATE_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_MARKETMATE_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_MARKETMATE_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_MARKETMATE_VAR}\"");
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let toml_str = r#"
[model]
model_id = "gemini-2.0-flash"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model.provider, "gemini");
        assert_eq!(config.model.timeout_secs, 60);
        assert!(config.search.is_none());
        assert_eq!(config.memory.backend, MemoryBackend::File);
        assert!(config.report.enabled);
        assert_eq!(config.pipeline.forecast_seed, 42);
        assert_eq!(config.pipeline.competitor_cap(), 10);
        assert_eq!(config.pipeline.trend_cap(), 5);
        assert!(config.log.is_none());
    }

    #[test]
    fn test_log_section_presence_enables_logging() {
        let toml_str = r#"
[model]
model_id = "gemini-2.0-flash"

[log]
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let log = config.log.unwrap();
        assert!(log.enabled);
        assert_eq!(log.level, 2);

        let toml_str = r#"
[model]
model_id = "gemini-2.0-flash"

[log]
enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.log.unwrap().enabled);
    }

    #[test]
    fn test_caps_are_clamped() {
        let toml_str = r#"
[model]
model_id = "gpt-4o-mini"

[pipeline]
max_competitors = 50
max_trends = 0
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pipeline.competitor_cap(), MAX_COMPETITORS);
        assert_eq!(config.pipeline.trend_cap(), 1);
    }

    #[test]
    fn test_sqlite_backend_and_dirs() {
        let toml_str = r#"
workspace = "/tmp/mm"

[model]
model_id = "gpt-4o-mini"

[memory]
backend = "sqlite"

[report]
output_dir = "/tmp/mm-reports"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.memory.backend, MemoryBackend::Sqlite);
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/mm/data"));
        assert_eq!(config.report_dir(), PathBuf::from("/tmp/mm-reports"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/mm/logs"));
    }
}
