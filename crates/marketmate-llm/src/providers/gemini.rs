use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use marketmate_core::config::ModelConfig;
use marketmate_core::error::{MarketError, Result};
use marketmate_core::traits::ModelInvoker;

use crate::streaming::{collect_text, SseEvent, SseStream};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Google Gemini native API invoker.
pub struct GeminiInvoker {
    http: Client,
    config: ModelConfig,
}

impl GeminiInvoker {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: marketmate_core::http::client(config.timeout_secs),
            config,
        }
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    #[serde(default)]
    message: String,
}

pub(crate) fn parse_gemini_chunk(event: &SseEvent) -> Result<Option<String>> {
    if event.data.trim() == "[DONE]" {
        return Ok(None);
    }

    match serde_json::from_str::<GeminiStreamChunk>(&event.data) {
        Ok(chunk) => {
            if let Some(err) = chunk.error {
                return Err(MarketError::provider("gemini", err.message));
            }

            let Some(candidate) = chunk.candidates.into_iter().next() else {
                return Ok(None);
            };
            if candidate.finish_reason.as_deref() == Some("SAFETY") {
                warn!("Gemini response blocked by safety filter");
            }

            let text: String = candidate
                .content
                .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                .unwrap_or_default();
            Ok(Some(text).filter(|t| !t.is_empty()))
        }
        Err(e) => {
            warn!(data = %event.data, error = %e, "Failed to parse Gemini SSE chunk");
            Ok(None)
        }
    }
}

impl ModelInvoker for GeminiInvoker {
    fn name(&self) -> &str {
        "gemini"
    }

    fn invoke(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        let prompt = prompt.to_string();

        Box::pin(async move {
            let config = &self.config;
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| MarketError::Config("Gemini: api_key is required".into()))?;

            let base = config.base_url.as_deref().unwrap_or(GEMINI_API_BASE);
            let url = format!(
                "{}/{}:streamGenerateContent?alt=sse&key={}",
                base.trim_end_matches('/'),
                config.model_id,
                api_key
            );

            let body = GeminiRequest {
                contents: vec![GeminiContent {
                    role: Some("user".to_string()),
                    parts: vec![GeminiPart { text: Some(prompt) }],
                }],
                generation_config: Some(GenerationConfig {
                    max_output_tokens: Some(config.max_tokens),
                    temperature: if config.temperature > 0.0 {
                        Some(config.temperature)
                    } else {
                        None
                    },
                }),
            };

            let response = self
                .http
                .post(&url)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| marketmate_core::http::request_error("gemini", config.timeout_secs, e))?;

            if !response.status().is_success() {
                return Err(marketmate_core::http::status_error("gemini", response).await);
            }

            let events = SseStream::new(response.bytes_stream());
            let text =
                collect_text("gemini", config.timeout_secs, events, parse_gemini_chunk).await?;
            debug!(model = %config.model_id, chars = text.len(), "Gemini response received");
            Ok(text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(data: &str) -> SseEvent {
        SseEvent {
            event_type: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_parse_candidate_text() {
        let e = event(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Motorcycle "},{"text":"brake pads"}]}}]}"#,
        );
        assert_eq!(
            parse_gemini_chunk(&e).unwrap().as_deref(),
            Some("Motorcycle brake pads")
        );
    }

    #[test]
    fn test_parse_error_payload() {
        let e = event(r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#);
        let err = parse_gemini_chunk(&e).unwrap_err();
        assert!(err.is_provider());
        assert!(err.to_string().contains("exhausted"));
    }

    #[test]
    fn test_parse_usage_only_chunk() {
        let e = event(r#"{"usageMetadata":{"promptTokenCount":12}}"#);
        assert!(parse_gemini_chunk(&e).unwrap().is_none());
    }
}
