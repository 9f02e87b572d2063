use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use marketmate_core::config::ModelConfig;
use marketmate_core::error::{MarketError, Result};
use marketmate_core::traits::ModelInvoker;

use crate::streaming::{collect_text, SseEvent, SseStream};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicInvoker {
    http: Client,
    config: ModelConfig,
}

impl AnthropicInvoker {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: marketmate_core::http::client(config.timeout_secs),
            config,
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

// Anthropic API response types
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum SseData {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: DeltaInfo },
    #[serde(rename = "message_delta")]
    MessageDelta { delta: MessageDeltaInfo },
    #[serde(rename = "error")]
    Error { error: ApiError },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum DeltaInfo {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct MessageDeltaInfo {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

pub(crate) fn parse_sse_text(event: &SseEvent) -> Result<Option<String>> {
    match serde_json::from_str::<SseData>(&event.data) {
        Ok(SseData::ContentBlockDelta {
            delta: DeltaInfo::TextDelta { text },
        }) => Ok(Some(text)),
        Ok(SseData::MessageDelta { delta }) => {
            if delta.stop_reason.as_deref() == Some("max_tokens") {
                warn!("Anthropic completion truncated at max_tokens");
            }
            Ok(None)
        }
        Ok(SseData::Error { error }) => Err(MarketError::provider("anthropic", error.message)),
        Ok(_) => Ok(None),
        Err(e) => {
            warn!(data = %event.data, error = %e, "Failed to parse Anthropic SSE event");
            Ok(None)
        }
    }
}

impl ModelInvoker for AnthropicInvoker {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn invoke(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        let prompt = prompt.to_string();

        Box::pin(async move {
            let config = &self.config;
            let api_key = config
                .api_key
                .as_deref()
                .ok_or_else(|| MarketError::Config("Anthropic: api_key is required".into()))?;
            let url = config.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL);

            let body = AnthropicRequest {
                model: config.model_id.clone(),
                max_tokens: config.max_tokens,
                messages: vec![ApiMessage {
                    role: "user".to_string(),
                    content: prompt,
                }],
                stream: true,
                temperature: if config.temperature > 0.0 {
                    Some(config.temperature)
                } else {
                    None
                },
            };

            let mut req = self
                .http
                .post(url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body);
            for (k, v) in &config.extra_headers {
                req = req.header(k.as_str(), v.as_str());
            }

            let response = req
                .send()
                .await
                .map_err(|e| marketmate_core::http::request_error("anthropic", config.timeout_secs, e))?;

            if !response.status().is_success() {
                return Err(marketmate_core::http::status_error("anthropic", response).await);
            }

            let events = SseStream::new(response.bytes_stream());
            let text =
                collect_text("anthropic", config.timeout_secs, events, parse_sse_text).await?;
            debug!(model = %config.model_id, chars = text.len(), "Anthropic response received");
            Ok(text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: &str, data: &str) -> SseEvent {
        SseEvent {
            event_type: Some(kind.to_string()),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_text_delta() {
        let e = event(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"EBC Brakes"}}"#,
        );
        assert_eq!(parse_sse_text(&e).unwrap().as_deref(), Some("EBC Brakes"));
    }

    #[test]
    fn test_non_text_events_ignored() {
        let ping = event("ping", r#"{"type":"ping"}"#);
        assert!(parse_sse_text(&ping).unwrap().is_none());
        let stop = event(
            "message_delta",
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":9}}"#,
        );
        assert!(parse_sse_text(&stop).unwrap().is_none());
    }

    #[test]
    fn test_error_event() {
        let e = event(
            "error",
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        let err = parse_sse_text(&e).unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }
}
