use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use marketmate_core::config::ModelConfig;
use marketmate_core::error::Result;
use marketmate_core::traits::ModelInvoker;

use crate::streaming::{collect_text, SseEvent, SseStream};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible invoker. Works with OpenAI, Ollama, Groq, OpenRouter, etc.
pub struct OpenAiInvoker {
    http: Client,
    config: ModelConfig,
}

impl OpenAiInvoker {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            http: marketmate_core::http::client(config.timeout_secs),
            config,
        }
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct OaiMessage {
    role: String,
    content: String,
}

// Response types
#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDeltaContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDeltaContent {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the text delta from one SSE chunk, if any.
pub(crate) fn parse_chunk(event: &SseEvent) -> Result<Option<String>> {
    if event.data.trim() == "[DONE]" {
        return Ok(None);
    }

    match serde_json::from_str::<StreamChunk>(&event.data) {
        Ok(chunk) => {
            let Some(choice) = chunk.choices.into_iter().next() else {
                return Ok(None);
            };
            if let Some(reason) = choice.finish_reason.as_deref() {
                if reason == "length" {
                    warn!("OpenAI completion truncated at max_tokens");
                }
            }
            Ok(choice.delta.and_then(|d| d.content).filter(|t| !t.is_empty()))
        }
        Err(e) => {
            warn!(data = %event.data, error = %e, "Failed to parse OpenAI SSE chunk");
            Ok(None)
        }
    }
}

impl ModelInvoker for OpenAiInvoker {
    fn name(&self) -> &str {
        &self.config.provider
    }

    fn invoke(&self, prompt: &str) -> BoxFuture<'_, Result<String>> {
        let prompt = prompt.to_string();

        Box::pin(async move {
            let config = &self.config;
            let provider = config.provider.as_str();
            let base_url = config.base_url.as_deref().unwrap_or(OPENAI_API_URL);

            let body = ChatRequest {
                model: config.model_id.clone(),
                messages: vec![OaiMessage {
                    role: "user".to_string(),
                    content: prompt,
                }],
                max_tokens: config.max_tokens,
                temperature: if config.temperature > 0.0 {
                    Some(config.temperature)
                } else {
                    None
                },
                stream: true,
            };

            let mut req = self.http.post(base_url).json(&body);

            if let Some(api_key) = &config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            // Apply extra headers from config (set by presets or user)
            for (k, v) in &config.extra_headers {
                req = req.header(k.as_str(), v.as_str());
            }

            let response = req
                .send()
                .await
                .map_err(|e| marketmate_core::http::request_error(provider, config.timeout_secs, e))?;

            if !response.status().is_success() {
                return Err(marketmate_core::http::status_error(provider, response).await);
            }

            let events = SseStream::new(response.bytes_stream());
            let text = collect_text(provider, config.timeout_secs, events, parse_chunk).await?;
            debug!(provider, chars = text.len(), "Model response received");
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
    fn test_parse_text_delta() {
        let e = event(r#"{"choices":[{"delta":{"content":"Brembo"},"finish_reason":null}]}"#);
        assert_eq!(parse_chunk(&e).unwrap().as_deref(), Some("Brembo"));
    }

    #[test]
    fn test_parse_done_and_finish() {
        assert!(parse_chunk(&event("[DONE]")).unwrap().is_none());
        let e = event(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
        assert!(parse_chunk(&e).unwrap().is_none());
    }

    #[test]
    fn test_parse_garbage_is_skipped() {
        assert!(parse_chunk(&event("not json")).unwrap().is_none());
    }
}
