pub mod providers;
pub mod streaming;

use std::sync::Arc;

use marketmate_core::config::ModelConfig;
use marketmate_core::traits::ModelInvoker;

pub use providers::anthropic::AnthropicInvoker;
pub use providers::gemini::GeminiInvoker;
pub use providers::openai::OpenAiInvoker;
pub use providers::presets::apply_preset_defaults;

/// Create a model invoker based on the provider name.
pub fn create_invoker(config: &ModelConfig) -> Arc<dyn ModelInvoker> {
    let mut config = config.clone();
    apply_preset_defaults(&mut config);
    match config.provider.as_str() {
        "gemini" | "google" => Arc::new(GeminiInvoker::new(config)),
        "anthropic" | "claude" => Arc::new(AnthropicInvoker::new(config)),
        // Everything else uses the OpenAI-compatible client
        _ => Arc::new(OpenAiInvoker::new(config)),
    }
}

