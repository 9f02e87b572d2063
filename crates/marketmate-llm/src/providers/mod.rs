pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod presets;

pub use anthropic::AnthropicInvoker;
pub use gemini::GeminiInvoker;
pub use openai::OpenAiInvoker;
