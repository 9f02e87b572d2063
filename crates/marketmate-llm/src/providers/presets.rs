use marketmate_core::config::ModelConfig;

/// A named provider preset for OpenAI-compatible APIs.
pub struct ProviderPreset {
    pub default_base_url: &'static str,
    pub needs_api_key: bool,
    pub extra_headers: &'static [(&'static str, &'static str)],
}

/// Look up a provider preset by name.
pub fn get_preset(provider: &str) -> Option<ProviderPreset> {
    match provider {
        "ollama" => Some(ProviderPreset {
            default_base_url: "http://localhost:11434/v1/chat/completions",
            needs_api_key: false,
            extra_headers: &[],
        }),
        "groq" => Some(ProviderPreset {
            default_base_url: "https://api.groq.com/openai/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "openrouter" => Some(ProviderPreset {
            default_base_url: "https://openrouter.ai/api/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[("X-Title", "MarketMate")],
        }),
        "together" => Some(ProviderPreset {
            default_base_url: "https://api.together.xyz/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "mistral" => Some(ProviderPreset {
            default_base_url: "https://api.mistral.ai/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "deepseek" => Some(ProviderPreset {
            default_base_url: "https://api.deepseek.com/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        _ => None,
    }
}

/// Fill in a preset's base URL and headers where the user left them unset.
///
/// User-supplied headers take precedence over preset headers.
pub fn apply_preset_defaults(config: &mut ModelConfig) {
    let Some(preset) = get_preset(&config.provider) else {
        return;
    };

    if config.base_url.is_none() {
        config.base_url = Some(preset.default_base_url.to_string());
    }
    for (k, v) in preset.extra_headers {
        config
            .extra_headers
            .entry(k.to_string())
            .or_insert_with(|| v.to_string());
    }
}

/// Whether the provider can run without an API key.
pub fn needs_api_key(provider: &str) -> bool {
    get_preset(provider).map_or(true, |p| p.needs_api_key)
}

/// List all known preset provider names.
pub fn all_preset_names() -> &'static [&'static str] {
    &["ollama", "groq", "openrouter", "together", "mistral", "deepseek"]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn model(provider: &str) -> ModelConfig {
        ModelConfig {
            provider: provider.into(),
            model_id: "m".into(),
            api_key: None,
            base_url: None,
            max_tokens: 1024,
            temperature: 0.0,
            timeout_secs: 10,
            extra_headers: HashMap::new(),
        }
    }

    #[test]
    fn test_preset_fills_base_url() {
        let mut cfg = model("groq");
        apply_preset_defaults(&mut cfg);
        assert_eq!(
            cfg.base_url.as_deref(),
            Some("https://api.groq.com/openai/v1/chat/completions")
        );
    }

    #[test]
    fn test_user_values_win() {
        let mut cfg = model("openrouter");
        cfg.base_url = Some("http://proxy.local/v1/chat/completions".into());
        cfg.extra_headers.insert("X-Title".into(), "Custom".into());
        apply_preset_defaults(&mut cfg);
        assert_eq!(
            cfg.base_url.as_deref(),
            Some("http://proxy.local/v1/chat/completions")
        );
        assert_eq!(cfg.extra_headers.get("X-Title").map(String::as_str), Some("Custom"));
    }

    #[test]
    fn test_unknown_provider_untouched() {
        let mut cfg = model("openai");
        apply_preset_defaults(&mut cfg);
        assert!(cfg.base_url.is_none());
        assert!(needs_api_key("openai"));
        assert!(!needs_api_key("ollama"));
        assert_eq!(all_preset_names().len(), 6);
    }
}
