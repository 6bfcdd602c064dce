use crate::llm_provider::*;
use std::sync::Arc;
use subjecttree_core::config_manager::LLMConfig;
use subjecttree_core::{Result, SubjectTreeError};

#[cfg(feature = "anthropic")]
use crate::anthropic_provider::{AnthropicConfig, AnthropicProvider};

#[cfg(feature = "openai-llm")]
use crate::openai_llm_provider::{OpenAIConfig, OpenAIProvider};

#[cfg(feature = "openai-compatible")]
use crate::openai_compatible_provider::{OpenAICompatibleConfig, OpenAICompatibleProvider};

/// Factory for creating LLM providers based on configuration
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration
    pub fn create_from_config(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let provider_name = config.provider.to_lowercase();

        match provider_name.as_str() {
            #[cfg(feature = "openai-compatible")]
            "ollama" => Self::create_ollama_provider(config),
            #[cfg(feature = "openai-compatible")]
            "lmstudio" => Self::create_lmstudio_provider(config),
            #[cfg(feature = "openai-compatible")]
            "openai-compatible" => Self::create_openai_compatible_provider(config),
            #[cfg(feature = "anthropic")]
            "anthropic" => Self::create_anthropic_provider(config),
            #[cfg(feature = "openai-llm")]
            "openai" => Self::create_openai_provider(config),
            _ => Err(SubjectTreeError::Configuration(format!(
                "Unsupported LLM provider: {}. Available providers: {}",
                provider_name,
                Self::supported_providers().join(", ")
            ))),
        }
    }

    /// Generation parameters derived from the same configuration section
    pub fn generation_config(config: &LLMConfig) -> GenerationConfig {
        GenerationConfig {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: Some(config.top_p),
            stop: None,
            stream: config.stream,
            json_schema: None,
        }
    }

    #[cfg(feature = "openai-compatible")]
    fn create_ollama_provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "llama3.1:8b".to_string());
        let compat_config = OpenAICompatibleConfig {
            base_url: format!("{}/v1", config.ollama_url.trim_end_matches('/')),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            ..OpenAICompatibleConfig::ollama(model)
        };

        Ok(Arc::new(OpenAICompatibleProvider::new(compat_config)?))
    }

    /// Create a provider using LM Studio's OpenAI-compatible endpoint
    #[cfg(feature = "openai-compatible")]
    fn create_lmstudio_provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "local-model".to_string());
        let compat_config = OpenAICompatibleConfig {
            base_url: format!("{}/v1", config.lmstudio_url.trim_end_matches('/')),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            ..OpenAICompatibleConfig::lm_studio(model)
        };

        Ok(Arc::new(OpenAICompatibleProvider::new(compat_config)?))
    }

    /// Create an Anthropic provider
    #[cfg(feature = "anthropic")]
    fn create_anthropic_provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let api_key = config
            .anthropic_api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                SubjectTreeError::Configuration(
                    "Anthropic API key not found. Set 'anthropic_api_key' in config or ANTHROPIC_API_KEY environment variable".to_string(),
                )
            })?;

        let defaults = AnthropicConfig::default();
        let anthropic_config = AnthropicConfig {
            api_key,
            model: config.model.clone().unwrap_or(defaults.model),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            ..defaults
        };

        Ok(Arc::new(AnthropicProvider::new(anthropic_config)?))
    }

    /// Create an OpenAI provider
    #[cfg(feature = "openai-llm")]
    fn create_openai_provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let api_key = config
            .openai_api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                SubjectTreeError::Configuration(
                    "OpenAI API key not found. Set 'openai_api_key' in config or OPENAI_API_KEY environment variable".to_string(),
                )
            })?;

        let defaults = OpenAIConfig::default();
        let openai_config = OpenAIConfig {
            api_key,
            model: config.model.clone().unwrap_or(defaults.model),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            ..defaults
        };

        Ok(Arc::new(OpenAIProvider::new(openai_config)?))
    }

    /// Create an OpenAI-compatible provider
    #[cfg(feature = "openai-compatible")]
    fn create_openai_compatible_provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
        let base_url = config.openai_compatible_url.clone().ok_or_else(|| {
            SubjectTreeError::Configuration(
                "OpenAI-compatible base URL not set. Set 'openai_compatible_url' in config"
                    .to_string(),
            )
        })?;

        let compat_config = OpenAICompatibleConfig {
            base_url,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "local-model".to_string()),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            api_key: config.openai_api_key.clone(),
            provider_name: "openai-compatible".to_string(),
            ..Default::default()
        };

        Ok(Arc::new(OpenAICompatibleProvider::new(compat_config)?))
    }

    /// Get a list of supported providers
    pub fn supported_providers() -> Vec<&'static str> {
        let mut providers = Vec::new();

        #[cfg(feature = "openai-compatible")]
        providers.extend(["ollama", "lmstudio", "openai-compatible"]);

        #[cfg(feature = "anthropic")]
        providers.push("anthropic");

        #[cfg(feature = "openai-llm")]
        providers.push("openai");

        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_providers() {
        let providers = LLMProviderFactory::supported_providers();
        assert!(providers.contains(&"ollama"));
        assert!(providers.contains(&"lmstudio"));
        assert!(providers.contains(&"anthropic"));
        assert!(providers.contains(&"openai"));
    }

    #[test]
    fn test_create_ollama_provider() {
        let config = LLMConfig {
            provider: "ollama".to_string(),
            model: Some("llama3.1:8b".to_string()),
            ..Default::default()
        };

        let provider = LLMProviderFactory::create_from_config(&config).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "llama3.1:8b");
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let config = LLMConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        let err = LLMProviderFactory::create_from_config(&config).err().unwrap();
        assert!(matches!(err, SubjectTreeError::Configuration(_)));
    }

    #[test]
    fn test_openai_compatible_requires_url() {
        let config = LLMConfig {
            provider: "openai-compatible".to_string(),
            ..Default::default()
        };
        assert!(LLMProviderFactory::create_from_config(&config).is_err());
    }

    #[test]
    fn test_generation_config_follows_llm_section() {
        let config = LLMConfig {
            temperature: 0.2,
            stream: false,
            ..Default::default()
        };
        let generation = LLMProviderFactory::generation_config(&config);
        assert_eq!(generation.temperature, 0.2);
        assert!(!generation.stream);
        assert_eq!(generation.top_p, Some(0.95));
    }
}
