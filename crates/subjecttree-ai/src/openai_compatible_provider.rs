use crate::chat_completions::{execute, ChatCompletionsRequest, TokenLimitField};
use crate::llm_provider::*;
use crate::transport::{build_client, with_retries};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use subjecttree_core::Result;

/// Configuration for OpenAI-compatible providers (LM Studio, Ollama, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAICompatibleConfig {
    /// Base URL for the API (e.g., "http://localhost:1234/v1")
    pub base_url: String,
    /// Model to use
    pub model: String,
    /// Maximum context window
    pub context_window: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries for transport failures
    pub max_retries: u32,
    /// Optional API key (some providers require it, some don't)
    pub api_key: Option<String>,
    /// Provider name for display purposes
    pub provider_name: String,
    /// Whether the server accepts a `response_format` JSON schema
    pub structured_output: bool,
}

impl Default for OpenAICompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            model: "local-model".to_string(),
            context_window: 32_000,
            timeout_secs: 120,
            max_retries: 0,
            api_key: None,
            provider_name: "openai-compatible".to_string(),
            structured_output: false,
        }
    }
}

impl OpenAICompatibleConfig {
    /// Create config for LM Studio
    pub fn lm_studio(model: String) -> Self {
        Self {
            base_url: "http://localhost:1234/v1".to_string(),
            model,
            provider_name: "lmstudio".to_string(),
            structured_output: true,
            ..Default::default()
        }
    }

    /// Create config for Ollama (OpenAI-compatible endpoint)
    pub fn ollama(model: String) -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model,
            provider_name: "ollama".to_string(),
            structured_output: true,
            ..Default::default()
        }
    }

    /// Create config for custom endpoint
    pub fn custom(base_url: String, model: String, provider_name: String) -> Self {
        Self {
            base_url,
            model,
            provider_name,
            ..Default::default()
        }
    }
}

/// OpenAI-compatible LLM provider
pub struct OpenAICompatibleProvider {
    config: OpenAICompatibleConfig,
    client: Client,
}

impl OpenAICompatibleProvider {
    pub fn new(config: OpenAICompatibleConfig) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    /// Create for LM Studio
    pub fn lm_studio(model: String) -> Result<Self> {
        Self::new(OpenAICompatibleConfig::lm_studio(model))
    }

    /// Create for Ollama
    pub fn ollama(model: String) -> Result<Self> {
        Self::new(OpenAICompatibleConfig::ollama(model))
    }

    async fn try_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<LLMResponse> {
        let request = ChatCompletionsRequest::new(
            &self.config.model,
            messages,
            config,
            TokenLimitField::MaxTokens,
            self.config.structured_output,
        );

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url));
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        execute(&self.config.provider_name, &self.config.model, builder, &request).await
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        with_retries(&self.config.provider_name, self.config.max_retries, || {
            self.try_request(messages, config)
        })
        .await
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/models", self.config.base_url))
            .send()
            .await
            .is_ok()
    }

    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: self.config.context_window,
            avg_latency_ms: 1500, // Local models are typically slower
            supports_streaming: true,
            supports_json_schema: self.config.structured_output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lm_studio_config() {
        let config = OpenAICompatibleConfig::lm_studio("test-model".to_string());
        assert_eq!(config.base_url, "http://localhost:1234/v1");
        assert_eq!(config.provider_name, "lmstudio");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_ollama_config() {
        let config = OpenAICompatibleConfig::ollama("llama3".to_string());
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.provider_name, "ollama");
        assert!(config.structured_output);
    }

    #[test]
    fn test_custom_endpoint_has_no_schema_by_default() {
        let provider = OpenAICompatibleProvider::new(OpenAICompatibleConfig::custom(
            "https://llm.example.com/v1".to_string(),
            "mixtral".to_string(),
            "openai-compatible".to_string(),
        ))
        .unwrap();
        assert!(!provider.characteristics().supports_json_schema);
        assert_eq!(provider.provider_name(), "openai-compatible");
    }
}
