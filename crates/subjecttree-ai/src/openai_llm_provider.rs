use crate::chat_completions::{execute, ChatCompletionsRequest, TokenLimitField};
use crate::llm_provider::*;
use crate::transport::{build_client, with_retries};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use subjecttree_core::{Result, SubjectTreeError};
use tracing::debug;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for OpenAI provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// API key for OpenAI
    pub api_key: String,
    /// Base URL for API (default: https://api.openai.com/v1)
    pub base_url: String,
    /// Model to use (e.g., "gpt-4o")
    pub model: String,
    /// Maximum context window
    pub context_window: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries for transport failures
    pub max_retries: u32,
    /// Optional organization ID
    pub organization: Option<String>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            base_url: OPENAI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            context_window: 128_000,
            timeout_secs: 120,
            max_retries: 0,
            organization: std::env::var("OPENAI_ORG_ID").ok(),
        }
    }
}

/// OpenAI LLM provider using the Chat Completions API
pub struct OpenAIProvider {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SubjectTreeError::Configuration(
                "OpenAI API key is required. Set OPENAI_API_KEY environment variable."
                    .to_string(),
            ));
        }

        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::default())
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
            TokenLimitField::MaxCompletionTokens,
            true,
        );

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key);
        if let Some(org) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        execute("openai", &self.config.model, builder, &request).await
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let start = Instant::now();
        let response = with_retries("openai", self.config.max_retries, || {
            self.try_request(messages, config)
        })
        .await?;
        debug!(
            "OpenAI responded in {}ms ({} chars, streamed: {})",
            start.elapsed().as_millis(),
            response.content.len(),
            response.streamed
        );
        Ok(response)
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/models", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: self.config.context_window,
            avg_latency_ms: 800,
            supports_streaming: true,
            supports_json_schema: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation_requires_api_key() {
        let config = OpenAIConfig {
            api_key: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            OpenAIProvider::new(config).err().unwrap(),
            SubjectTreeError::Configuration(_)
        ));
    }

    #[test]
    fn test_provider_metadata() {
        let provider = OpenAIProvider::new(OpenAIConfig {
            api_key: "sk-test".to_string(),
            model: "gpt-4o-mini".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.model_name(), "gpt-4o-mini");
        assert!(provider.characteristics().supports_json_schema);
    }
}
