use crate::llm_provider::*;
use crate::streaming::{accumulate_text, sse_text_stream};
use crate::transport::{build_client, check_status, transport_error, with_retries};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use subjecttree_core::{Result, SubjectTreeError};
use tracing::debug;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const API_VERSION: &str = "2023-06-01";

/// Configuration for Anthropic Claude provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// API key for Anthropic
    pub api_key: String,
    /// Base URL, overridable for proxies
    pub base_url: String,
    /// Model to use (e.g., "claude-3-5-sonnet-20241022")
    pub model: String,
    /// Maximum context window
    pub context_window: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries for transport failures
    pub max_retries: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            base_url: ANTHROPIC_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            context_window: 200_000,
            timeout_secs: 120,
            max_retries: 0,
        }
    }
}

/// Anthropic Claude LLM provider
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(SubjectTreeError::Configuration(
                "Anthropic API key is required. Set ANTHROPIC_API_KEY environment variable."
                    .to_string(),
            ));
        }

        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::default())
    }

    fn build_request(&self, messages: &[Message], config: &GenerationConfig) -> AnthropicRequest {
        let (system, rest) = split_system(messages);
        AnthropicRequest {
            model: self.config.model.clone(),
            messages: rest
                .into_iter()
                .map(|m| AnthropicMessage {
                    role: match m.role {
                        MessageRole::Assistant => "assistant".to_string(),
                        _ => "user".to_string(),
                    },
                    content: m.content.clone(),
                })
                .collect(),
            system,
            max_tokens: config.max_tokens,
            temperature: Some(config.temperature),
            top_p: config.top_p,
            stop_sequences: config.stop.clone(),
            stream: config.stream,
        }
    }

    /// Try a single request to Anthropic API
    async fn try_request(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> Result<LLMResponse> {
        let request = self.build_request(messages, config);

        let response = self
            .client
            .post(format!("{}/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("anthropic", e))?;
        let response = check_status("anthropic", response).await?;

        if config.stream {
            let content =
                accumulate_text(sse_text_stream(response.bytes_stream(), stream_delta)).await?;
            return Ok(LLMResponse {
                content,
                total_tokens: None,
                prompt_tokens: None,
                completion_tokens: None,
                finish_reason: None,
                model: self.config.model.clone(),
                streamed: true,
            });
        }

        let response = response.json::<AnthropicResponse>().await.map_err(|e| {
            SubjectTreeError::MalformedResponse(format!(
                "Failed to parse Anthropic API response: {}",
                e
            ))
        })?;

        let content = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(LLMResponse {
            content,
            total_tokens: Some(response.usage.input_tokens + response.usage.output_tokens),
            prompt_tokens: Some(response.usage.input_tokens),
            completion_tokens: Some(response.usage.output_tokens),
            finish_reason: response.stop_reason,
            model: response.model,
            streamed: false,
        })
    }
}

/// Text carried by one Anthropic stream event.
fn stream_delta(data: &str) -> Result<Option<String>> {
    let event: StreamEvent = serde_json::from_str(data).map_err(|e| {
        SubjectTreeError::MalformedResponse(format!("Unreadable Anthropic stream event: {}", e))
    })?;
    match event.event_type.as_str() {
        "content_block_delta" => Ok(event.delta.and_then(|d| d.text)),
        "error" => {
            let message = event
                .error
                .map(|e| format!("{}: {}", e.error_type, e.message))
                .unwrap_or_else(|| "unknown stream error".to_string());
            Err(SubjectTreeError::Transport(format!(
                "Anthropic stream error: {}",
                message
            )))
        }
        _ => Ok(None),
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let start = Instant::now();
        let response = with_retries("anthropic", self.config.max_retries, || {
            self.try_request(messages, config)
        })
        .await?;
        debug!(
            "Anthropic responded in {}ms ({} chars)",
            start.elapsed().as_millis(),
            response.content.len()
        );
        Ok(response)
    }

    async fn is_available(&self) -> bool {
        let config = GenerationConfig {
            max_tokens: 1,
            ..Default::default()
        };
        self.generate_chat(&[Message::user("ping")], &config)
            .await
            .is_ok()
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: self.config.context_window,
            avg_latency_ms: 1000,
            supports_streaming: true,
            supports_json_schema: false,
        }
    }
}

// Anthropic API request/response types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: String,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: usize,
    output_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation_requires_api_key() {
        let config = AnthropicConfig {
            api_key: String::new(),
            ..Default::default()
        };
        let err = AnthropicProvider::new(config).err().unwrap();
        assert!(matches!(err, SubjectTreeError::Configuration(_)));
    }

    #[test]
    fn test_request_moves_system_prompt() {
        let provider = AnthropicProvider::new(AnthropicConfig {
            api_key: "test-key".to_string(),
            ..Default::default()
        })
        .unwrap();
        let config = GenerationConfig {
            stream: true,
            ..Default::default()
        };
        let request = provider.build_request(
            &[Message::system("only JSON"), Message::user("Algebra")],
            &config,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["system"], "only JSON");
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn test_stream_delta_events() {
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"{\"name\""}}"#;
        assert_eq!(stream_delta(delta).unwrap().as_deref(), Some("{\"name\""));

        let ping = r#"{"type":"ping"}"#;
        assert_eq!(stream_delta(ping).unwrap(), None);

        let error = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(stream_delta(error).is_err());
    }
}
