//! Wire types and request plumbing shared by every Chat Completions endpoint
//! (OpenAI itself, Ollama, LM Studio and other compatible servers).

use crate::llm_provider::{GenerationConfig, LLMResponse, Message};
use crate::streaming::{accumulate_text, sse_text_stream};
use crate::transport::{check_status, transport_error};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use subjecttree_core::{Result, SubjectTreeError};

/// How the token limit is spelled on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenLimitField {
    MaxTokens,
    MaxCompletionTokens,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<usize>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

impl ChatCompletionsRequest {
    pub fn new(
        model: &str,
        messages: &[Message],
        config: &GenerationConfig,
        limit: TokenLimitField,
        structured_output: bool,
    ) -> Self {
        let response_format = if structured_output {
            config.json_schema.as_ref().map(|schema| {
                serde_json::json!({
                    "type": "json_schema",
                    "json_schema": {
                        "name": "subject_tree",
                        "schema": schema,
                        "strict": false
                    }
                })
            })
        } else {
            None
        };

        Self {
            model: model.to_string(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            max_tokens: (limit == TokenLimitField::MaxTokens).then_some(config.max_tokens),
            max_completion_tokens: (limit == TokenLimitField::MaxCompletionTokens)
                .then_some(config.max_tokens),
            temperature: config.temperature,
            top_p: config.top_p,
            stop: config.stop.clone(),
            stream: config.stream,
            response_format,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionsResponse {
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Text carried by one streamed chunk.
pub(crate) fn stream_delta(data: &str) -> Result<Option<String>> {
    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
        SubjectTreeError::MalformedResponse(format!("Unreadable stream chunk: {}", e))
    })?;
    if let Some(error) = chunk.error {
        return Err(SubjectTreeError::Transport(format!("stream error: {}", error)));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content))
}

/// Send a prepared request and turn the reply, streamed or not, into an `LLMResponse`.
pub(crate) async fn execute(
    provider: &str,
    model: &str,
    builder: RequestBuilder,
    request: &ChatCompletionsRequest,
) -> Result<LLMResponse> {
    let response = builder
        .header("Content-Type", "application/json")
        .json(request)
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;
    let response = check_status(provider, response).await?;

    if request.stream {
        let content = accumulate_text(sse_text_stream(response.bytes_stream(), stream_delta)).await?;
        return Ok(LLMResponse {
            content,
            total_tokens: None,
            prompt_tokens: None,
            completion_tokens: None,
            finish_reason: None,
            model: model.to_string(),
            streamed: true,
        });
    }

    let chat_response: ChatCompletionsResponse = response.json().await.map_err(|e| {
        SubjectTreeError::MalformedResponse(format!(
            "Failed to parse {} Chat Completions response: {}",
            provider, e
        ))
    })?;
    into_llm_response(provider, model, chat_response)
}

pub(crate) fn into_llm_response(
    provider: &str,
    model: &str,
    response: ChatCompletionsResponse,
) -> Result<LLMResponse> {
    let choice = response.choices.into_iter().next().ok_or_else(|| {
        SubjectTreeError::MalformedResponse(format!("{} returned no choices", provider))
    })?;

    Ok(LLMResponse {
        content: choice.message.content.unwrap_or_default(),
        total_tokens: response.usage.as_ref().map(|u| u.total_tokens),
        prompt_tokens: response.usage.as_ref().map(|u| u.prompt_tokens),
        completion_tokens: response.usage.as_ref().map(|u| u.completion_tokens),
        finish_reason: choice.finish_reason,
        model: response.model.unwrap_or_else(|| model.to_string()),
        streamed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_only_sent_with_structured_output() {
        let config = GenerationConfig {
            json_schema: Some(serde_json::json!({"type": "object"})),
            ..Default::default()
        };
        let messages = [Message::user("Algebra")];

        let with = ChatCompletionsRequest::new("m", &messages, &config, TokenLimitField::MaxTokens, true);
        let json = serde_json::to_value(&with).unwrap();
        assert_eq!(json["response_format"]["type"], "json_schema");
        assert_eq!(json["max_tokens"], 4096);
        assert!(json.get("max_completion_tokens").is_none());
        assert!(json.get("stream").is_none());

        let without = ChatCompletionsRequest::new(
            "m",
            &messages,
            &config,
            TokenLimitField::MaxCompletionTokens,
            false,
        );
        let json = serde_json::to_value(&without).unwrap();
        assert!(json.get("response_format").is_none());
        assert_eq!(json["max_completion_tokens"], 4096);
    }

    #[test]
    fn test_messages_carry_role_and_content() {
        let messages = [Message::system("JSON only"), Message::user("Algebra")];
        let request = ChatCompletionsRequest::new(
            "m",
            &messages,
            &GenerationConfig::default(),
            TokenLimitField::MaxTokens,
            false,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "JSON only");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Algebra");
    }

    #[test]
    fn test_stream_delta() {
        let chunk = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Alg"}}]}"#;
        assert_eq!(stream_delta(chunk).unwrap().as_deref(), Some("Alg"));

        let role_only = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(stream_delta(role_only).unwrap(), None);

        assert!(stream_delta("not json").is_err());
    }

    #[test]
    fn test_empty_choices_is_malformed() {
        let response: ChatCompletionsResponse =
            serde_json::from_str(r#"{"id":"x","choices":[]}"#).unwrap();
        let err = into_llm_response("openai", "gpt-4o", response).unwrap_err();
        assert!(matches!(err, SubjectTreeError::MalformedResponse(_)));
    }
}
