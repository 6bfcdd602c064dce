//! Scripted provider for tests.
//!
//! Enabled inside this crate's tests and, for dependent crates, through the
//! `testing` feature.

use crate::llm_provider::*;
use crate::streaming::accumulate_text;
use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subjecttree_core::SubjectTreeError;
use tokio::sync::Notify;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A complete, non-streamed body.
    Text(String),
    /// Fragments delivered as a stream, concatenated in order.
    Stream(Vec<String>),
    /// A non-success HTTP status.
    Fail { status: u16, message: String },
    /// A connection-level failure.
    Transport(String),
    /// Wait before answering with `reply`.
    Delayed { millis: u64, reply: Box<MockReply> },
    /// Wait until `gate` is notified before answering with `reply`.
    Gated {
        gate: Arc<Notify>,
        reply: Box<MockReply>,
    },
}

impl MockReply {
    pub fn text(body: impl Into<String>) -> Self {
        MockReply::Text(body.into())
    }

    pub fn stream<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MockReply::Stream(fragments.into_iter().map(Into::into).collect())
    }

    pub fn fail(status: u16, message: impl Into<String>) -> Self {
        MockReply::Fail {
            status,
            message: message.into(),
        }
    }

    pub fn delayed(self, millis: u64) -> Self {
        MockReply::Delayed {
            millis,
            reply: Box::new(self),
        }
    }

    pub fn gated(self, gate: Arc<Notify>) -> Self {
        MockReply::Gated {
            gate,
            reply: Box::new(self),
        }
    }
}

/// A request as the mock received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub config: GenerationConfig,
}

impl RecordedRequest {
    /// Content of the last user message.
    pub fn user_prompt(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// `LLMProvider` that answers from a script instead of the network.
///
/// Unkeyed replies are consumed in call order. A keyed reply is used by the
/// first call whose user prompt contains its key.
pub struct MockProvider {
    script: Mutex<VecDeque<(Option<String>, MockReply)>>,
    requests: Mutex<Vec<RecordedRequest>>,
    calls: AtomicUsize,
    json_schema: bool,
}

impl MockProvider {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().map(|r| (None, r)).collect()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            json_schema: false,
        }
    }

    pub fn keyed<K: Into<String>>(replies: Vec<(K, MockReply)>) -> Self {
        let provider = Self::new(Vec::new());
        {
            let mut script = provider.script.lock();
            script.extend(replies.into_iter().map(|(k, r)| (Some(k.into()), r)));
        }
        provider
    }

    /// Report structured-output support so callers attach a schema hint.
    pub fn with_json_schema(mut self) -> Self {
        self.json_schema = true;
        self
    }

    pub fn push(&self, reply: MockReply) {
        self.script.lock().push_back((None, reply));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    fn next_reply(&self, prompt: &str) -> Option<MockReply> {
        let mut script = self.script.lock();
        let index = script.iter().position(|(key, _)| match key {
            Some(key) => prompt.contains(key.as_str()),
            None => true,
        })?;
        script.remove(index).map(|(_, reply)| reply)
    }
}

#[async_trait]
impl LLMProvider for MockProvider {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let request = RecordedRequest {
            messages: messages.to_vec(),
            config: config.clone(),
        };
        let reply = self.next_reply(request.user_prompt());
        self.requests.lock().push(request);

        let mut reply = reply.ok_or_else(|| {
            SubjectTreeError::Transport("mock provider has no scripted reply left".to_string())
        })?;

        let reply = loop {
            match reply {
                MockReply::Delayed { millis, reply: inner } => {
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    reply = *inner;
                }
                MockReply::Gated { gate, reply: inner } => {
                    gate.notified().await;
                    reply = *inner;
                }
                other => break other,
            }
        };

        let (content, streamed) = match reply {
            MockReply::Text(body) => (body, false),
            MockReply::Stream(fragments) => {
                let text = accumulate_text(stream::iter(fragments.into_iter().map(Ok))).await?;
                (text, true)
            }
            MockReply::Fail { status, message } => {
                return Err(SubjectTreeError::Provider {
                    provider: "mock".to_string(),
                    status,
                    message,
                })
            }
            MockReply::Transport(message) => return Err(SubjectTreeError::Transport(message)),
            MockReply::Delayed { .. } | MockReply::Gated { .. } => {
                return Err(SubjectTreeError::Transport(
                    "unresolved mock reply wrapper".to_string(),
                ))
            }
        };

        Ok(LLMResponse {
            content,
            total_tokens: None,
            prompt_tokens: None,
            completion_tokens: None,
            finish_reason: Some("stop".to_string()),
            model: "mock-model".to_string(),
            streamed,
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: 8192,
            avg_latency_ms: 0,
            supports_streaming: true,
            supports_json_schema: self.json_schema,
        }
    }
}
