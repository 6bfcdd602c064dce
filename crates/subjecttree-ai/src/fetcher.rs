use crate::llm_provider::{GenerationConfig, LLMProvider};
use crate::prompts;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use subjecttree_core::{Result, SubjectTreeError};
use tracing::{debug, info};

/// What a single fetch asks the provider for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchScope {
    /// A whole tree rooted at the field of study.
    Field { field: String },
    /// Additional children for the node at `path` (names from the root).
    Children {
        field: String,
        path: Vec<String>,
        existing: Vec<String>,
    },
}

impl FetchScope {
    pub fn field(&self) -> &str {
        match self {
            FetchScope::Field { field } | FetchScope::Children { field, .. } => field,
        }
    }

    pub fn is_children(&self) -> bool {
        matches!(self, FetchScope::Children { .. })
    }
}

/// Source of raw model output for tree generation.
#[async_trait]
pub trait TreeFetcher: Send + Sync {
    /// Issue one request for `scope` and return the complete response text.
    async fn fetch(&self, scope: &FetchScope) -> Result<String>;

    /// Short description for status lines, e.g. `ollama/llama3.1:8b`.
    fn describe(&self) -> String;
}

/// `TreeFetcher` backed by an `LLMProvider`.
pub struct LlmTreeFetcher {
    provider: Arc<dyn LLMProvider>,
    generation: GenerationConfig,
}

impl LlmTreeFetcher {
    pub fn new(provider: Arc<dyn LLMProvider>, generation: GenerationConfig) -> Self {
        Self {
            provider,
            generation,
        }
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    fn generation_for(&self, scope: &FetchScope) -> GenerationConfig {
        let characteristics = self.provider.characteristics();
        let mut generation = self.generation.clone();
        generation.stream = generation.stream && characteristics.supports_streaming;
        generation.json_schema = characteristics.supports_json_schema.then(|| {
            if scope.is_children() {
                prompts::children_schema()
            } else {
                prompts::tree_schema()
            }
        });
        generation
    }
}

#[async_trait]
impl TreeFetcher for LlmTreeFetcher {
    async fn fetch(&self, scope: &FetchScope) -> Result<String> {
        let messages = prompts::build_messages(scope);
        let generation = self.generation_for(scope);
        debug!(
            "Fetching {:?} from {} (stream: {}, schema: {})",
            scope,
            self.describe(),
            generation.stream,
            generation.json_schema.is_some()
        );

        let start = Instant::now();
        let response = self.provider.generate_chat(&messages, &generation).await?;
        let elapsed = start.elapsed();

        if response.content.trim().is_empty() {
            return Err(SubjectTreeError::EmptyResponse(self.provider.provider_name().to_string()));
        }

        info!(
            "{} answered in {:.2}s with {} chars{}",
            self.describe(),
            elapsed.as_secs_f64(),
            response.content.len(),
            if response.streamed { " (streamed)" } else { "" }
        );
        Ok(response.content)
    }

    fn describe(&self) -> String {
        format!(
            "{}/{}",
            self.provider.provider_name(),
            self.provider.model_name()
        )
    }
}
