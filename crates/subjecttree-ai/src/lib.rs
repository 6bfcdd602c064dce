mod chat_completions;
pub mod fetcher;
pub mod llm_factory;
pub mod llm_provider;
pub mod prompts;
pub mod streaming;
mod transport;

// Cloud LLM providers
#[cfg(feature = "anthropic")]
pub mod anthropic_provider;
#[cfg(feature = "openai-compatible")]
pub mod openai_compatible_provider;
#[cfg(feature = "openai-llm")]
pub mod openai_llm_provider;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use fetcher::{FetchScope, LlmTreeFetcher, TreeFetcher};
pub use llm_factory::LLMProviderFactory;
pub use llm_provider::*;
pub use streaming::{accumulate_text, SseDecoder};
