use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for crate::SubjectTreeError {
    fn from(err: ConfigError) -> Self {
        crate::SubjectTreeError::Configuration(err.to_string())
    }
}

pub const SUPPORTED_PROVIDERS: &[&str] = &["anthropic", "openai", "openai-compatible", "ollama", "lmstudio"];

/// Main configuration for SubjectTree
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubjectTreeConfig {
    /// Text-generation provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Diagram layout and animation settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM configuration for tree generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Provider: "anthropic", "openai", "openai-compatible", "ollama", "lmstudio"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Model identifier; each provider has its own default
    #[serde(default)]
    pub model: Option<String>,

    /// Anthropic API key
    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// OpenAI API key (also sent to openai-compatible endpoints when set)
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Base URL for a custom OpenAI-compatible endpoint
    #[serde(default)]
    pub openai_compatible_url: Option<String>,

    /// Ollama URL
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// LM Studio URL
    #[serde(default = "default_lmstudio_url")]
    pub lmstudio_url: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Nucleus sampling threshold
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ask providers for a streamed response
    #[serde(default = "default_stream")]
    pub stream: bool,

    /// Transport-level retries; provider errors are never retried
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            anthropic_api_key: None,
            openai_api_key: None,
            openai_compatible_url: None,
            ollama_url: default_ollama_url(),
            lmstudio_url: default_lmstudio_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
            stream: default_stream(),
            max_retries: 0,
        }
    }
}

/// Layout and animation settings for the diagram
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Layout: "tree" or "list"
    #[serde(default = "default_layout")]
    pub layout: String,

    /// Nodes at this depth or deeper start collapsed when first seen
    #[serde(default = "default_initial_expand_depth")]
    pub initial_expand_depth: usize,

    /// Distance between depth levels in the tree layout
    #[serde(default = "default_level_spacing")]
    pub level_spacing: f64,

    /// Distance between adjacent leaves in the tree layout
    #[serde(default = "default_sibling_spacing")]
    pub sibling_spacing: f64,

    /// Indent per depth level in the list layout
    #[serde(default = "default_list_indent")]
    pub list_indent: f64,

    /// Row height in the list layout
    #[serde(default = "default_list_row_height")]
    pub list_row_height: f64,

    /// Transition duration attached to each frame
    #[serde(default = "default_animation_ms")]
    pub animation_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            layout: default_layout(),
            initial_expand_depth: default_initial_expand_depth(),
            level_spacing: default_level_spacing(),
            sibling_spacing: default_sibling_spacing(),
            list_indent: default_list_indent(),
            list_row_height: default_list_row_height(),
            animation_ms: default_animation_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_lmstudio_url() -> String {
    "http://localhost:1234".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> usize {
    4096
}
fn default_top_p() -> f32 {
    0.95
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_stream() -> bool {
    true
}
fn default_layout() -> String {
    "tree".to_string()
}
fn default_initial_expand_depth() -> usize {
    1
}
fn default_level_spacing() -> f64 {
    180.0
}
fn default_sibling_spacing() -> f64 {
    28.0
}
fn default_list_indent() -> f64 {
    24.0
}
fn default_list_row_height() -> f64 {
    22.0
}
fn default_animation_ms() -> u64 {
    750
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: SubjectTreeConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.subjecttree.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_dotenv();
        let (config, config_path) = Self::load_config_file()?;
        Self::finish(config, config_path)
    }

    /// Load from an explicit file, still honouring environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_dotenv();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::read_toml_file(path)?;
        Self::finish(config, Some(path.to_path_buf()))
    }

    fn finish(config: SubjectTreeConfig, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        info!("Configuration loaded");
        match config_path {
            Some(ref path) => info!("   config file: {}", path.display()),
            None => info!("   config file: none (using defaults)"),
        }
        info!("   provider: {} ({:?})", config.llm.provider, config.llm.model);

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".subjecttree.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .subjecttree.env: {}", e);
                }
            }
        }
    }

    /// Search order:
    /// 1. ./.subjecttree.toml
    /// 2. ~/.subjecttree/config.toml
    fn load_config_file() -> Result<(SubjectTreeConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".subjecttree.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(user_config) = Self::user_dir().map(|d| d.join("config.toml")) {
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((SubjectTreeConfig::default(), None))
    }

    /// `~/.subjecttree`, home of the user config, preferences and logs.
    pub fn user_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".subjecttree"))
    }

    fn read_toml_file(path: &Path) -> Result<SubjectTreeConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(mut config: SubjectTreeConfig) -> SubjectTreeConfig {
        if let Ok(provider) =
            std::env::var("SUBJECTTREE_LLM_PROVIDER").or_else(|_| std::env::var("LLM_PROVIDER"))
        {
            config.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("SUBJECTTREE_MODEL") {
            config.llm.model = Some(model);
        }
        if let Ok(temp) = std::env::var("SUBJECTTREE_TEMPERATURE") {
            if let Ok(t) = temp.parse() {
                config.llm.temperature = t;
            }
        }
        if let Ok(max) = std::env::var("SUBJECTTREE_MAX_TOKENS") {
            if let Ok(n) = max.parse() {
                config.llm.max_tokens = n;
            }
        }
        if let Ok(stream) = std::env::var("SUBJECTTREE_STREAM") {
            config.llm.stream = stream.to_lowercase() == "true" || stream == "1";
        }
        if let Ok(url) = std::env::var("SUBJECTTREE_OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        if let Ok(url) = std::env::var("SUBJECTTREE_OPENAI_COMPATIBLE_URL") {
            config.llm.openai_compatible_url = Some(url);
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            config.llm.anthropic_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.logging.level = level;
        }

        config
    }

    /// Whether the provider was chosen through the environment.
    pub fn provider_from_env() -> bool {
        std::env::var("SUBJECTTREE_LLM_PROVIDER").is_ok() || std::env::var("LLM_PROVIDER").is_ok()
    }

    pub fn validate_config(config: &SubjectTreeConfig) -> Result<(), ConfigError> {
        if !SUPPORTED_PROVIDERS.contains(&config.llm.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid LLM provider: {}. Must be one of: {}",
                config.llm.provider,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }

        if !(0.0..=2.0).contains(&config.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid temperature: {}. Must be between 0.0 and 2.0",
                config.llm.temperature
            )));
        }
        if !(config.llm.top_p > 0.0 && config.llm.top_p <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid top_p: {}. Must be in (0.0, 1.0]",
                config.llm.top_p
            )));
        }

        match config.render.layout.as_str() {
            "tree" | "list" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid layout: {}. Must be one of: tree, list",
                    other
                )))
            }
        }
        let render = &config.render;
        for (name, value) in [
            ("level_spacing", render.level_spacing),
            ("sibling_spacing", render.sibling_spacing),
            ("list_indent", render.list_indent),
            ("list_row_height", render.list_row_height),
        ] {
            if value <= 0.0 || !value.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid {}: {}. Must be positive",
                    name, value
                )));
            }
        }

        // RUST_LOG may carry a full directive; only bare levels are checked.
        let level = config.logging.level.as_str();
        if !level.contains('=') && !level.contains(',') {
            match level {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        other
                    )))
                }
            }
        }
        match config.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, compact, json",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &SubjectTreeConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SubjectTreeConfig {
        &mut self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = SubjectTreeConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SubjectTreeConfig::default();
        assert_eq!(config.llm.provider, "ollama");
        assert!(config.llm.stream);
        assert_eq!(config.llm.max_retries, 0);
        assert_eq!(config.render.layout, "tree");
        assert!(ConfigManager::validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = SubjectTreeConfig::default();

        let mut bad = config.clone();
        bad.llm.provider = "invalid".to_string();
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.llm.top_p = 0.0;
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.render.layout = "force".to_string();
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut bad = config.clone();
        bad.render.sibling_spacing = -4.0;
        assert!(ConfigManager::validate_config(&bad).is_err());

        let mut directive = config;
        directive.logging.level = "subjecttree=debug,reqwest=warn".to_string();
        assert!(ConfigManager::validate_config(&directive).is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SubjectTreeConfig = toml::from_str(
            r#"
            [llm]
            provider = "anthropic"
            model = "claude-3-5-sonnet-20241022"

            [render]
            layout = "list"
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.render.layout, "list");
        assert_eq!(config.render.initial_expand_depth, 1);
        assert_eq!(config.logging.level, "warn");
    }
}
