use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use subjecttree_core::{ConfigManager, LLMConfig, Result, SubjectTreeError};
use tracing::{debug, info};

/// Choices remembered between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Preferences {
    /// `~/.subjecttree/preferences.toml`
    pub fn default_path() -> Option<PathBuf> {
        ConfigManager::user_dir().map(|dir| dir.join("preferences.toml"))
    }

    /// Load from the default location; a missing file yields empty preferences.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No preferences at {}", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            SubjectTreeError::Configuration(format!(
                "Failed to parse preferences {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::default_path().ok_or_else(|| {
            SubjectTreeError::Configuration("Could not determine home directory".to_string())
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| {
            SubjectTreeError::Configuration(format!("Failed to serialize preferences: {}", e))
        })?;
        std::fs::write(path, content)?;
        info!("Saved preferences to {}", path.display());
        Ok(())
    }

    /// Override the configured provider and model. A provider chosen through
    /// the environment wins over a saved preference.
    pub fn apply(&self, llm: &mut LLMConfig, provider_from_env: bool) {
        if provider_from_env {
            return;
        }
        if let Some(provider) = &self.provider {
            if *provider != llm.provider {
                // The configured model belongs to the previous provider.
                llm.model = None;
            }
            llm.provider = provider.clone();
        }
        if let Some(model) = &self.model {
            llm.model = Some(model.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("preferences.toml");
        let prefs = Preferences {
            provider: Some("anthropic".to_string()),
            model: None,
        };
        prefs.save_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("provider = \"anthropic\""));
        assert!(!content.contains("model"));
        assert_eq!(Preferences::load_from(&path).unwrap(), prefs);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let prefs = Preferences::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn test_apply_respects_environment() {
        let prefs = Preferences {
            provider: Some("openai".to_string()),
            model: Some("gpt-4o-mini".to_string()),
        };

        let mut llm = LLMConfig::default();
        prefs.apply(&mut llm, true);
        assert_eq!(llm.provider, "ollama");

        prefs.apply(&mut llm, false);
        assert_eq!(llm.provider, "openai");
        assert_eq!(llm.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_switching_provider_drops_configured_model() {
        let prefs = Preferences {
            provider: Some("anthropic".to_string()),
            model: None,
        };
        let mut llm = LLMConfig {
            model: Some("llama3.1:8b".to_string()),
            ..Default::default()
        };
        prefs.apply(&mut llm, false);
        assert_eq!(llm.provider, "anthropic");
        assert!(llm.model.is_none());
    }
}
