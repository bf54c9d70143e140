//! Provider configuration from TOML (`[provider]` section)

use coach_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completion endpoint used for extraction and advice.
///
/// # Example
///
/// ```toml
/// [provider]
/// base_url = "http://localhost:8000/v1"
/// model = "qwen2.5-vl-7b-instruct"
/// advisor_model = "gpt-4o-mini"   # defaults to `model`
/// advisor = true                  # false: deterministic fallback only
/// api_key_env = "OPENAI_API_KEY"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    pub base_url: String,
    /// Environment variable name for the API key.
    pub api_key_env: String,
    /// Direct API key (not recommended; use the env var instead).
    pub api_key: Option<String>,
    pub model: String,
    pub advisor_model: Option<String>,
    pub advisor: bool,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            advisor_model: None,
            advisor: true,
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

impl FileProviderConfig {
    /// Explicit key first, then the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }

    pub fn advisor_model(&self) -> &str {
        self.advisor_model.as_deref().unwrap_or(&self.model)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.base_url.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::MissingProviderSetting,
                "provider.base_url cannot be empty",
            ));
        }
        if self.model.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::MissingProviderSetting,
                "provider.model cannot be empty",
            ));
        }
        if self.advisor_model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::MissingProviderSetting,
                "provider.advisor_model is empty, using provider.model",
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_wins() {
        let config = FileProviderConfig {
            api_key: Some("sk-inline".into()),
            api_key_env: "COACH_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-inline"));
    }

    #[test]
    fn test_advisor_model_defaults_to_model() {
        let config = FileProviderConfig::default();
        assert_eq!(config.advisor_model(), "gpt-4o-mini");
    }

    #[test]
    fn test_empty_model_is_an_error() {
        let config = FileProviderConfig {
            model: " ".into(),
            ..Default::default()
        };
        assert!(config.validate().iter().any(ConfigIssue::is_error));
    }
}
