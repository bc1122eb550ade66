//! Model providers speaking the OpenAI-compatible chat completions API.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Model provider. Each one maps to a default base URL and an API key
/// environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenRouter,
    OpenAi,
    Requesty,
    Zai,
    Xai,
    Alibaba,
    /// Any OpenAI-compatible endpoint; requires an explicit base URL.
    Custom,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Provider::OpenRouter,
        Provider::OpenAi,
        Provider::Requesty,
        Provider::Zai,
        Provider::Xai,
        Provider::Alibaba,
        Provider::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenRouter => "openrouter",
            Provider::OpenAi => "openai",
            Provider::Requesty => "requesty",
            Provider::Zai => "zai",
            Provider::Xai => "xai",
            Provider::Alibaba => "alibaba",
            Provider::Custom => "custom",
        }
    }

    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Provider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Provider::OpenAi => Some("https://api.openai.com/v1"),
            Provider::Requesty => Some("https://router.requesty.ai/v1"),
            Provider::Zai => Some("https://api.zai.com/v1"),
            Provider::Xai => Some("https://api.x.ai/v1"),
            Provider::Alibaba => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
            Provider::Custom => None,
        }
    }

    /// Environment variable consulted when no API key is configured.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Requesty => "REQUESTY_API_KEY",
            Provider::Zai => "ZAI_API_KEY",
            Provider::Xai => "XAI_API_KEY",
            Provider::Alibaba => "DASHSCOPE_API_KEY",
            Provider::Custom => "AITERM_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| EngineError::Config(format!("unknown provider `{s}`")))
    }
}

/// Everything needed to reach one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    /// Overrides the provider's default base URL.
    pub base_url: Option<String>,
}

impl ModelConfig {
    /// Resolve a model configuration, falling back to the provider's API key
    /// environment variable when `api_key` is `None`.
    pub fn resolve(
        provider: Provider,
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, EngineError> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(EngineError::Setup("no model configured".into()));
        }
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(provider.api_key_env()).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                EngineError::Setup(format!(
                    "no API key for {provider}: set `api_key` in the config file or {}",
                    provider.api_key_env()
                ))
            })?;
        let config = Self {
            provider,
            model,
            api_key,
            base_url: base_url.filter(|u| !u.trim().is_empty()),
        };
        config.endpoint()?;
        Ok(config)
    }

    /// Full chat completions URL.
    pub fn endpoint(&self) -> Result<String, EngineError> {
        let base = self
            .base_url
            .as_deref()
            .or(self.provider.default_base_url())
            .ok_or_else(|| {
                EngineError::Setup(format!("provider `{}` requires base_url", self.provider))
            })?;
        Ok(format!("{}/chat/completions", base.trim_end_matches('/')))
    }
}
