//! Config file loading.
//!
//! The file lives at `<config dir>/aiterm/config.toml` unless `--config`
//! points elsewhere. Every field is optional; a missing file means
//! defaults. Command line flags win over file values.

use aiterm_rs::agent::EngineConfig;
use aiterm_rs::api::{ModelConfig, Provider};
use aiterm_rs::error::EngineError;
use aiterm_rs::gate::{RiskRuleConfig, RiskScorer};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// `<config dir>/aiterm`, where the config file, log file, knowledge bases
/// and debug transcripts live by default.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("aiterm"))
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Seconds.
    pub wait_interval: Option<u64>,
    pub max_context_size: Option<usize>,
    pub max_capture_lines: Option<usize>,
    pub keep_recent_messages: Option<usize>,
    pub whitelist_patterns: Vec<String>,
    pub blacklist_patterns: Vec<String>,
    pub knowledge_base_dir: Option<PathBuf>,
    pub auto_load_kbs: Vec<String>,
    pub debug: bool,
    /// Replaces the built-in risk rule table when non-empty.
    pub risk_rules: Vec<RiskRuleConfig>,
}

impl FileConfig {
    /// Read `path`. A missing file yields defaults; unreadable or malformed
    /// files are setup errors.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Setup(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::parse(&text)
            .map_err(|e| EngineError::Setup(format!("{}: {e}", path.display())))
    }

    pub fn parse(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::Setup(format!("invalid config: {e}")))
    }

    /// Engine settings from the file on top of the engine defaults.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default()
            .with_whitelist(self.whitelist_patterns.clone())
            .with_blacklist(self.blacklist_patterns.clone());
        if let Some(secs) = self.wait_interval.filter(|s| *s > 0) {
            config = config.with_wait_interval(Duration::from_secs(secs));
        }
        if let Some(tokens) = self.max_context_size.filter(|n| *n > 0) {
            config = config.with_max_context_size(tokens);
        }
        if let Some(lines) = self.max_capture_lines.filter(|n| *n > 0) {
            config = config.with_max_capture_lines(lines);
        }
        if let Some(n) = self.keep_recent_messages {
            config = config.with_keep_recent_messages(n);
        }
        config
    }

    pub fn scorer(&self) -> Result<RiskScorer, EngineError> {
        if self.risk_rules.is_empty() {
            Ok(RiskScorer::default())
        } else {
            RiskScorer::from_config(&self.risk_rules)
        }
    }

    /// Model settings with command line overrides applied.
    pub fn model_config(
        &self,
        provider: Option<Provider>,
        model: Option<String>,
    ) -> Result<ModelConfig, EngineError> {
        let provider = provider.or(self.provider).unwrap_or_default();
        let model = model
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        ModelConfig::resolve(provider, model, self.api_key.clone(), self.base_url.clone())
    }

    pub fn knowledge_dir(&self) -> Option<PathBuf> {
        self.knowledge_base_dir
            .clone()
            .or_else(|| config_dir().map(|d| d.join("kb")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiterm_rs::gate::RiskLevel;

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert!(config.provider.is_none());
        assert!(!config.debug);
        assert_eq!(config.engine_config().wait_interval, Duration::from_secs(5));
    }

    #[test]
    fn full_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
provider = "requesty"
model = "anthropic/claude-3.5-sonnet"
api_key = "sk-test"
wait_interval = 8
max_context_size = 64000
keep_recent_messages = 0
whitelist_patterns = ["^ls", "^git status"]
blacklist_patterns = ["rm -rf"]
auto_load_kbs = ["docker"]
debug = true

[[risk_rules]]
pattern = "^terraform destroy"
level = "dangerous"
rationale = "destroys infrastructure"
"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.provider, Some(Provider::Requesty));
        assert!(config.debug);
        assert_eq!(config.auto_load_kbs, vec!["docker"]);

        let engine = config.engine_config();
        assert_eq!(engine.wait_interval, Duration::from_secs(8));
        assert_eq!(engine.max_context_size, 64000);
        assert_eq!(engine.keep_recent_messages, 0);
        assert_eq!(engine.max_capture_lines, 200);
        assert_eq!(engine.blacklist_patterns, vec!["rm -rf"]);

        let scorer = config.scorer().unwrap();
        assert_eq!(scorer.rules().len(), 1);
        assert_eq!(scorer.score("terraform destroy -auto-approve").level, RiskLevel::Dangerous);

        let model = config.model_config(None, None).unwrap();
        assert_eq!(model.provider, Provider::Requesty);
        assert_eq!(model.api_key, "sk-test");
    }

    #[test]
    fn cli_flags_win() {
        let config = FileConfig::parse("provider = \"openai\"\nmodel = \"gpt-4o\"\napi_key = \"k\"").unwrap();
        let model = config
            .model_config(Some(Provider::Xai), Some("grok-2".into()))
            .unwrap();
        assert_eq!(model.provider, Provider::Xai);
        assert_eq!(model.model, "grok-2");
    }

    #[test]
    fn malformed_file_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "wait_interval = \"soon\"").unwrap();
        assert!(matches!(FileConfig::load(&path), Err(EngineError::Setup(_))));
    }

    #[test]
    fn invalid_risk_rule_is_rejected() {
        let config = FileConfig::parse(
            "[[risk_rules]]\npattern = \"(\"\nlevel = \"safe\"\nrationale = \"broken\"",
        )
        .unwrap();
        assert!(config.scorer().is_err());
    }
}
