//! Engine configuration and session-scoped overrides.
//!
//! [`EngineConfig`] holds the persisted settings (usually built from the
//! config file by the front end). [`SessionOverrides`] holds values set
//! with `/config set` during the running session; they win over the
//! persisted values and are discarded on exit.
//!
//! ```
//! use aiterm_rs::agent::config::{EngineConfig, SessionOverrides};
//! use std::time::Duration;
//!
//! let mut overrides = SessionOverrides::default();
//! overrides.set("wait_interval", "2").unwrap();
//! overrides.set("blacklist_patterns", "rm -rf, mkfs").unwrap();
//!
//! let config = EngineConfig::default().with_overrides(&overrides);
//! assert_eq!(config.wait_interval, Duration::from_secs(2));
//! assert_eq!(config.blacklist_patterns, vec!["rm -rf", "mkfs"]);
//! ```

use crate::context::DEFAULT_CHARS_PER_TOKEN;
use crate::error::EngineError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ── EngineConfig ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed wait after dispatching to an unprepared pane.
    pub wait_interval: Duration,
    /// Context budget in estimated tokens.
    pub max_context_size: usize,
    /// Lines of pane scrollback captured per observation.
    pub max_capture_lines: usize,
    /// Messages kept verbatim when squashing.
    pub keep_recent_messages: usize,
    pub request_timeout: Duration,
    /// How long to poll for a completion marker before falling back to
    /// the fixed wait.
    pub completion_timeout: Duration,
    pub poll_interval: Duration,
    /// Upper bound on AI round-trips per user input.
    pub max_iterations: u32,
    pub chars_per_token: f64,
    pub whitelist_patterns: Vec<String>,
    pub blacklist_patterns: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_interval: Duration::from_secs(5),
            max_context_size: 100_000,
            max_capture_lines: 200,
            keep_recent_messages: 6,
            request_timeout: Duration::from_secs(60),
            completion_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            max_iterations: 50,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            whitelist_patterns: Vec::new(),
            blacklist_patterns: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    pub fn with_max_context_size(mut self, tokens: usize) -> Self {
        self.max_context_size = tokens;
        self
    }

    pub fn with_max_capture_lines(mut self, lines: usize) -> Self {
        self.max_capture_lines = lines;
        self
    }

    pub fn with_keep_recent_messages(mut self, n: usize) -> Self {
        self.keep_recent_messages = n;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_iterations(mut self, n: u32) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_chars_per_token(mut self, cpt: f64) -> Self {
        self.chars_per_token = cpt;
        self
    }

    pub fn with_whitelist(mut self, patterns: Vec<String>) -> Self {
        self.whitelist_patterns = patterns;
        self
    }

    pub fn with_blacklist(mut self, patterns: Vec<String>) -> Self {
        self.blacklist_patterns = patterns;
        self
    }

    /// Effective configuration with session overrides applied.
    pub fn with_overrides(&self, overrides: &SessionOverrides) -> Self {
        let mut config = self.clone();
        for (key, value) in &overrides.values {
            match (key, value) {
                (ConfigKey::WaitInterval, OverrideValue::Number(n)) => {
                    config.wait_interval = Duration::from_secs(*n)
                }
                (ConfigKey::MaxContextSize, OverrideValue::Number(n)) => {
                    config.max_context_size = *n as usize
                }
                (ConfigKey::MaxCaptureLines, OverrideValue::Number(n)) => {
                    config.max_capture_lines = *n as usize
                }
                (ConfigKey::KeepRecentMessages, OverrideValue::Number(n)) => {
                    config.keep_recent_messages = *n as usize
                }
                (ConfigKey::WhitelistPatterns, OverrideValue::List(l)) => {
                    config.whitelist_patterns = l.clone()
                }
                (ConfigKey::BlacklistPatterns, OverrideValue::List(l)) => {
                    config.blacklist_patterns = l.clone()
                }
                _ => {}
            }
        }
        config
    }

    /// Display form of one setting.
    pub fn display_value(&self, key: ConfigKey) -> String {
        match key {
            ConfigKey::WaitInterval => self.wait_interval.as_secs().to_string(),
            ConfigKey::MaxContextSize => self.max_context_size.to_string(),
            ConfigKey::MaxCaptureLines => self.max_capture_lines.to_string(),
            ConfigKey::KeepRecentMessages => self.keep_recent_messages.to_string(),
            ConfigKey::WhitelistPatterns => format_list(&self.whitelist_patterns),
            ConfigKey::BlacklistPatterns => format_list(&self.blacklist_patterns),
        }
    }
}

fn format_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_default()
}

// ── Keys ───────────────────────────────────────────────────────────

/// Settings that can be overridden for the running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKey {
    WaitInterval,
    MaxContextSize,
    MaxCaptureLines,
    KeepRecentMessages,
    WhitelistPatterns,
    BlacklistPatterns,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::WaitInterval,
        ConfigKey::MaxContextSize,
        ConfigKey::MaxCaptureLines,
        ConfigKey::KeepRecentMessages,
        ConfigKey::WhitelistPatterns,
        ConfigKey::BlacklistPatterns,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::WaitInterval => "wait_interval",
            ConfigKey::MaxContextSize => "max_context_size",
            ConfigKey::MaxCaptureLines => "max_capture_lines",
            ConfigKey::KeepRecentMessages => "keep_recent_messages",
            ConfigKey::WhitelistPatterns => "whitelist_patterns",
            ConfigKey::BlacklistPatterns => "blacklist_patterns",
        }
    }

    fn is_list(self) -> bool {
        matches!(self, ConfigKey::WhitelistPatterns | ConfigKey::BlacklistPatterns)
    }

    /// Smallest accepted numeric value.
    fn minimum(self) -> u64 {
        match self {
            ConfigKey::KeepRecentMessages => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| {
                let known: Vec<_> = ConfigKey::ALL.iter().map(|k| k.as_str()).collect();
                EngineError::Config(format!(
                    "unknown setting `{s}` (known: {})",
                    known.join(", ")
                ))
            })
    }
}

// ── SessionOverrides ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideValue {
    Number(u64),
    List(Vec<String>),
}

/// Session-only setting overrides, validated when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOverrides {
    values: BTreeMap<ConfigKey, OverrideValue>,
}

impl SessionOverrides {
    /// Parse and store `raw` for `key`.
    ///
    /// Numeric keys take a non-negative integer. List keys take a JSON
    /// array of strings or a comma-separated string.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<ConfigKey, EngineError> {
        let key: ConfigKey = key.parse()?;
        let value = if key.is_list() {
            OverrideValue::List(parse_list(raw)?)
        } else {
            let n: u64 = raw.trim().parse().map_err(|_| {
                EngineError::Config(format!("`{key}` expects a whole number, got `{raw}`"))
            })?;
            if n < key.minimum() {
                return Err(EngineError::Config(format!(
                    "`{key}` must be at least {}",
                    key.minimum()
                )));
            }
            OverrideValue::Number(n)
        };
        self.values.insert(key, value);
        Ok(key)
    }

    pub fn get(&self, key: ConfigKey) -> Option<&OverrideValue> {
        self.values.get(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = ConfigKey> + '_ {
        self.values.keys().copied()
    }
}

fn parse_list(raw: &str) -> Result<Vec<String>, EngineError> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        let items: Vec<String> = serde_json::from_str(raw)
            .map_err(|e| EngineError::Config(format!("invalid pattern list: {e}")))?;
        return Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect());
    }
    Ok(raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
