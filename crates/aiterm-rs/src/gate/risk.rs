//! Data-driven risk scoring for candidate commands.
//!
//! A [`RiskScorer`] is an ordered list of [`RiskRule`]s evaluated
//! first-match-wins. The verdict is a label shown next to the confirmation
//! prompt; it is advisory and does not block anything on its own.

use crate::error::EngineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Advisory risk label, ordered `Safe < Unknown < Dangerous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Unknown,
    Dangerous,
}

impl RiskLevel {
    /// Short marker shown before the confirmation prompt.
    pub fn marker(self) -> &'static str {
        match self {
            RiskLevel::Safe => "[safe]",
            RiskLevel::Unknown => "[unknown]",
            RiskLevel::Dangerous => "[DANGEROUS]",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Safe => write!(f, "Safe"),
            RiskLevel::Unknown => write!(f, "Unknown"),
            RiskLevel::Dangerous => write!(f, "Dangerous"),
        }
    }
}

/// A level plus the reason it was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub rationale: String,
}

impl RiskAssessment {
    pub fn new(level: RiskLevel, rationale: impl Into<String>) -> Self {
        Self {
            level,
            rationale: rationale.into(),
        }
    }
}

/// One compiled scoring rule.
#[derive(Debug, Clone)]
pub struct RiskRule {
    pattern: Regex,
    pub level: RiskLevel,
    pub rationale: String,
}

impl RiskRule {
    pub fn new(
        pattern: &str,
        level: RiskLevel,
        rationale: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let pattern = Regex::new(pattern).map_err(|e| {
            EngineError::Config(format!("invalid risk rule pattern `{pattern}`: {e}"))
        })?;
        Ok(Self {
            pattern,
            level,
            rationale: rationale.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, command: &str) -> bool {
        self.pattern.is_match(command)
    }
}

/// Uncompiled rule as it appears in the config file.
///
/// ```toml
/// [[risk_rules]]
/// pattern = "^terraform\\s+destroy"
/// level = "dangerous"
/// rationale = "destroys infrastructure"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRuleConfig {
    pub pattern: String,
    pub level: RiskLevel,
    pub rationale: String,
}

impl TryFrom<&RiskRuleConfig> for RiskRule {
    type Error = EngineError;

    fn try_from(config: &RiskRuleConfig) -> Result<Self, Self::Error> {
        RiskRule::new(&config.pattern, config.level, config.rationale.clone())
    }
}

/// (pattern, level, rationale), highest-severity rules first.
const DEFAULT_RULES: &[(&str, RiskLevel, &str)] = &[
    (
        r"\brm\s+(.*\s)?(-[a-zA-Z]*[rRf]|--(recursive|force))",
        RiskLevel::Dangerous,
        "recursive or forced file deletion",
    ),
    (
        r"\b(mkfs(\.\w+)?|fdisk|parted|wipefs|sfdisk)\b",
        RiskLevel::Dangerous,
        "formats or repartitions a disk",
    ),
    (
        r"\bdd\s+.*\bof=",
        RiskLevel::Dangerous,
        "raw write to a file or device",
    ),
    (
        r">\s*/dev/(sd|nvme|hd|disk|mmcblk)",
        RiskLevel::Dangerous,
        "overwrites a block device",
    ),
    (
        r":\(\)\s*\{\s*:\|:&\s*\};:",
        RiskLevel::Dangerous,
        "fork bomb",
    ),
    (
        r"\b(shutdown|reboot|halt|poweroff)\b",
        RiskLevel::Dangerous,
        "changes the machine power state",
    ),
    (
        r"\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?(ba|z|da|k)?sh\b",
        RiskLevel::Dangerous,
        "pipes a remote script into a shell",
    ),
    (
        r"\bchmod\s+(-R\s+)?0?777\b",
        RiskLevel::Dangerous,
        "makes files world-writable",
    ),
    (
        r"\bchown\s+-R\b",
        RiskLevel::Dangerous,
        "recursive ownership change",
    ),
    (
        r"\bgit\s+(push\s+.*(--force|-f\b)|reset\s+--hard|clean\s+-[a-zA-Z]*f)",
        RiskLevel::Dangerous,
        "rewrites or discards git history or work",
    ),
    (
        r"^\s*sudo\b|\|\s*sudo\b",
        RiskLevel::Unknown,
        "runs with elevated privileges",
    ),
    (
        r";|&&|\|\||\||\$\(|`",
        RiskLevel::Unknown,
        "compound command",
    ),
    (r">", RiskLevel::Unknown, "redirects output to a file"),
    (
        r"^\s*(ls|ll|pwd|cat|less|more|head|tail|grep|rg|find|which|whoami|id|date|uptime|echo|env|printenv|df|du|free|ps|top|htop|uname|hostname|wc|stat|file|tree)\b",
        RiskLevel::Safe,
        "read-only inspection command",
    ),
    (
        r"^\s*git\s+(status|log|diff|show|branch|remote\s+-v)\b",
        RiskLevel::Safe,
        "read-only git query",
    ),
    (r"^\s*(cd|clear)\b", RiskLevel::Safe, "shell navigation"),
];

/// Deterministic first-match-wins scorer.
#[derive(Debug, Clone)]
pub struct RiskScorer {
    rules: Vec<RiskRule>,
}

impl RiskScorer {
    pub fn new(rules: Vec<RiskRule>) -> Self {
        Self { rules }
    }

    /// Compile a rule table from config entries.
    pub fn from_config(rules: &[RiskRuleConfig]) -> Result<Self, EngineError> {
        let rules = rules
            .iter()
            .map(RiskRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RiskRule] {
        &self.rules
    }

    /// Score a command. No matching rule yields `Unknown`.
    pub fn score(&self, command: &str) -> RiskAssessment {
        self.rules
            .iter()
            .find(|rule| rule.matches(command))
            .map(|rule| RiskAssessment::new(rule.level, rule.rationale.clone()))
            .unwrap_or_else(|| RiskAssessment::new(RiskLevel::Unknown, "no rule matched"))
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .filter_map(|(pattern, level, rationale)| {
                RiskRule::new(pattern, *level, *rationale).ok()
            })
            .collect();
        Self { rules }
    }
}
