//! Token budget tracking and squash planning.
//!
//! Token counts are a character-based estimate: `ceil(chars / chars_per_token)`.
//! The estimate covers the conversation plus every loaded knowledge base.
//! Once it exceeds [`SQUASH_THRESHOLD`] of the configured maximum, the
//! coordinator summarizes the oldest part of the conversation.

use crate::agent::session::{ChatMessage, MessageKind};
use std::ops::Range;

/// Default characters per token. Most tokenizers average 3-4 chars per
/// token on English text and shell output.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Usage fraction above which an automatic squash runs (strictly greater).
pub const SQUASH_THRESHOLD: f64 = 0.80;

/// Estimates usage and decides what can be squashed.
///
/// The manager never touches the message sequence; it returns a
/// [`SquashPlan`] that the coordinator applies.
#[derive(Debug, Clone)]
pub struct ContextBudgetManager {
    max_tokens: usize,
    chars_per_token: f64,
    keep_recent: usize,
}

impl ContextBudgetManager {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            keep_recent: 6,
        }
    }

    pub fn with_chars_per_token(mut self, cpt: f64) -> Self {
        if cpt > 0.0 {
            self.chars_per_token = cpt;
        }
        self
    }

    /// Number of most recent messages that are never squashed.
    pub fn with_keep_recent(mut self, n: usize) -> Self {
        self.keep_recent = n;
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn estimate_tokens(&self, text: &str) -> usize {
        (text.chars().count() as f64 / self.chars_per_token).ceil() as usize
    }

    pub fn estimate_messages(&self, messages: &[ChatMessage]) -> usize {
        messages.iter().map(|m| self.estimate_tokens(&m.content)).sum()
    }

    pub fn estimate_usage(&self, messages: &[ChatMessage], knowledge_tokens: usize) -> ContextUsage {
        let message_tokens = self.estimate_messages(messages);
        let estimated_tokens = message_tokens + knowledge_tokens;
        let usage_pct = if self.max_tokens > 0 {
            estimated_tokens as f64 / self.max_tokens as f64
        } else {
            1.0
        };

        ContextUsage {
            message_tokens,
            knowledge_tokens,
            estimated_tokens,
            max_tokens: self.max_tokens,
            usage_pct,
        }
    }

    pub fn needs_squash(&self, usage: &ContextUsage) -> bool {
        usage.usage_pct > SQUASH_THRESHOLD
    }

    /// The span of messages a squash would replace, or `None` when there is
    /// nothing worth summarizing.
    ///
    /// The pinned system message (index 0, not from the user) and the last
    /// `keep_recent` messages are excluded. A prefix that is only a previous
    /// summary is not summarizable.
    pub fn plan_squash(&self, messages: &[ChatMessage]) -> Option<SquashPlan> {
        let start = match messages.first() {
            Some(first) if !first.from_user => 1,
            _ => 0,
        };
        let end = messages.len().saturating_sub(self.keep_recent);
        if end <= start {
            return None;
        }

        let prefix = &messages[start..end];
        if prefix.iter().all(|m| m.kind == MessageKind::Summary) {
            return None;
        }

        Some(SquashPlan {
            range: start..end,
            prefix_tokens: self.estimate_messages(prefix),
        })
    }
}

/// A squash the coordinator may apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquashPlan {
    /// Indices of the messages to replace with a single summary.
    pub range: Range<usize>,
    /// Estimated tokens of the replaced span. A summary must come in
    /// strictly below this.
    pub prefix_tokens: usize,
}

/// Snapshot of context usage at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextUsage {
    pub message_tokens: usize,
    pub knowledge_tokens: usize,
    pub estimated_tokens: usize,
    pub max_tokens: usize,
    /// Usage as a fraction (0.0 to 1.0+).
    pub usage_pct: f64,
}

impl ContextUsage {
    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "context: ~{} tokens ({:.1}% of {}; messages {}, knowledge {})",
            self.estimated_tokens,
            self.usage_pct * 100.0,
            self.max_tokens,
            self.message_tokens,
            self.knowledge_tokens,
        )
    }
}
