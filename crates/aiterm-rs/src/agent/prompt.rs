//! System prompt assembly.
//!
//! [`SystemPromptBuilder`] joins a preamble and headed sections. The
//! functions below build the assistant's default instructions, the watch
//! mode instructions, and the per-request instructions with loaded
//! knowledge bases appended.

use crate::context::KnowledgeSet;
use crate::protocol::PROTOCOL_GUIDE;

/// Builder for multi-section system prompts.
///
/// Sections are joined with double newlines. Empty sections are skipped.
///
/// ```
/// use aiterm_rs::agent::prompt::SystemPromptBuilder;
///
/// let prompt = SystemPromptBuilder::new("You are a terminal assistant.")
///     .section("Panes", "Commands run in pane %2.")
///     .section("Watch goal", "")
///     .build();
///
/// assert!(prompt.contains("## Panes"));
/// assert!(!prompt.contains("## Watch goal"));
/// ```
pub struct SystemPromptBuilder {
    sections: Vec<String>,
}

impl SystemPromptBuilder {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
        }
    }

    /// Append a `## heading` section. Skipped if `content` is blank.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.trim().is_empty() {
            self.sections.push(format!("## {heading}\n\n{}", content.trim_end()));
        }
        self
    }

    /// Append text without a heading. Skipped if blank.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.trim().is_empty() {
            self.sections.push(content);
        }
        self
    }

    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }

    /// Instructions pinned at the start of every chat session.
    pub fn default_instructions() -> String {
        SystemPromptBuilder::new(
            "You are AITerm, an assistant living in a terminal multiplexer. The user talks \
             to you in the chat pane. You act on their behalf in a separate exec pane by \
             running shell commands, sending keys or pasting text, then reading the pane \
             output that is sent back to you.",
        )
        .section(
            "How to work",
            "\
- Work step by step. Propose one action, look at its result, then decide the next.
- Prefer read-only inspection before changing anything.
- Every command is shown to the user for confirmation and may be declined or edited.
- If a command was declined, do not retry it unchanged; ask or choose another way.
- When an interactive program is open in the exec pane, use key presses to drive it.
- When the exec pane is still busy, say so and wait instead of sending new commands.
- When you need information only the user has, ask and wait for the answer.
- When the request is done, say so briefly and mark it accomplished.",
        )
        .section("Reply format", PROTOCOL_GUIDE)
        .build()
    }

    /// Instructions for watch mode: suggestions only, never actions.
    pub fn watch_instructions(goal: &str) -> String {
        SystemPromptBuilder::new(
            "You are AITerm in watch mode. You periodically receive the content of the \
             user's terminal panes. You cannot run anything. Offer a short, concrete \
             suggestion when you notice something relevant to the watch goal. When there \
             is nothing useful to say, reply with <NoComment>1</NoComment> only.",
        )
        .section("Watch goal", goal)
        .build()
    }
}

/// Per-request instructions: the pinned instructions followed by one
/// section per loaded knowledge base.
pub fn compose_instructions(base: &str, knowledge: &KnowledgeSet) -> String {
    SystemPromptBuilder::new(base).raw(knowledge.render()).build()
}
