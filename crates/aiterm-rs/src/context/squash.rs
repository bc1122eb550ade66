//! Summarization request for context squashing.
//!
//! A squash replaces the oldest span of the conversation with one summary
//! message. When the span already starts with an earlier summary, that
//! summary is merged rather than nested.

use crate::agent::session::{ChatMessage, MessageKind};

const SQUASH_PROMPT: &str = "\
Summarize the following terminal-assistant conversation concisely. Focus on:
- The user's goals and which of them are done
- Commands that were run, with their outcome and exit codes where known
- Errors encountered and approaches that failed
- File paths, hostnames, package names and values the user supplied
- What remains to be done

Rules:
- Only include facts stated in the messages. Do not infer.
- Preserve commands, paths and error messages verbatim.
- Keep it short. The summary must be much smaller than the messages.
- If there is an existing summary, merge the new information into it to \
  produce a single summary that replaces it entirely.
- Reply with the summary text only, without protocol tags.";

/// Heading that marks a squash summary inside the conversation.
pub const SUMMARY_HEADER: &str = "[Summary of earlier conversation]";

/// Build the `(instructions, content)` pair for a one-shot summarization
/// call over `span`.
pub fn build_squash_request(span: &[ChatMessage]) -> (String, String) {
    let mut content = String::new();

    let (existing, rest) = match span.split_first() {
        Some((first, rest)) if first.kind == MessageKind::Summary => (Some(first), rest),
        _ => (None, span),
    };

    if let Some(summary) = existing {
        content.push_str("=== EXISTING SUMMARY ===\n");
        content.push_str(strip_summary_header(&summary.content));
        content.push_str("\n\n=== NEW MESSAGES TO SUMMARIZE ===\n");
    }

    for msg in rest {
        let role = if msg.from_user { "user" } else { "assistant" };
        content.push_str(&format!("[{role}]: {}\n\n", msg.content));
    }

    (SQUASH_PROMPT.to_string(), content)
}

/// Wrap summary text into the message that replaces the squashed span.
pub fn summary_message(summary: &str) -> ChatMessage {
    ChatMessage::summary(format!("{SUMMARY_HEADER}\n{}", summary.trim()))
}

fn strip_summary_header(content: &str) -> &str {
    content
        .strip_prefix(SUMMARY_HEADER)
        .map(str::trim_start)
        .unwrap_or(content)
}
