//! Tag scanner for AI replies.

use super::{Action, tags};
use crate::error::EngineError;
use tracing::{debug, warn};

/// Converts raw AI replies into [`Action`]s.
///
/// ```
/// use aiterm_rs::protocol::ResponseParser;
///
/// let action = ResponseParser::new()
///     .parse("Listing files.\n<ExecCommand>ls -la</ExecCommand>");
/// assert_eq!(action.message, "Listing files.");
/// assert_eq!(action.exec_command, vec!["ls -la".to_string()]);
///
/// let plain = ResponseParser::new().parse("Sure, I will help!");
/// assert_eq!(plain.message, "Sure, I will help!");
/// assert!(plain.exec_command.is_empty());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a reply, degrading to a plain message when it has no usable
    /// structure. Never fails.
    pub fn parse(&self, raw: &str) -> Action {
        match self.try_parse(raw) {
            Ok(action) => action,
            Err(e) => {
                if contains_any_tag(raw) {
                    warn!("{e}. Treating reply as a plain message.");
                } else {
                    debug!("{e}. Treating reply as a plain message.");
                }
                Action::plain(normalize_blank_lines(raw.trim()))
            }
        }
    }

    /// Strict form of [`parse`](Self::parse).
    ///
    /// Returns [`EngineError::MalformedResponse`] when no field is present,
    /// when a known tag is left unclosed, or when a closing tag appears
    /// without its opening tag.
    pub fn try_parse(&self, raw: &str) -> Result<Action, EngineError> {
        let mut action = Action::default();
        let mut message = String::new();
        let mut fields = 0usize;
        let mut rest = raw;

        while let Some(tag) = earliest_open_tag(rest) {
            let open = format!("<{tag}>");
            let close = format!("</{tag}>");

            let Some((before, after_open)) = rest.split_once(open.as_str()) else {
                break;
            };
            reject_stray_close(before)?;
            message.push_str(before);

            let Some((body, after_close)) = after_open.split_once(close.as_str()) else {
                return Err(EngineError::MalformedResponse(format!(
                    "<{tag}> is never closed"
                )));
            };
            if body.contains(open.as_str()) {
                return Err(EngineError::MalformedResponse(format!(
                    "<{tag}> is nested inside itself"
                )));
            }

            apply_field(&mut action, tag, body);
            fields += 1;
            rest = after_close;
        }

        reject_stray_close(rest)?;
        message.push_str(rest);

        if fields == 0 {
            return Err(EngineError::MalformedResponse(
                "no structured fields found".into(),
            ));
        }

        keep_single_payload(&mut action);
        action.message = normalize_blank_lines(message.trim());
        Ok(action)
    }
}

/// Collapse every run of two or more blank lines into a single blank line.
///
/// Whitespace-only lines count as blank. Trailing `\r` is dropped.
pub fn normalize_blank_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;

    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if blank_run > 0 && !out.is_empty() {
            out.push("");
        }
        blank_run = 0;
        out.push(line);
    }

    out.join("\n")
}

// ── Helpers ────────────────────────────────────────────────────────

/// The known tag whose opening form appears first in `text`.
fn earliest_open_tag(text: &str) -> Option<&'static str> {
    tags::ALL
        .iter()
        .filter_map(|tag| text.find(&format!("<{tag}>")).map(|pos| (pos, *tag)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, tag)| tag)
}

fn reject_stray_close(text: &str) -> Result<(), EngineError> {
    match tags::ALL
        .iter()
        .find(|tag| text.contains(&format!("</{tag}>")))
    {
        Some(tag) => Err(EngineError::MalformedResponse(format!(
            "</{tag}> without a matching <{tag}>"
        ))),
        None => Ok(()),
    }
}

fn contains_any_tag(text: &str) -> bool {
    tags::ALL
        .iter()
        .any(|tag| text.contains(&format!("<{tag}>")) || text.contains(&format!("</{tag}>")))
}

fn apply_field(action: &mut Action, tag: &str, body: &str) {
    match tag {
        tags::EXEC_COMMAND => {
            let command = body.trim();
            if !command.is_empty() {
                action.exec_command.push(command.to_string());
            }
        }
        tags::SEND_KEYS => {
            let key = body.trim();
            if !key.is_empty() {
                action.send_keys.push(key.to_string());
            } else if !body.is_empty() {
                // A body of pure whitespace means the space bar.
                action.send_keys.push("Space".to_string());
            }
        }
        tags::PASTE_MULTILINE_CONTENT => {
            if action.paste_multiline_content.is_empty() {
                let content = body.strip_prefix('\n').unwrap_or(body);
                let content = content.strip_suffix('\n').unwrap_or(content);
                action.paste_multiline_content = content.to_string();
            } else {
                warn!("Ignoring repeated <{tag}> field");
            }
        }
        tags::REQUEST_ACCOMPLISHED => action.request_accomplished |= parse_flag(tag, body),
        tags::EXEC_PANE_SEEMS_BUSY => action.exec_pane_seems_busy |= parse_flag(tag, body),
        tags::WAITING_FOR_USER_RESPONSE => {
            action.waiting_for_user_response |= parse_flag(tag, body)
        }
        tags::NO_COMMENT => action.no_comment |= parse_flag(tag, body),
        _ => {}
    }
}

fn parse_flag(tag: &str, body: &str) -> bool {
    match body.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "" | "0" | "false" | "no" => false,
        other => {
            warn!("Unrecognized value {other:?} for <{tag}>; treating as false");
            false
        }
    }
}

/// Enforce the one-payload-per-turn rule by precedence
/// (commands, then keys, then paste).
fn keep_single_payload(action: &mut Action) {
    if !action.exec_command.is_empty() {
        if !action.send_keys.is_empty() || !action.paste_multiline_content.is_empty() {
            warn!("Reply carried several payload kinds; keeping only ExecCommand");
        }
        action.send_keys.clear();
        action.paste_multiline_content.clear();
    } else if !action.send_keys.is_empty() && !action.paste_multiline_content.is_empty() {
        warn!("Reply carried several payload kinds; keeping only SendKeys");
        action.paste_multiline_content.clear();
    }
}
