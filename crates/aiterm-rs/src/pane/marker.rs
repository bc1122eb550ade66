//! Prompt-marker parsing for prepared panes.
//!
//! A prepared shell prints a prompt ending in `[<exit code>]» `. Each
//! command then appears in the scrollback as
//!
//! ```text
//! ~/src [0]» make test
//! ...output...
//! ~/src [2]»
//! ```
//!
//! The exit code shown on a prompt belongs to the command *before* it.

use crate::agent::session::CommandExecHistory;
use regex::Regex;
use std::sync::LazyLock;

static PROMPT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>.*?)\[(?P<code>-?\d+)\]» ?(?P<command>.*)$").ok()
});

/// One prompt line found in a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLine {
    pub exit_code: i32,
    /// Text typed after the marker (empty at an idle prompt).
    pub command: String,
}

/// Parse one line as a prompt marker.
pub fn parse_prompt_line(line: &str) -> Option<PromptLine> {
    let re = PROMPT.as_ref()?;
    let caps = re.captures(line.trim_end())?;
    let exit_code = caps.name("code")?.as_str().parse().ok()?;
    let command = caps
        .name("command")
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some(PromptLine { exit_code, command })
}

/// Whether the pane shows an idle prepared prompt on its last line.
pub fn is_prepared(capture: &str) -> bool {
    capture
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .and_then(parse_prompt_line)
        .is_some_and(|p| p.command.is_empty())
}

/// Every completed command visible in `capture`, oldest first.
///
/// A command is complete once a later prompt line reports its exit code.
pub fn parse_history(capture: &str) -> Vec<CommandExecHistory> {
    let lines: Vec<&str> = capture.lines().collect();
    let prompts: Vec<(usize, PromptLine)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, l)| parse_prompt_line(l).map(|p| (i, p)))
        .collect();

    prompts
        .windows(2)
        .filter(|pair| !pair[0].1.command.is_empty())
        .map(|pair| {
            let (start, first) = &pair[0];
            let (end, next) = &pair[1];
            CommandExecHistory {
                command: first.command.clone(),
                output: lines[*start + 1..*end].join("\n").trim_end().to_string(),
                exit_code: next.exit_code,
            }
        })
        .collect()
}

/// Result of scanning a pane for markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerScan {
    pub prepared: bool,
    pub history: Vec<CommandExecHistory>,
}

impl MarkerScan {
    pub fn from_capture(capture: &str) -> Self {
        Self {
            prepared: is_prepared(capture),
            history: parse_history(capture),
        }
    }

    /// The newest entry completed after `baseline` was taken.
    ///
    /// New entries show up as a longer history or, once old entries scroll
    /// out of the capture window, as a different last entry.
    pub fn completed_after(&self, baseline: &MarkerScan) -> Option<&CommandExecHistory> {
        let last = self.history.last()?;
        if self.history.len() > baseline.history.len() || baseline.history.last() != Some(last) {
            Some(last)
        } else {
            None
        }
    }
}
