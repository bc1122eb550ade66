//! The terminal-multiplexer contract consumed by the engine.
//!
//! All calls are synchronous and short. Dispatch is fire-and-forget: a
//! successful return only means the multiplexer accepted the keys. The
//! engine treats every call as fallible.

pub mod marker;

pub use marker::{MarkerScan, PromptLine, is_prepared, parse_history, parse_prompt_line};

use crate::error::PaneError;

/// One pane of a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneDetails {
    pub id: String,
    pub active: bool,
    pub pid: u32,
    pub current_command: String,
    pub history_size: usize,
    pub history_limit: usize,
}

/// Operations on panes of a terminal multiplexer.
pub trait PaneCollaborator: Send + Sync {
    /// The last `max_lines` lines of `target`, trimmed.
    fn capture(&self, target: &str, max_lines: usize) -> Result<String, PaneError>;

    /// Send one key token (`q`, `Enter`, `C-c`, ...).
    fn send_keys(&self, target: &str, key: &str) -> Result<(), PaneError>;

    /// Type `command` literally and press Enter.
    fn dispatch_command(&self, target: &str, command: &str) -> Result<(), PaneError>;

    /// Paste a multi-line block verbatim.
    fn paste(&self, target: &str, content: &str) -> Result<(), PaneError>;

    fn list_panes(&self, window: &str) -> Result<Vec<PaneDetails>, PaneError>;

    /// Prompt-marker state of `target`.
    fn scan_markers(&self, target: &str, max_lines: usize) -> Result<MarkerScan, PaneError> {
        let capture = self.capture(target, max_lines)?;
        Ok(MarkerScan::from_capture(&capture))
    }
}
