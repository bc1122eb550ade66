//! Console front end for engine events.
//!
//! Prints the conversation, asks for confirmation before anything runs,
//! and owns the raw-mode key listener while the engine waits.

use crate::keys::KeyListener;
use aiterm_rs::agent::{EngineEvent, EventHandler, EventResponse, SessionControl};
use aiterm_rs::gate::RiskAssessment;
use aiterm_rs::protocol::ActionKind;
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType, is_raw_mode_enabled};
use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Read one line from stdin without stalling the runtime. `None` at EOF.
pub fn read_line() -> io::Result<Option<String>> {
    tokio::task::block_in_place(|| {
        let mut line = String::new();
        let n = io::stdin().lock().read_line(&mut line)?;
        Ok((n > 0).then_some(line))
    })
}

/// Print a line, clearing any countdown first. Handles raw mode line
/// endings.
pub fn say(text: &str) {
    let mut out = io::stdout().lock();
    let _ = execute!(out, MoveToColumn(0), Clear(ClearType::CurrentLine));
    if is_raw_mode_enabled().unwrap_or(false) {
        let _ = write!(out, "{}\r\n", text.replace('\n', "\r\n"));
    } else {
        let _ = writeln!(out, "{text}");
    }
    let _ = out.flush();
}

fn prompt(text: &str) {
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
    let _ = out.flush();
}

/// `0m 05s` style countdown.
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.as_secs_f64().ceil() as u64;
    format!("{}m {:02}s", secs / 60, secs % 60)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAnswer {
    Yes,
    /// Optional reason passed on to the AI.
    No(String),
    Edit,
}

/// Parse an answer to `Execute? [y]es/[n]o/[e]dit`.
pub fn parse_answer(input: &str) -> Option<ConfirmAnswer> {
    let input = input.trim();
    let (word, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
    match word.to_lowercase().as_str() {
        "y" | "yes" if rest.trim().is_empty() => Some(ConfirmAnswer::Yes),
        "n" | "no" => Some(ConfirmAnswer::No(rest.trim().to_string())),
        "e" | "edit" if rest.trim().is_empty() => Some(ConfirmAnswer::Edit),
        _ => None,
    }
}

fn action_label(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Command => "Run",
        ActionKind::Keys => "Send keys",
        ActionKind::Paste => "Paste",
    }
}

fn describe(kind: ActionKind, command: &str, assessment: &RiskAssessment) -> String {
    let marker = assessment.level.marker();
    match kind {
        ActionKind::Paste => {
            let body: Vec<String> = command.lines().map(|l| format!("    {l}")).collect();
            format!("{marker} {}:\n{}", action_label(kind), body.join("\n"))
        }
        _ => format!("{marker} {}: {command}", action_label(kind)),
    }
}

pub struct ConsoleHandler {
    control: SessionControl,
    listener: Mutex<Option<KeyListener>>,
    interactive: bool,
}

impl ConsoleHandler {
    pub fn new(control: SessionControl) -> Self {
        Self {
            control,
            listener: Mutex::new(None),
            interactive: io::stdin().is_terminal(),
        }
    }

    fn confirm(
        &self,
        kind: ActionKind,
        command: &str,
        assessment: &RiskAssessment,
        blacklisted: bool,
    ) -> Option<EventResponse> {
        say(&describe(kind, command, assessment));
        say(&format!("    {}", assessment.rationale));
        if blacklisted {
            say("    Blacklisted: always asks.");
        }

        loop {
            prompt("Execute? [y]es/[n]o/[e]dit: ");
            let line = match read_line() {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    debug!("Failed to read confirmation: {e}");
                    return None;
                }
            };
            match parse_answer(&line) {
                Some(ConfirmAnswer::Yes) => return Some(EventResponse::Approve),
                Some(ConfirmAnswer::No(reason)) => return Some(EventResponse::Deny(reason)),
                Some(ConfirmAnswer::Edit) => {
                    say(&format!("Current: {command}"));
                    prompt("Edit: ");
                    return match read_line() {
                        Ok(Some(edited)) => Some(EventResponse::Edit(edited.trim().to_string())),
                        _ => None,
                    };
                }
                None => say("Please answer y, n or e."),
            }
        }
    }

    fn start_keys(&self) {
        if !self.interactive {
            return;
        }
        let Ok(mut slot) = self.listener.lock() else {
            return;
        };
        if slot.is_none() {
            match KeyListener::start(self.control.clone()) {
                Ok(listener) => *slot = Some(listener),
                Err(e) => debug!("Key listener unavailable: {e}"),
            }
        }
    }

    fn stop_keys(&self) {
        if let Ok(mut slot) = self.listener.lock() {
            slot.take();
        }
    }
}

impl EventHandler for ConsoleHandler {
    fn on_event(&self, event: &EngineEvent<'_>) -> Option<EventResponse> {
        match event {
            EngineEvent::AiMessage(text) => say(text),
            EngineEvent::ConfirmationRequired {
                kind,
                command,
                assessment,
                blacklisted,
            } => return self.confirm(*kind, command, assessment, *blacklisted),
            EngineEvent::AutoApproved {
                kind,
                command,
                assessment,
            } => say(&format!("{} (whitelisted)", describe(*kind, command, assessment))),
            EngineEvent::Declined { .. } => say("Skipped."),
            EngineEvent::DispatchFailed { error, .. } => {
                say(&format!("Could not reach the exec pane: {error}"));
            }
            EngineEvent::WaitStarted { interval, prepared } => {
                self.start_keys();
                if *prepared {
                    say(&format!(
                        "Waiting up to {} for the command to finish (q stops)",
                        format_countdown(*interval)
                    ));
                }
            }
            EngineEvent::WaitTick { remaining, paused } => {
                let line = if *paused {
                    "Paused (p resumes, q stops)".to_string()
                } else {
                    format!("Waiting {} (p pauses, q stops)", format_countdown(*remaining))
                };
                let mut out = io::stdout().lock();
                let _ = execute!(out, MoveToColumn(0), Clear(ClearType::CurrentLine));
                let _ = write!(out, "{line}");
                let _ = out.flush();
            }
            EngineEvent::WaitFinished => {
                self.stop_keys();
                let _ = execute!(io::stdout(), MoveToColumn(0), Clear(ClearType::CurrentLine));
            }
            EngineEvent::CommandCompleted(entry) if entry.exit_code != 0 => {
                say(&format!("`{}` exited with code {}", entry.command, entry.exit_code));
            }
            EngineEvent::Squashed {
                before_tokens,
                after_tokens,
                replaced,
            } => say(&format!(
                "Context squashed: {replaced} messages summarized, ~{before_tokens} -> ~{after_tokens} tokens"
            )),
            EngineEvent::SquashFailed(reason) => say(&format!("Warning: {reason}")),
            EngineEvent::BackendFailed(error) => say(&format!("AI request failed: {error}")),
            EngineEvent::WatchSuggestion(text) => say(&format!("Suggestion: {text}")),
            EngineEvent::Interrupted => say("Interrupted."),
            EngineEvent::IterationLimitReached { max_iterations } => say(&format!(
                "Stopped after {max_iterations} rounds without finishing. Send a message to continue."
            )),
            EngineEvent::Warning(text) => say(&format!("Warning: {text}")),
            _ => {}
        }
        None
    }
}
