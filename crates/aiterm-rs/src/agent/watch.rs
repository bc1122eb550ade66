//! Watch mode: periodic, suggestion-only observation of the user's panes.
//!
//! Each cycle captures every pane in the window except the chat pane and,
//! when anything changed, asks the model for a suggestion toward the watch
//! goal. Replies never run anything. A reply marked `NoComment` is dropped.

use super::config::EngineConfig;
use super::coordinator::call_backend;
use super::events::{EngineEvent, EventHandler, NoopHandler};
use super::prompt::{SystemPromptBuilder, compose_instructions};
use super::session::{Session, SessionControl};
use super::wait::{Countdown, WaitOutcome};
use crate::Message;
use crate::api::AiBackend;
use crate::context::{ContextBudgetManager, SQUASH_THRESHOLD};
use crate::error::PaneError;
use crate::pane::PaneCollaborator;
use crate::protocol::ResponseParser;
use tracing::{debug, info, warn};

/// How a watch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOutcome {
    pub cycles: u32,
    pub suggestions: u32,
}

pub struct WatchLoop<'a> {
    backend: &'a dyn AiBackend,
    pane: &'a dyn PaneCollaborator,
    config: &'a EngineConfig,
    control: &'a SessionControl,
    session: &'a Session,
    goal: &'a str,
    event_handler: &'a dyn EventHandler,
    parser: ResponseParser,
    max_cycles: Option<u32>,
}

impl<'a> WatchLoop<'a> {
    pub fn new(
        backend: &'a dyn AiBackend,
        pane: &'a dyn PaneCollaborator,
        config: &'a EngineConfig,
        control: &'a SessionControl,
        session: &'a Session,
        goal: &'a str,
    ) -> Self {
        Self {
            backend,
            pane,
            config,
            control,
            session,
            goal,
            event_handler: &NoopHandler,
            parser: ResponseParser::new(),
            max_cycles: None,
        }
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Stop after `n` cycles instead of waiting for an interrupt.
    pub fn with_max_cycles(mut self, n: u32) -> Self {
        self.max_cycles = Some(n);
        self
    }

    pub async fn run(&self) -> WatchOutcome {
        let instructions = compose_instructions(
            &SystemPromptBuilder::watch_instructions(self.goal),
            &self.session.knowledge,
        );
        let mut last_sent: Option<String> = None;
        let mut outcome = WatchOutcome {
            cycles: 0,
            suggestions: 0,
        };
        info!("Watching window {} for: {}", self.session.window, self.goal);

        loop {
            if self.control.is_interrupted() {
                break;
            }

            match self.capture_panes() {
                Ok(snapshot) if last_sent.as_deref() == Some(snapshot.as_str()) => {
                    debug!("Panes unchanged; skipping watch request");
                }
                Ok(snapshot) => {
                    let snapshot = self.fit_to_budget(&instructions, snapshot);
                    let messages = [Message::user(snapshot.clone())];
                    match call_backend(self.backend, self.config, &instructions, &messages).await {
                        Ok(raw) => {
                            let action = self.parser.parse(&raw);
                            if action.payload().is_some() {
                                debug!("Ignoring action in watch reply");
                            }
                            if !action.no_comment && action.has_visible_message() {
                                outcome.suggestions += 1;
                                self.event_handler
                                    .on_event(&EngineEvent::WatchSuggestion(&action.message));
                            }
                            last_sent = Some(snapshot);
                        }
                        Err(e) => {
                            warn!("Watch request failed: {e}");
                            self.event_handler.on_event(&EngineEvent::BackendFailed(&e));
                        }
                    }
                }
                Err(e) => {
                    let message = format!("Watch capture failed: {e}");
                    warn!("{message}");
                    self.event_handler.on_event(&EngineEvent::Warning(&message));
                }
            }

            outcome.cycles += 1;
            if self.max_cycles.is_some_and(|max| outcome.cycles >= max) {
                break;
            }

            let handler = self.event_handler;
            let waited = Countdown::new(self.config.wait_interval)
                .run(self.control, |remaining, paused| {
                    handler.on_event(&EngineEvent::WaitTick { remaining, paused });
                })
                .await;
            if waited == WaitOutcome::Interrupted {
                break;
            }
        }

        info!(
            "Watch stopped after {} cycle(s), {} suggestion(s)",
            outcome.cycles, outcome.suggestions
        );
        outcome
    }

    /// Every pane except the chat pane, one headed block each.
    fn capture_panes(&self) -> Result<String, PaneError> {
        let panes = self.pane.list_panes(&self.session.window)?;
        let mut blocks = Vec::new();
        for pane in panes.iter().filter(|p| p.id != self.session.chat_pane) {
            let capture = self.pane.capture(&pane.id, self.config.max_capture_lines)?;
            blocks.push(format!(
                "=== Pane {} ({}) ===\n{}",
                pane.id,
                pane.current_command,
                capture.trim_end()
            ));
        }
        if blocks.is_empty() {
            return Err(PaneError::NoTarget(format!(
                "no panes to watch in window {}",
                self.session.window
            )));
        }
        Ok(blocks.join("\n\n"))
    }

    /// Keep the newest part of the snapshot within the squash threshold.
    fn fit_to_budget(&self, instructions: &str, snapshot: String) -> String {
        let budget = ContextBudgetManager::new(self.config.max_context_size)
            .with_chars_per_token(self.config.chars_per_token);
        let limit = (self.config.max_context_size as f64 * SQUASH_THRESHOLD) as usize;
        let fixed = budget.estimate_tokens(instructions);
        if fixed + budget.estimate_tokens(&snapshot) <= limit {
            return snapshot;
        }

        let keep_chars = (limit.saturating_sub(fixed) as f64 * self.config.chars_per_token) as usize;
        let total = snapshot.chars().count();
        let cut = snapshot
            .char_indices()
            .nth(total.saturating_sub(keep_chars))
            .map_or(snapshot.len(), |(i, _)| i);
        debug!("Watch snapshot trimmed to its last {keep_chars} characters");
        snapshot.get(cut..).unwrap_or_default().to_string()
    }
}
