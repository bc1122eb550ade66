//! Events and handlers for the [`ExecutionCoordinator`](super::coordinator::ExecutionCoordinator)
//! and the [`WatchLoop`](super::watch::WatchLoop).
//!
//! The engine talks to its front end through [`EngineEvent`] variants that
//! cover one session's lifecycle: AI round-trips, gating, dispatch, waits,
//! squashes and failures. Front ends implement [`EventHandler`] to render
//! them and to answer confirmation prompts.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests; declines every confirmation |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |
//! | Custom `impl EventHandler` | Full control (console, approval prompts) |

use super::session::{CommandExecHistory, SessionStatus};
use crate::context::ContextUsage;
use crate::error::AiBackendError;
use crate::gate::RiskAssessment;
use crate::protocol::ActionKind;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the engine during a session.
#[derive(Debug)]
pub enum EngineEvent<'a> {
    StatusChanged(SessionStatus),
    /// An AI round-trip is about to start.
    RoundStart {
        iteration: u32,
        max_iterations: u32,
        context_usage: &'a ContextUsage,
    },
    /// Visible text from the AI.
    AiMessage(&'a str),
    /// A payload needs the user's decision. The handler answers with an
    /// [`EventResponse`]; `None` declines.
    ConfirmationRequired {
        kind: ActionKind,
        command: &'a str,
        assessment: &'a RiskAssessment,
        blacklisted: bool,
    },
    /// A payload matched the whitelist and runs without asking.
    AutoApproved {
        kind: ActionKind,
        command: &'a str,
        assessment: &'a RiskAssessment,
    },
    Declined {
        command: &'a str,
        reason: Option<&'a str>,
    },
    Dispatched { kind: ActionKind, command: &'a str },
    DispatchFailed { command: &'a str, error: &'a str },
    /// A countdown (`prepared == false`) or marker poll started.
    WaitStarted { interval: Duration, prepared: bool },
    WaitTick { remaining: Duration, paused: bool },
    WaitFinished,
    /// A completion marker was observed in prepared mode.
    CommandCompleted(&'a CommandExecHistory),
    Squashed {
        before_tokens: usize,
        after_tokens: usize,
        replaced: usize,
    },
    SquashFailed(&'a str),
    BackendFailed(&'a AiBackendError),
    /// A passive suggestion produced in watch mode.
    WatchSuggestion(&'a str),
    /// The AI signalled the request is accomplished.
    Finished,
    Interrupted,
    IterationLimitReached { max_iterations: u32 },
    /// Any other recovered problem worth showing.
    Warning(&'a str),
}

/// Answer to [`EngineEvent::ConfirmationRequired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResponse {
    /// Run the payload as proposed.
    Approve,
    /// Run this text instead.
    Edit(String),
    /// Discard the payload, with an optional reason for the AI.
    Deny(String),
}

/// Handler for engine events.
///
/// Most events are informational and the return value is ignored. For
/// [`EngineEvent::ConfirmationRequired`] the return value is the user's
/// decision, and `None` is treated as a decline.
///
/// # Example
///
/// ```
/// use aiterm_rs::agent::events::{EngineEvent, EventHandler, EventResponse};
/// use aiterm_rs::gate::RiskLevel;
///
/// struct SafeOnly;
///
/// impl EventHandler for SafeOnly {
///     fn on_event(&self, event: &EngineEvent<'_>) -> Option<EventResponse> {
///         match event {
///             EngineEvent::AiMessage(text) => println!("{text}"),
///             EngineEvent::ConfirmationRequired { assessment, .. }
///                 if assessment.level == RiskLevel::Safe =>
///             {
///                 return Some(EventResponse::Approve);
///             }
///             _ => {}
///         }
///         None
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &EngineEvent<'_>) -> Option<EventResponse> {
        let _ = event;
        None
    }
}

/// A no-op event handler. Declines every confirmation.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler that delegates to multiple inner handlers.
///
/// Events are dispatched to all handlers in order. The first non-`None`
/// response is returned.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(console_handler);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain. Handlers are called in registration order.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &EngineEvent<'_>) -> Option<EventResponse> {
        let mut first = None;
        for handler in &self.handlers {
            let response = handler.on_event(event);
            if first.is_none() {
                first = response;
            }
        }
        first
    }
}

/// An event handler that logs events via `tracing`. Never answers a
/// confirmation.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &EngineEvent<'_>) -> Option<EventResponse> {
        match event {
            EngineEvent::StatusChanged(status) => debug!("Status: {status}"),
            EngineEvent::RoundStart {
                iteration,
                max_iterations,
                context_usage,
            } => {
                info!(
                    "[round {}/{}] {}",
                    iteration,
                    max_iterations,
                    context_usage.to_log_string()
                );
            }
            EngineEvent::AiMessage(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "AI message: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            EngineEvent::ConfirmationRequired {
                kind,
                command,
                assessment,
                blacklisted,
            } => {
                info!(
                    "Confirmation required for {kind} `{command}`: {} ({}){}",
                    assessment.level,
                    assessment.rationale,
                    if *blacklisted { " [blacklisted]" } else { "" }
                );
            }
            EngineEvent::AutoApproved { kind, command, .. } => {
                info!("Whitelisted {kind} auto-approved: `{command}`");
            }
            EngineEvent::Declined { command, reason } => match reason {
                Some(reason) => info!("Declined `{command}`: {reason}"),
                None => info!("Declined `{command}`"),
            },
            EngineEvent::Dispatched { kind, command } => {
                debug!("Dispatched {kind}: `{command}`");
            }
            EngineEvent::DispatchFailed { command, error } => {
                warn!("Dispatch of `{command}` failed: {error}");
            }
            EngineEvent::WaitStarted { interval, prepared } => {
                debug!(
                    "Waiting {:.1}s ({})",
                    interval.as_secs_f64(),
                    if *prepared { "marker poll" } else { "countdown" }
                );
            }
            EngineEvent::WaitTick { remaining, paused } => {
                trace!("Wait tick: {:.1}s left, paused={paused}", remaining.as_secs_f64());
            }
            EngineEvent::WaitFinished => trace!("Wait finished"),
            EngineEvent::CommandCompleted(entry) => {
                info!("`{}` exited with {}", entry.command, entry.exit_code);
            }
            EngineEvent::Squashed {
                before_tokens,
                after_tokens,
                replaced,
            } => {
                info!("Squashed {replaced} message(s): ~{before_tokens} → ~{after_tokens} tokens");
            }
            EngineEvent::SquashFailed(reason) => {
                warn!("Squash failed: {reason}. Continuing without squashing.");
            }
            EngineEvent::BackendFailed(err) => warn!("{err}"),
            EngineEvent::WatchSuggestion(text) => {
                let preview: String = text.chars().take(200).collect();
                info!("Watch suggestion: {preview}");
            }
            EngineEvent::Finished => info!("Request accomplished"),
            EngineEvent::Interrupted => info!("Interrupted by user"),
            EngineEvent::IterationLimitReached { max_iterations } => {
                warn!("Stopped after {max_iterations} AI round-trips");
            }
            EngineEvent::Warning(text) => warn!("{text}"),
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn noop_handler_declines() {
        let assessment = RiskAssessment::new(crate::gate::RiskLevel::Safe, "read-only");
        let event = EngineEvent::ConfirmationRequired {
            kind: ActionKind::Command,
            command: "ls",
            assessment: &assessment,
            blacklisted: false,
        };
        assert_eq!(NoopHandler.on_event(&event), None);
        assert_eq!(LoggingHandler.on_event(&event), None);
    }

    struct Counting {
        seen: Arc<AtomicUsize>,
        response: Option<EventResponse>,
    }

    impl EventHandler for Counting {
        fn on_event(&self, _event: &EngineEvent<'_>) -> Option<EventResponse> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    #[test]
    fn composite_returns_first_response_and_notifies_all() {
        let seen = Arc::new(AtomicUsize::new(0));
        let handler = CompositeEventHandler::new()
            .with(LoggingHandler)
            .with(Counting {
                seen: seen.clone(),
                response: None,
            })
            .with(Counting {
                seen: seen.clone(),
                response: Some(EventResponse::Deny("first".into())),
            })
            .with(Counting {
                seen: seen.clone(),
                response: Some(EventResponse::Approve),
            });

        let response = handler.on_event(&EngineEvent::Finished);
        assert_eq!(response, Some(EventResponse::Deny("first".into())));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn empty_composite_declines() {
        assert_eq!(CompositeEventHandler::default().on_event(&EngineEvent::Finished), None);
    }
}
