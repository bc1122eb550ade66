//! The execution loop: ask the model, gate its action, dispatch, wait,
//! observe, repeat.
//!
//! [`ExecutionCoordinator`] owns one [`Session`] and borrows the AI backend
//! and the multiplexer. Each call to [`handle_input`](ExecutionCoordinator::handle_input)
//! runs rounds until the model reports the request accomplished, hands the
//! turn back to the user, or the loop is stopped.

use super::config::{ConfigKey, EngineConfig};
use super::events::{EngineEvent, EventHandler, NoopHandler};
use super::prompt::compose_instructions;
use super::session::{ChatMessage, CommandExecHistory, Session, SessionControl, SessionStatus};
use super::transcript::TranscriptSink;
use super::wait::{CompletionPoll, Countdown, PollOutcome, WaitOutcome};
use super::watch::{WatchLoop, WatchOutcome};
use crate::Message;
use crate::api::AiBackend;
use crate::context::squash::{build_squash_request, summary_message};
use crate::context::{ContextBudgetManager, ContextUsage, KnowledgeBase, KnowledgeStore};
use crate::error::{AiBackendError, EngineError, PaneError};
use crate::gate::{ActionGate, GateOutcome, GateVerdict, PatternSet, RiskScorer};
use crate::pane::{MarkerScan, PaneCollaborator};
use crate::protocol::{ActionKind, Payload, ResponseParser};
use tracing::{debug, info, warn};

/// Why [`ExecutionCoordinator::handle_input`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model marked the request accomplished.
    Done,
    /// The model asked a question, declined to act, or had nothing to run.
    AwaitingUser,
    /// The backend call failed. The session is intact; the user may retry.
    BackendFailed(AiBackendError),
    /// The user interrupted the loop.
    Interrupted,
    /// `max_iterations` rounds ran without a terminal reply.
    IterationLimit,
}

/// Result of a squash attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquashOutcome {
    /// Usage is at or below the threshold.
    NotNeeded,
    /// Only the pinned instructions, a previous summary or the protected
    /// recent messages are left.
    NothingToSquash,
    Squashed {
        before_tokens: usize,
        after_tokens: usize,
        replaced: usize,
    },
    /// The session is unchanged.
    Failed(String),
}

/// One row of the `/config` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingView {
    pub key: ConfigKey,
    pub value: String,
    pub overridden: bool,
}

enum Step {
    Continue,
    Interrupted,
}

enum DispatchResult {
    Finished(Option<CommandExecHistory>),
    Interrupted,
}

/// Drives one session through the ask/gate/dispatch/observe loop.
///
/// Borrows the backend, the pane collaborator and the event handler, so
/// bind them before building the coordinator:
///
/// ```ignore
/// let handler = CompositeEventHandler::new().with(LoggingHandler);
/// let mut coordinator = ExecutionCoordinator::new(&client, &tmux, config, session)
///     .with_event_handler(&handler);
/// let outcome = coordinator.handle_input("why is the disk full?").await;
/// ```
pub struct ExecutionCoordinator<'a> {
    backend: &'a dyn AiBackend,
    pane: &'a dyn PaneCollaborator,
    config: EngineConfig,
    scorer: RiskScorer,
    whitelist: PatternSet,
    blacklist: PatternSet,
    event_handler: &'a dyn EventHandler,
    transcript: Option<&'a dyn TranscriptSink>,
    knowledge_store: Option<&'a dyn KnowledgeStore>,
    control: SessionControl,
    parser: ResponseParser,
    session: Session,
}

impl<'a> ExecutionCoordinator<'a> {
    pub fn new(
        backend: &'a dyn AiBackend,
        pane: &'a dyn PaneCollaborator,
        config: EngineConfig,
        session: Session,
    ) -> Self {
        let mut coordinator = Self {
            backend,
            pane,
            config,
            scorer: RiskScorer::default(),
            whitelist: PatternSet::default(),
            blacklist: PatternSet::default(),
            event_handler: &NoopHandler,
            transcript: None,
            knowledge_store: None,
            control: SessionControl::new(),
            parser: ResponseParser::new(),
            session,
        };
        coordinator.refresh_patterns();
        coordinator
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    pub fn with_scorer(mut self, scorer: RiskScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_transcript(mut self, sink: &'a dyn TranscriptSink) -> Self {
        self.transcript = Some(sink);
        self
    }

    pub fn with_knowledge_store(mut self, store: &'a dyn KnowledgeStore) -> Self {
        self.knowledge_store = Some(store);
        self
    }

    /// Share pause and interrupt state with a front end.
    pub fn with_control(mut self, control: SessionControl) -> Self {
        self.control = control;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn control(&self) -> &SessionControl {
        &self.control
    }

    /// Engine config with the session overrides applied.
    pub fn effective_config(&self) -> EngineConfig {
        self.config.with_overrides(&self.session.overrides)
    }

    fn budget(&self, config: &EngineConfig) -> ContextBudgetManager {
        ContextBudgetManager::new(config.max_context_size)
            .with_chars_per_token(config.chars_per_token)
            .with_keep_recent(config.keep_recent_messages)
    }

    pub fn context_usage(&self) -> ContextUsage {
        let config = self.effective_config();
        self.budget(&config)
            .estimate_usage(&self.session.messages, self.session.knowledge.total_tokens())
    }

    fn emit(&self, event: EngineEvent<'_>) -> Option<super::events::EventResponse> {
        self.event_handler.on_event(&event)
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.session.status != status {
            self.session.status = status;
            self.emit(EngineEvent::StatusChanged(status));
        }
    }

    fn warn_user(&self, message: &str) {
        warn!("{message}");
        self.emit(EngineEvent::Warning(message));
    }

    /// Recompile the whitelist and blacklist from the effective config.
    /// Invalid patterns are reported here, once.
    fn refresh_patterns(&mut self) {
        let config = self.effective_config();
        self.whitelist = PatternSet::new(&config.whitelist_patterns);
        self.blacklist = PatternSet::new(&config.blacklist_patterns);
    }

    // ── Settings ───────────────────────────────────────────────────

    /// Set a per-session override from its textual form.
    pub fn set_override(&mut self, key: &str, raw: &str) -> Result<ConfigKey, EngineError> {
        let key = self.session.overrides.set(key, raw)?;
        if matches!(key, ConfigKey::WhitelistPatterns | ConfigKey::BlacklistPatterns) {
            self.refresh_patterns();
        }
        info!("Session override {key} = {}", self.effective_config().display_value(key));
        Ok(key)
    }

    pub fn get_setting(&self, key: &str) -> Result<String, EngineError> {
        let key: ConfigKey = key.parse()?;
        Ok(self.effective_config().display_value(key))
    }

    pub fn settings(&self) -> Vec<SettingView> {
        let config = self.effective_config();
        ConfigKey::ALL
            .iter()
            .map(|&key| SettingView {
                key,
                value: config.display_value(key),
                overridden: self.session.overrides.get(key).is_some(),
            })
            .collect()
    }

    // ── Knowledge bases ────────────────────────────────────────────

    fn store(&self, name: &str) -> Result<&'a dyn KnowledgeStore, EngineError> {
        self.knowledge_store
            .ok_or_else(|| EngineError::KnowledgeUnavailable {
                name: name.to_string(),
                reason: "no knowledge base directory configured".into(),
            })
    }

    /// Load a knowledge base into the session. Returns its estimated tokens.
    pub fn load_knowledge(&mut self, name: &str) -> Result<usize, EngineError> {
        let content = self.store(name)?.read(name)?;
        let config = self.effective_config();
        let estimated_tokens = self.budget(&config).estimate_tokens(&content);
        self.session.knowledge.insert(KnowledgeBase {
            name: name.to_string(),
            content,
            estimated_tokens,
            loaded: true,
        });
        info!("Loaded knowledge base '{name}' (~{estimated_tokens} tokens)");
        Ok(estimated_tokens)
    }

    pub fn unload_knowledge(&mut self, name: &str) -> bool {
        let removed = self.session.knowledge.remove(name).is_some();
        if removed {
            info!("Unloaded knowledge base '{name}'");
        }
        removed
    }

    /// Every available knowledge base with whether it is loaded.
    pub fn list_knowledge(&self) -> Result<Vec<(String, bool)>, EngineError> {
        let available = self.store("*")?.list()?;
        Ok(available
            .into_iter()
            .map(|name| {
                let loaded = self.session.knowledge.contains(&name);
                (name, loaded)
            })
            .collect())
    }

    /// Load each named base, reporting failures as warnings.
    pub fn auto_load(&mut self, names: &[String]) -> usize {
        let mut loaded = 0;
        for name in names {
            match self.load_knowledge(name) {
                Ok(_) => loaded += 1,
                Err(e) => self.warn_user(&format!("Could not auto-load knowledge base: {e}")),
            }
        }
        loaded
    }

    /// Clear the conversation. Instructions, knowledge and overrides stay.
    pub fn reset(&mut self) {
        self.session.reset();
        self.control.clear_interrupt();
        self.emit(EngineEvent::StatusChanged(self.session.status));
        info!("Session {} reset", self.session.id);
    }

    // ── Main loop ──────────────────────────────────────────────────

    /// Handle one user request.
    ///
    /// The request is sent together with the current exec pane content.
    /// Rounds continue until a terminal reply, an interrupt, a backend
    /// failure or the iteration limit.
    pub async fn handle_input(&mut self, text: &str) -> LoopOutcome {
        self.control.clear_interrupt();
        let config = self.effective_config();

        let content = match self.pane.capture(&self.session.exec_pane, config.max_capture_lines) {
            Ok(capture) => format!(
                "{}\n\n{}",
                text.trim(),
                pane_block(&self.session.exec_pane, &capture)
            ),
            Err(e) => {
                self.warn_user(&format!("Could not capture exec pane: {e}"));
                text.trim().to_string()
            }
        };
        self.session.messages.push(ChatMessage::user(content));

        let outcome = self.run_rounds(&config).await;
        match &outcome {
            LoopOutcome::Done => self.set_status(SessionStatus::Done),
            _ => self.set_status(SessionStatus::Idle),
        }
        outcome
    }

    async fn run_rounds(&mut self, config: &EngineConfig) -> LoopOutcome {
        for iteration in 1..=config.max_iterations {
            if self.control.is_interrupted() {
                info!("Interrupted before round {iteration}");
                self.emit(EngineEvent::Interrupted);
                return LoopOutcome::Interrupted;
            }

            self.squash_if_needed(config).await;

            self.set_status(SessionStatus::AwaitingAi);
            let usage = self.context_usage();
            debug!("Round {iteration}/{}: {}", config.max_iterations, usage.to_log_string());
            self.emit(EngineEvent::RoundStart {
                iteration,
                max_iterations: config.max_iterations,
                context_usage: &usage,
            });

            let raw = match self.request(config).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("AI backend call failed: {e}");
                    self.emit(EngineEvent::BackendFailed(&e));
                    return LoopOutcome::BackendFailed(e);
                }
            };

            let action = self.parser.parse(&raw);
            self.session.messages.push(ChatMessage::assistant(raw));
            if action.has_visible_message() {
                self.emit(EngineEvent::AiMessage(&action.message));
            }

            if action.request_accomplished {
                if action.payload().is_some() {
                    self.warn_user("Reply marked the request accomplished and carried an action; the action was not run");
                }
                info!("Request accomplished after {iteration} round(s)");
                self.emit(EngineEvent::Finished);
                return LoopOutcome::Done;
            }

            if action.waiting_for_user_response {
                return LoopOutcome::AwaitingUser;
            }

            let step = match action.payload() {
                Some(_) if self.control.is_interrupted() => {
                    info!("Interrupted during AI call; skipping the proposed action");
                    Step::Interrupted
                }
                Some(payload) => self.execute_payload(payload, config).await,
                None if action.exec_pane_seems_busy => self.wait_while_busy(config).await,
                None => return LoopOutcome::AwaitingUser,
            };
            if let Step::Interrupted = step {
                self.emit(EngineEvent::Interrupted);
                return LoopOutcome::Interrupted;
            }
        }

        warn!("Stopped after {} rounds without a terminal reply", config.max_iterations);
        self.emit(EngineEvent::IterationLimitReached {
            max_iterations: config.max_iterations,
        });
        LoopOutcome::IterationLimit
    }

    /// One model call with the session's current instructions and history.
    async fn request(&self, config: &EngineConfig) -> Result<String, AiBackendError> {
        let instructions = compose_instructions(
            self.session.instructions().unwrap_or_default(),
            &self.session.knowledge,
        );
        let messages = self.session.conversation_messages();

        let raw = call_backend(self.backend, config, &instructions, &messages).await?;

        if let Some(sink) = self.transcript {
            let mut sent = vec![ChatMessage::system(instructions)];
            sent.extend(
                self.session
                    .messages
                    .iter()
                    .skip(usize::from(self.session.instructions().is_some()))
                    .cloned(),
            );
            match sink.record(&sent, &raw) {
                Ok(path) => debug!("Transcript written to {}", path.display()),
                Err(e) => warn!("Failed to write debug transcript: {e}"),
            }
        }
        Ok(raw)
    }

    // ── Actions ────────────────────────────────────────────────────

    async fn execute_payload(&mut self, payload: Payload, config: &EngineConfig) -> Step {
        match payload {
            Payload::Commands(commands) => {
                for command in commands {
                    let step = self.gate_and_run(ActionKind::Command, &command, &[], config).await;
                    if let Some(step) = step {
                        return step;
                    }
                }
                Step::Continue
            }
            Payload::Keys(keys) => {
                let joined = keys.join(" ");
                self.gate_and_run(ActionKind::Keys, &joined, &keys, config)
                    .await
                    .unwrap_or(Step::Continue)
            }
            Payload::Paste(content) => self
                .gate_and_run(ActionKind::Paste, &content, &[], config)
                .await
                .unwrap_or(Step::Continue),
        }
    }

    /// Gate, dispatch and observe one item. `Some` ends the current action.
    ///
    /// For keys, `command` is the display form and `keys` the tokens to send.
    /// An edited key line is split on whitespace.
    async fn gate_and_run(
        &mut self,
        kind: ActionKind,
        command: &str,
        keys: &[String],
        config: &EngineConfig,
    ) -> Option<Step> {
        let approved = match self.gate(kind, command) {
            GateOutcome::Approved(text) => text,
            GateOutcome::Declined { reason } => {
                info!("User declined {kind}: {command}");
                self.emit(EngineEvent::Declined {
                    command,
                    reason: reason.as_deref(),
                });
                let mut note = format!("User declined to execute `{command}`.");
                if let Some(reason) = reason {
                    note.push_str(&format!(" Reason: {reason}"));
                }
                self.session.messages.push(ChatMessage::user(note));
                return Some(Step::Continue);
            }
        };

        let keys: Vec<&str> = match kind {
            ActionKind::Keys if approved == command => keys.iter().map(String::as_str).collect(),
            ActionKind::Keys => approved.split_whitespace().collect(),
            _ => Vec::new(),
        };
        match self.dispatch_and_wait(kind, &approved, &keys, config).await {
            Ok(DispatchResult::Finished(completed)) => {
                self.observe(&format!("`{approved}`"), completed.as_ref(), config);
                None
            }
            Ok(DispatchResult::Interrupted) => {
                self.observe(&format!("`{approved}` (interrupted)"), None, config);
                Some(Step::Interrupted)
            }
            Err(e) => {
                let error = e.to_string();
                warn!("Dispatch of {kind} failed: {error}");
                self.emit(EngineEvent::DispatchFailed {
                    command: &approved,
                    error: &error,
                });
                self.session.messages.push(ChatMessage::user(format!(
                    "Failed to execute `{approved}` in the exec pane: {error}"
                )));
                Some(Step::Continue)
            }
        }
    }

    fn gate(&mut self, kind: ActionKind, command: &str) -> GateOutcome {
        let decision = ActionGate::new(&self.scorer, &self.whitelist, &self.blacklist).evaluate(command);
        debug!(
            "Gate: {kind} `{command}` {} ({})",
            decision.assessment.level.marker(),
            decision.assessment.rationale
        );

        match decision.verdict {
            GateVerdict::AutoApprove => {
                self.emit(EngineEvent::AutoApproved {
                    kind,
                    command,
                    assessment: &decision.assessment,
                });
                GateOutcome::Approved(command.to_string())
            }
            GateVerdict::Confirm { blacklisted } => {
                self.set_status(SessionStatus::AwaitingConfirmation);
                let response = self.emit(EngineEvent::ConfirmationRequired {
                    kind,
                    command,
                    assessment: &decision.assessment,
                    blacklisted,
                });
                GateOutcome::resolve(command, response)
            }
        }
    }

    async fn dispatch_and_wait(
        &mut self,
        kind: ActionKind,
        text: &str,
        keys: &[&str],
        config: &EngineConfig,
    ) -> Result<DispatchResult, PaneError> {
        let target = self.session.exec_pane.clone();
        let baseline = match self.pane.scan_markers(&target, config.max_capture_lines) {
            Ok(scan) => scan,
            Err(e) => {
                debug!("Marker scan failed, using timed wait: {e}");
                MarkerScan::default()
            }
        };

        self.set_status(SessionStatus::Executing);
        match kind {
            ActionKind::Command => self.pane.dispatch_command(&target, text)?,
            ActionKind::Keys => {
                for key in keys {
                    self.pane.send_keys(&target, key)?;
                }
            }
            ActionKind::Paste => self.pane.paste(&target, text)?,
        }
        info!("Dispatched {kind} to {target}: {text}");
        self.emit(EngineEvent::Dispatched { kind, command: text });

        self.set_status(SessionStatus::Waiting);
        if baseline.prepared {
            match self.poll_completion(&target, &baseline, config).await {
                PollOutcome::Completed(entry) => {
                    debug!("`{}` exited with {}", entry.command, entry.exit_code);
                    self.emit(EngineEvent::CommandCompleted(&entry));
                    self.session.exec_history.push(entry.clone());
                    return Ok(DispatchResult::Finished(Some(entry)));
                }
                PollOutcome::Interrupted => return Ok(DispatchResult::Interrupted),
                PollOutcome::TimedOut => {
                    debug!(
                        "No completion marker within {:?}; falling back to timed wait",
                        config.completion_timeout
                    );
                }
            }
        }

        match self.countdown(config).await {
            WaitOutcome::Elapsed => Ok(DispatchResult::Finished(None)),
            WaitOutcome::Interrupted => Ok(DispatchResult::Interrupted),
        }
    }

    async fn poll_completion(
        &self,
        target: &str,
        baseline: &MarkerScan,
        config: &EngineConfig,
    ) -> PollOutcome<CommandExecHistory> {
        self.emit(EngineEvent::WaitStarted {
            interval: config.completion_timeout,
            prepared: true,
        });
        let pane = self.pane;
        let max_lines = config.max_capture_lines;
        let outcome = CompletionPoll::new(config.completion_timeout, config.poll_interval)
            .run(&self.control, || {
                pane.scan_markers(target, max_lines)
                    .map(|scan| scan.completed_after(baseline).cloned())
            })
            .await;
        self.control.set_paused(false);
        self.emit(EngineEvent::WaitFinished);
        outcome
    }

    async fn countdown(&self, config: &EngineConfig) -> WaitOutcome {
        self.emit(EngineEvent::WaitStarted {
            interval: config.wait_interval,
            prepared: false,
        });
        let handler = self.event_handler;
        let outcome = Countdown::new(config.wait_interval)
            .run(&self.control, |remaining, paused| {
                handler.on_event(&EngineEvent::WaitTick { remaining, paused });
            })
            .await;
        self.control.set_paused(false);
        self.emit(EngineEvent::WaitFinished);
        outcome
    }

    async fn wait_while_busy(&mut self, config: &EngineConfig) -> Step {
        info!("Exec pane busy; waiting {:?}", config.wait_interval);
        self.set_status(SessionStatus::Waiting);
        let outcome = self.countdown(config).await;
        self.observe("waiting", None, config);
        match outcome {
            WaitOutcome::Elapsed => Step::Continue,
            WaitOutcome::Interrupted => Step::Interrupted,
        }
    }

    /// Append the exec pane content as the next user message.
    fn observe(&mut self, after: &str, completed: Option<&CommandExecHistory>, config: &EngineConfig) {
        let target = &self.session.exec_pane;
        let mut note = match self.pane.capture(target, config.max_capture_lines) {
            Ok(capture) => format!("Exec pane after {after}:\n\n{}", pane_block(target, &capture)),
            Err(e) => {
                warn!("Could not capture exec pane: {e}");
                format!("Exec pane after {after} could not be captured: {e}")
            }
        };
        if let Some(entry) = completed {
            note.push_str(&format!(
                "\n\nCommand `{}` finished with exit code {}.",
                entry.command, entry.exit_code
            ));
        }
        self.session.messages.push(ChatMessage::user(note));
    }

    // ── Squashing ──────────────────────────────────────────────────

    async fn squash_if_needed(&mut self, config: &EngineConfig) -> SquashOutcome {
        let usage = self.context_usage();
        if !self.budget(config).needs_squash(&usage) {
            debug!("No squash needed: {}", usage.to_log_string());
            return SquashOutcome::NotNeeded;
        }
        info!("Context above threshold, squashing: {}", usage.to_log_string());
        self.run_squash(config).await
    }

    /// Squash now instead of before the next AI call. Usage must still be
    /// above the threshold; below it this is a no-op.
    pub async fn squash(&mut self) -> SquashOutcome {
        let config = self.effective_config();
        self.squash_if_needed(&config).await
    }

    async fn run_squash(&mut self, config: &EngineConfig) -> SquashOutcome {
        let budget = self.budget(config);
        let Some(plan) = budget.plan_squash(&self.session.messages) else {
            debug!("Nothing to squash");
            return SquashOutcome::NothingToSquash;
        };

        let before_tokens = self.context_usage().estimated_tokens;
        let (instructions, request) = build_squash_request(&self.session.messages[plan.range.clone()]);
        let reply = call_backend(self.backend, config, &instructions, &[Message::user(request)]).await;

        let summary = match reply {
            Ok(text) if !text.trim().is_empty() => summary_message(&text),
            Ok(_) => return self.squash_failed("summary was empty".into()),
            Err(e) => return self.squash_failed(e.to_string()),
        };
        let summary_tokens = budget.estimate_tokens(&summary.content);
        if summary_tokens >= plan.prefix_tokens {
            return self.squash_failed(format!(
                "summary (~{summary_tokens} tokens) is not smaller than the messages it replaces (~{} tokens)",
                plan.prefix_tokens
            ));
        }

        let replaced = plan.range.len();
        self.session.messages.splice(plan.range, [summary]);
        let after_tokens = self.context_usage().estimated_tokens;

        info!("Squashed {replaced} messages: ~{before_tokens} -> ~{after_tokens} tokens");
        self.emit(EngineEvent::Squashed {
            before_tokens,
            after_tokens,
            replaced,
        });
        SquashOutcome::Squashed {
            before_tokens,
            after_tokens,
            replaced,
        }
    }

    fn squash_failed(&self, reason: String) -> SquashOutcome {
        let error = EngineError::SquashFailure(reason);
        warn!("{error}. Continuing without squashing.");
        let message = error.to_string();
        self.emit(EngineEvent::SquashFailed(&message));
        SquashOutcome::Failed(message)
    }

    // ── Watch mode ─────────────────────────────────────────────────

    /// Watch every other pane in the window and surface suggestions until
    /// interrupted.
    pub async fn watch(&mut self, goal: &str) -> WatchOutcome {
        self.control.clear_interrupt();
        self.session.watch_goal = Some(goal.to_string());
        self.set_status(SessionStatus::Watching);

        let config = self.effective_config();
        let outcome = WatchLoop::new(
            self.backend,
            self.pane,
            &config,
            &self.control,
            &self.session,
            goal,
        )
        .with_event_handler(self.event_handler)
        .run()
        .await;

        self.session.watch_goal = None;
        self.set_status(SessionStatus::Idle);
        outcome
    }
}

/// The backend call under the request timeout.
pub(crate) async fn call_backend(
    backend: &dyn AiBackend,
    config: &EngineConfig,
    instructions: &str,
    messages: &[Message],
) -> Result<String, AiBackendError> {
    match tokio::time::timeout(config.request_timeout, backend.send(instructions, messages)).await {
        Ok(result) => result,
        Err(_) => Err(AiBackendError::transport(format!(
            "request timed out after {}s",
            config.request_timeout.as_secs()
        ))),
    }
}

fn pane_block(target: &str, capture: &str) -> String {
    format!("--- exec pane {target} ---\n{}\n--- end of pane ---", capture.trim_end())
}
