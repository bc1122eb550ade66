//! End-to-end runs of the execution loop against a scripted model and an
//! in-memory pane.

use aiterm_rs::Message;
use aiterm_rs::agent::session::MessageKind;
use aiterm_rs::agent::{
    EngineConfig, EngineEvent, EventHandler, EventResponse, ExecutionCoordinator, LoopOutcome,
    Session, SessionControl, SessionStatus, SquashOutcome, WatchLoop,
};
use aiterm_rs::api::{AiBackend, BackendFuture};
use aiterm_rs::context::squash::SUMMARY_HEADER;
use aiterm_rs::error::{AiBackendError, PaneError};
use aiterm_rs::gate::RiskLevel;
use aiterm_rs::pane::{PaneCollaborator, PaneDetails};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

// ── Fakes ──────────────────────────────────────────────────────────

struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, AiBackendError>>>,
    calls: Mutex<Vec<(String, Vec<Message>)>>,
    /// Raised while a request is in flight, like Ctrl-C during the call.
    interrupt_on_send: Option<SessionControl>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<String, AiBackendError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
            interrupt_on_send: None,
        }
    }

    fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call(&self, i: usize) -> (String, Vec<Message>) {
        self.calls.lock().unwrap()[i].clone()
    }

    fn last_message_of_call(&self, i: usize) -> String {
        self.call(i).1.last().unwrap().content.clone()
    }
}

impl AiBackend for ScriptedBackend {
    fn send<'a>(&'a self, instructions: &'a str, messages: &'a [Message]) -> BackendFuture<'a> {
        self.calls
            .lock()
            .unwrap()
            .push((instructions.to_string(), messages.to_vec()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiBackendError::transport("script exhausted")));
        if let Some(control) = &self.interrupt_on_send {
            control.interrupt();
        }
        Box::pin(async move { reply })
    }
}

/// A model that never answers.
struct SilentBackend;

impl AiBackend for SilentBackend {
    fn send<'a>(&'a self, _instructions: &'a str, _messages: &'a [Message]) -> BackendFuture<'a> {
        Box::pin(std::future::pending::<Result<String, AiBackendError>>())
    }
}

const IDLE_PROMPT: &str = "~/src [0]» ";

struct FakePane {
    screen: Mutex<String>,
    prepared: bool,
    fail_dispatch: bool,
    dispatched: Mutex<Vec<String>>,
    panes: Vec<PaneDetails>,
}

impl FakePane {
    fn plain() -> Self {
        Self {
            screen: Mutex::new("user@host:~/src$ ".into()),
            prepared: false,
            fail_dispatch: false,
            dispatched: Mutex::new(Vec::new()),
            panes: vec![details("%1", "aiterm"), details("%2", "bash")],
        }
    }

    fn prepared() -> Self {
        Self {
            screen: Mutex::new(IDLE_PROMPT.into()),
            prepared: true,
            ..Self::plain()
        }
    }

    fn failing() -> Self {
        Self {
            fail_dispatch: true,
            ..Self::plain()
        }
    }

    fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().unwrap().clone()
    }
}

fn details(id: &str, command: &str) -> PaneDetails {
    PaneDetails {
        id: id.into(),
        active: false,
        pid: 100,
        current_command: command.into(),
        history_size: 0,
        history_limit: 2000,
    }
}

impl PaneCollaborator for FakePane {
    fn capture(&self, target: &str, _max_lines: usize) -> Result<String, PaneError> {
        if target == "%1" {
            return Ok("chat".into());
        }
        Ok(self.screen.lock().unwrap().clone())
    }

    fn send_keys(&self, _target: &str, key: &str) -> Result<(), PaneError> {
        self.dispatched.lock().unwrap().push(format!("key:{key}"));
        Ok(())
    }

    fn dispatch_command(&self, _target: &str, command: &str) -> Result<(), PaneError> {
        if self.fail_dispatch {
            return Err(PaneError::Command {
                command: "send-keys".into(),
                message: "can't find pane: %2".into(),
            });
        }
        self.dispatched.lock().unwrap().push(command.to_string());
        let mut screen = self.screen.lock().unwrap();
        if self.prepared {
            screen.push_str(&format!("{command}\nran {command}\n~/src [3]» "));
        } else {
            screen.push_str(&format!("{command}\nran {command}\nuser@host:~/src$ "));
        }
        Ok(())
    }

    fn paste(&self, _target: &str, content: &str) -> Result<(), PaneError> {
        self.dispatched.lock().unwrap().push(format!("paste:{content}"));
        Ok(())
    }

    fn list_panes(&self, _window: &str) -> Result<Vec<PaneDetails>, PaneError> {
        Ok(self.panes.clone())
    }
}

/// Records every event and answers confirmations with a fixed response.
struct Recorder {
    answer: Option<EventResponse>,
    interrupt_on_dispatch: Option<SessionControl>,
    pause_on_dispatch: Option<SessionControl>,
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn answering(answer: Option<EventResponse>) -> Self {
        Self {
            answer,
            interrupt_on_dispatch: None,
            pause_on_dispatch: None,
            events: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn saw(&self, needle: &str) -> bool {
        self.events().iter().any(|e| e.contains(needle))
    }
}

impl EventHandler for Recorder {
    fn on_event(&self, event: &EngineEvent<'_>) -> Option<EventResponse> {
        if matches!(event, EngineEvent::WaitTick { .. }) {
            return None;
        }
        self.events.lock().unwrap().push(format!("{event:?}"));
        match event {
            EngineEvent::ConfirmationRequired { .. } => self.answer.clone(),
            EngineEvent::Dispatched { .. } => {
                if let Some(control) = &self.interrupt_on_dispatch {
                    control.interrupt();
                }
                if let Some(control) = &self.pause_on_dispatch {
                    control.set_paused(true);
                }
                None
            }
            _ => None,
        }
    }
}

fn session() -> Session {
    Session::new("%1", "%2", "@1", "You are a test assistant.")
}

fn fast_config() -> EngineConfig {
    EngineConfig::default().with_wait_interval(Duration::from_secs(5))
}

// ── Scenarios ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn accomplished_reply_ends_loop_without_further_calls() {
    let backend =
        ScriptedBackend::replying(&["All done.<RequestAccomplished>1</RequestAccomplished>"]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(None);
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_event_handler(&recorder);

    let outcome = coordinator.handle_input("say hi").await;

    assert_eq!(outcome, LoopOutcome::Done);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(coordinator.session().status, SessionStatus::Done);
    assert!(recorder.saw("AiMessage(\"All done.\")"));
    assert!(recorder.saw("Finished"));
}

#[tokio::test(start_paused = true)]
async fn user_input_carries_exec_pane_content() {
    let backend = ScriptedBackend::replying(&["Sure, I will help!"]);
    let pane = FakePane::plain();
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session());

    coordinator.handle_input("what is in here?").await;

    let (instructions, messages) = backend.call(0);
    assert!(instructions.starts_with("You are a test assistant."));
    assert_eq!(messages.len(), 1);
    assert!(messages[0].content.starts_with("what is in here?"));
    assert!(messages[0].content.contains("--- exec pane %2 ---\nuser@host:~/src$"));
}

#[tokio::test(start_paused = true)]
async fn plain_text_reply_awaits_user() {
    let backend = ScriptedBackend::replying(&["Sure, I will help!"]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(Some(EventResponse::Approve));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_event_handler(&recorder);

    let outcome = coordinator.handle_input("help me").await;

    assert_eq!(outcome, LoopOutcome::AwaitingUser);
    assert!(pane.dispatched().is_empty());
    assert_eq!(backend.call_count(), 1);
    assert!(recorder.saw("Sure, I will help!"));
    assert_eq!(coordinator.session().status, SessionStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn blacklist_forces_confirmation_over_whitelist() {
    let backend = ScriptedBackend::replying(&[
        "<ExecCommand>rm -rf build</ExecCommand>",
        "<WaitingForUserResponse>1</WaitingForUserResponse>Should I try something else?",
    ]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(Some(EventResponse::Deny(String::new())));
    let config = fast_config()
        .with_whitelist(vec!["^rm ".into()])
        .with_blacklist(vec!["rm -rf".into()]);
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, config, session())
        .with_event_handler(&recorder);

    let outcome = coordinator.handle_input("clean the build").await;

    assert_eq!(outcome, LoopOutcome::AwaitingUser);
    assert!(pane.dispatched().is_empty());
    let confirmation = recorder
        .events()
        .into_iter()
        .find(|e| e.starts_with("ConfirmationRequired"))
        .expect("confirmation requested");
    assert!(confirmation.contains("blacklisted: true"));
    assert!(confirmation.contains(&format!("{:?}", RiskLevel::Dangerous)));
    assert_eq!(
        backend.last_message_of_call(1),
        "User declined to execute `rm -rf build`."
    );
}

#[tokio::test(start_paused = true)]
async fn whitelisted_command_runs_without_asking() {
    let backend = ScriptedBackend::replying(&[
        "<ExecCommand>ls -la</ExecCommand>",
        "<RequestAccomplished>1</RequestAccomplished>",
    ]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(None);
    let config = fast_config().with_whitelist(vec!["^ls".into()]);
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, config, session())
        .with_event_handler(&recorder);

    let outcome = coordinator.handle_input("list files").await;

    assert_eq!(outcome, LoopOutcome::Done);
    assert_eq!(pane.dispatched(), vec!["ls -la".to_string()]);
    assert!(recorder.saw("AutoApproved"));
    assert!(!recorder.saw("ConfirmationRequired"));
}

#[tokio::test(start_paused = true)]
async fn edited_command_is_what_runs() {
    let backend = ScriptedBackend::replying(&[
        "<ExecCommand>ls</ExecCommand>",
        "<RequestAccomplished>1</RequestAccomplished>",
    ]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(Some(EventResponse::Edit("ls -la /tmp".into())));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_event_handler(&recorder);

    coordinator.handle_input("list tmp").await;

    assert_eq!(pane.dispatched(), vec!["ls -la /tmp".to_string()]);
    assert!(backend.last_message_of_call(1).contains("ran ls -la /tmp"));
}

#[tokio::test(start_paused = true)]
async fn unprepared_pane_waits_full_interval() {
    let backend = ScriptedBackend::replying(&[
        "<ExecCommand>make</ExecCommand>",
        "<RequestAccomplished>1</RequestAccomplished>",
    ]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(Some(EventResponse::Approve));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_event_handler(&recorder);

    let start = Instant::now();
    let outcome = coordinator.handle_input("build it").await;

    assert_eq!(outcome, LoopOutcome::Done);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(recorder.saw("WaitStarted { interval: 5s, prepared: false }"));
    assert!(coordinator.session().exec_history.is_empty());
}

#[tokio::test(start_paused = true)]
async fn prepared_pane_resumes_on_completion_marker() {
    let backend = ScriptedBackend::replying(&[
        "<ExecCommand>make test</ExecCommand>",
        "<RequestAccomplished>1</RequestAccomplished>",
    ]);
    let pane = FakePane::prepared();
    let recorder = Recorder::answering(Some(EventResponse::Approve));
    let config = EngineConfig::default().with_wait_interval(Duration::from_secs(60));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, config, session())
        .with_event_handler(&recorder);

    let start = Instant::now();
    let outcome = coordinator.handle_input("run the tests").await;

    assert_eq!(outcome, LoopOutcome::Done);
    assert!(start.elapsed() < Duration::from_secs(1));

    let history = &coordinator.session().exec_history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].command, "make test");
    assert_eq!(history[0].exit_code, 3);
    assert_eq!(history[0].output, "ran make test");

    let observation = backend.last_message_of_call(1);
    assert!(observation.contains("finished with exit code 3"));
}

#[tokio::test(start_paused = true)]
async fn dispatch_failure_is_reported_and_loop_continues() {
    let backend = ScriptedBackend::replying(&[
        "<ExecCommand>make</ExecCommand>",
        "<WaitingForUserResponse>1</WaitingForUserResponse>The pane seems gone.",
    ]);
    let pane = FakePane::failing();
    let recorder = Recorder::answering(Some(EventResponse::Approve));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_event_handler(&recorder);

    let outcome = coordinator.handle_input("build it").await;

    assert_eq!(outcome, LoopOutcome::AwaitingUser);
    assert_eq!(backend.call_count(), 2);
    assert!(recorder.saw("DispatchFailed"));
    let note = backend.last_message_of_call(1);
    assert!(note.starts_with("Failed to execute `make` in the exec pane:"));
    assert!(note.contains("can't find pane"));
}

#[tokio::test(start_paused = true)]
async fn backend_failure_keeps_session_for_retry() {
    let backend = ScriptedBackend::new(vec![Err(AiBackendError::http(429, "rate limited"))]);
    let pane = FakePane::plain();
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session());

    let outcome = coordinator.handle_input("hello").await;

    match outcome {
        LoopOutcome::BackendFailed(e) => {
            assert_eq!(e.status, Some(429));
            assert_eq!(e.to_string(), "AI backend error (HTTP 429): rate limited");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(coordinator.session().messages.len(), 2);
    assert_eq!(coordinator.session().status, SessionStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out() {
    let pane = FakePane::plain();
    let recorder = Recorder::answering(None);
    let config = fast_config().with_request_timeout(Duration::from_secs(20));
    let mut coordinator = ExecutionCoordinator::new(&SilentBackend, &pane, config, session())
        .with_event_handler(&recorder);

    let start = Instant::now();
    let outcome = coordinator.handle_input("hello").await;

    match outcome {
        LoopOutcome::BackendFailed(e) => {
            assert_eq!(e.status, None);
            assert!(e.to_string().contains("timed out after 20s"), "{e}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(start.elapsed() >= Duration::from_secs(20));
    assert!(start.elapsed() < Duration::from_secs(21));
    assert!(recorder.saw("BackendFailed"));
    assert_eq!(coordinator.session().messages.len(), 2);
    assert_eq!(coordinator.session().status, SessionStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn interrupt_during_request_skips_proposed_action() {
    let control = SessionControl::new();
    let backend = ScriptedBackend {
        interrupt_on_send: Some(control.clone()),
        ..ScriptedBackend::replying(&["Cleaning up.<ExecCommand>rm -rf build</ExecCommand>"])
    };
    let pane = FakePane::plain();
    let recorder = Recorder::answering(Some(EventResponse::Approve));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_event_handler(&recorder)
        .with_control(control);

    let outcome = coordinator.handle_input("clean the build").await;

    assert_eq!(outcome, LoopOutcome::Interrupted);
    assert!(pane.dispatched().is_empty());
    assert!(!recorder.saw("ConfirmationRequired"));
    assert!(recorder.saw("AiMessage(\"Cleaning up.\")"));
    assert!(recorder.saw("Interrupted"));
    assert_eq!(backend.call_count(), 1);
    let last = coordinator.session().messages.last().unwrap();
    assert!(last.content.contains("<ExecCommand>rm -rf build</ExecCommand>"));
    assert_eq!(coordinator.session().status, SessionStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn busy_replies_stop_at_iteration_limit() {
    let busy = "Still compiling.<ExecPaneSeemsBusy>1</ExecPaneSeemsBusy>";
    let backend = ScriptedBackend::replying(&[busy, busy, busy]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(None);
    let config = fast_config().with_max_iterations(2);
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, config, session())
        .with_event_handler(&recorder);

    let outcome = coordinator.handle_input("is it done?").await;

    assert_eq!(outcome, LoopOutcome::IterationLimit);
    assert_eq!(backend.call_count(), 2);
    assert!(pane.dispatched().is_empty());
    assert!(recorder.saw("IterationLimitReached { max_iterations: 2 }"));
}

#[tokio::test(start_paused = true)]
async fn interrupt_during_wait_stops_loop() {
    let backend = ScriptedBackend::replying(&[
        "<ExecCommand>sleep 100</ExecCommand>",
        "never requested",
    ]);
    let pane = FakePane::plain();
    let control = SessionControl::new();
    let recorder = Recorder {
        interrupt_on_dispatch: Some(control.clone()),
        ..Recorder::answering(Some(EventResponse::Approve))
    };
    let config = EngineConfig::default().with_wait_interval(Duration::from_secs(600));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, config, session())
        .with_event_handler(&recorder)
        .with_control(control);

    let start = Instant::now();
    let outcome = coordinator.handle_input("wait a while").await;

    assert_eq!(outcome, LoopOutcome::Interrupted);
    assert!(start.elapsed() < Duration::from_secs(600));
    assert_eq!(backend.call_count(), 1);
    assert!(recorder.saw("Interrupted"));
}

#[tokio::test(start_paused = true)]
async fn keys_are_sent_one_by_one() {
    let backend = ScriptedBackend::replying(&[
        "<SendKeys>q</SendKeys><SendKeys>Enter</SendKeys>",
        "<RequestAccomplished>1</RequestAccomplished>",
    ]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(Some(EventResponse::Approve));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_event_handler(&recorder);

    coordinator.handle_input("quit the pager").await;

    assert_eq!(pane.dispatched(), vec!["key:q".to_string(), "key:Enter".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn key_with_spaces_is_sent_whole() {
    let backend = ScriptedBackend::replying(&[
        "<SendKeys>git status</SendKeys><SendKeys>Enter</SendKeys>",
        "<RequestAccomplished>1</RequestAccomplished>",
    ]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(Some(EventResponse::Approve));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_event_handler(&recorder);

    coordinator.handle_input("check the repo").await;

    assert_eq!(
        pane.dispatched(),
        vec!["key:git status".to_string(), "key:Enter".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn edited_keys_are_split_on_whitespace() {
    let backend = ScriptedBackend::replying(&[
        "<SendKeys>q</SendKeys>",
        "<RequestAccomplished>1</RequestAccomplished>",
    ]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(Some(EventResponse::Edit("C-c Enter".into())));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_event_handler(&recorder);

    coordinator.handle_input("stop it").await;

    assert_eq!(pane.dispatched(), vec!["key:C-c".to_string(), "key:Enter".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn pause_holds_completion_poll_and_is_cleared_after() {
    let backend = ScriptedBackend::replying(&[
        "<ExecCommand>make test</ExecCommand>",
        "Still going.<ExecPaneSeemsBusy>1</ExecPaneSeemsBusy>",
        "<RequestAccomplished>1</RequestAccomplished>",
    ]);
    let pane = FakePane::prepared();
    let control = SessionControl::new();
    let recorder = Recorder {
        pause_on_dispatch: Some(control.clone()),
        ..Recorder::answering(Some(EventResponse::Approve))
    };
    let config = fast_config().with_completion_timeout(Duration::from_secs(10));
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, config, session())
        .with_event_handler(&recorder)
        .with_control(control.clone());

    let resume = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        control.set_paused(false);
    });
    let start = Instant::now();
    let outcome = coordinator.handle_input("run the tests").await;
    resume.await.unwrap();

    assert_eq!(outcome, LoopOutcome::Done);
    // 30s paused in the poll, then the 5s busy wait runs unpaused.
    assert!(start.elapsed() >= Duration::from_secs(35));
    assert!(start.elapsed() < Duration::from_secs(36));
    // Paused time did not use up the 10s completion timeout.
    assert_eq!(coordinator.session().exec_history.len(), 1);
    assert!(!coordinator.control().is_paused());
}

// ── Squashing ──────────────────────────────────────────────────────

fn crowded_session() -> Session {
    let mut session = Session::new("%1", "%2", "@1", "i".repeat(105));
    for i in 0..8 {
        let text = format!("{i}{}", "m".repeat(89));
        session.messages.push(if i % 2 == 0 {
            aiterm_rs::agent::ChatMessage::user(text)
        } else {
            aiterm_rs::agent::ChatMessage::assistant(text)
        });
    }
    session
}

/// Puts [`crowded_session`] at 82.5% of the budget.
fn crowded_config() -> EngineConfig {
    fast_config()
        .with_max_context_size(1000)
        .with_chars_per_token(1.0)
}

#[tokio::test(start_paused = true)]
async fn squash_runs_above_threshold() {
    let backend = ScriptedBackend::replying(&[
        "User asked for things; nothing ran yet.",
        "<RequestAccomplished>1</RequestAccomplished>",
    ]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(None);
    let mut coordinator =
        ExecutionCoordinator::new(&backend, &pane, crowded_config(), crowded_session())
            .with_event_handler(&recorder);

    let usage = coordinator.context_usage();
    assert_eq!(usage.estimated_tokens, 825);
    assert!((usage.usage_pct - 0.825).abs() < 1e-9);

    let outcome = coordinator.handle_input("next").await;
    assert_eq!(outcome, LoopOutcome::Done);

    let (squash_instructions, squash_messages) = backend.call(0);
    assert!(squash_instructions.starts_with("Summarize"));
    assert!(squash_messages[0].content.contains("[user]: 0mmm"));
    assert!(recorder.saw("Squashed"));

    let messages = &coordinator.session().messages;
    assert_eq!(messages.len(), 8);
    assert_eq!(messages[1].kind, MessageKind::Summary);
    assert!(messages[1].content.starts_with(SUMMARY_HEADER));
    assert!(messages[2].content.starts_with('3'));
    assert!(coordinator.context_usage().usage_pct < 0.8);
}

#[tokio::test(start_paused = true)]
async fn squash_backend_error_keeps_history_and_still_asks() {
    let backend = ScriptedBackend::new(vec![
        Err(AiBackendError::transport("connection reset")),
        Ok("<RequestAccomplished>1</RequestAccomplished>".into()),
    ]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(None);
    let mut coordinator =
        ExecutionCoordinator::new(&backend, &pane, crowded_config(), crowded_session())
            .with_event_handler(&recorder);
    let before = coordinator.session().messages.clone();

    let outcome = coordinator.handle_input("next").await;

    assert_eq!(outcome, LoopOutcome::Done);
    assert_eq!(backend.call_count(), 2);
    assert!(recorder.saw("SquashFailed"));
    assert!(!recorder.saw("Squashed"));

    // The main request saw the full, unsquashed history.
    let (_, sent) = backend.call(1);
    assert_eq!(sent.len(), 9);
    assert!(sent[0].content.starts_with("0mmm"));
    let after = &coordinator.session().messages;
    assert_eq!(after[..before.len()], before[..]);
    assert!(after.iter().all(|m| m.kind != MessageKind::Summary));
}

#[tokio::test(start_paused = true)]
async fn oversized_summary_leaves_session_unchanged() {
    let backend = ScriptedBackend::new(vec![Ok("summary ".repeat(200))]);
    let pane = FakePane::plain();
    let mut coordinator =
        ExecutionCoordinator::new(&backend, &pane, crowded_config(), crowded_session());
    let before = coordinator.session().messages.clone();

    let outcome = coordinator.squash().await;

    assert!(matches!(outcome, SquashOutcome::Failed(ref reason) if reason.contains("not smaller")));
    assert_eq!(coordinator.session().messages, before);
}

#[tokio::test(start_paused = true)]
async fn manual_squash_below_threshold_is_a_no_op() {
    let backend = ScriptedBackend::replying(&["short"]);
    let pane = FakePane::plain();
    let mut coordinator =
        ExecutionCoordinator::new(&backend, &pane, fast_config(), crowded_session());
    let before = coordinator.session().messages.clone();
    assert!(coordinator.context_usage().usage_pct < 0.01);

    assert_eq!(coordinator.squash().await, SquashOutcome::NotNeeded);
    assert_eq!(coordinator.session().messages, before);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn manual_squash_above_threshold_runs_immediately() {
    let backend = ScriptedBackend::replying(&["short"]);
    let pane = FakePane::plain();
    let mut coordinator =
        ExecutionCoordinator::new(&backend, &pane, crowded_config(), crowded_session());

    match coordinator.squash().await {
        SquashOutcome::Squashed { replaced, .. } => assert!(replaced > 0),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(backend.call_count(), 1);
    assert!(coordinator.context_usage().usage_pct < 0.8);
    // Back under the threshold, a second request does nothing.
    assert_eq!(coordinator.squash().await, SquashOutcome::NotNeeded);
    assert_eq!(backend.call_count(), 1);
}

// ── Settings and knowledge ─────────────────────────────────────────

#[tokio::test]
async fn overrides_change_effective_settings() {
    let backend = ScriptedBackend::replying(&[]);
    let pane = FakePane::plain();
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session());

    coordinator.set_override("wait_interval", "9").unwrap();
    assert_eq!(coordinator.get_setting("wait_interval").unwrap(), "9");
    assert!(coordinator.set_override("wait_interval", "0").is_err());
    assert!(coordinator.get_setting("no_such_key").is_err());

    let overridden: Vec<_> = coordinator
        .settings()
        .into_iter()
        .filter(|s| s.overridden)
        .map(|s| s.key.as_str())
        .collect();
    assert_eq!(overridden, vec!["wait_interval"]);
}

#[tokio::test]
async fn knowledge_without_store_is_unavailable() {
    let backend = ScriptedBackend::replying(&[]);
    let pane = FakePane::plain();
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session());
    let err = coordinator.load_knowledge("docker").unwrap_err();
    assert!(err.to_string().contains("docker"));
}

#[tokio::test(start_paused = true)]
async fn loaded_knowledge_is_sent_with_instructions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("docker.md"), "Use compose v2.").unwrap();
    let store = aiterm_rs::context::DirKnowledgeStore::new(dir.path());

    let backend = ScriptedBackend::replying(&["ok"]);
    let pane = FakePane::plain();
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_knowledge_store(&store);

    assert!(coordinator.load_knowledge("docker").unwrap() > 0);
    assert_eq!(
        coordinator.list_knowledge().unwrap(),
        vec![("docker".to_string(), true)]
    );
    coordinator.handle_input("start the stack").await;

    let (instructions, _) = backend.call(0);
    assert!(instructions.ends_with("## Knowledge base: docker\n\nUse compose v2."));

    assert!(coordinator.unload_knowledge("docker"));
    assert!(!coordinator.unload_knowledge("docker"));
}

// ── Watch mode ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn watch_skips_unchanged_panes() {
    let backend = ScriptedBackend::replying(&["The build log shows a failing test.", "unused"]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(None);
    let config = fast_config();
    let control = SessionControl::new();
    let session = session();

    let outcome = WatchLoop::new(&backend, &pane, &config, &control, &session, "catch failures")
        .with_event_handler(&recorder)
        .with_max_cycles(2)
        .run()
        .await;

    assert_eq!(outcome.cycles, 2);
    assert_eq!(outcome.suggestions, 1);
    assert_eq!(backend.call_count(), 1);

    let (instructions, messages) = backend.call(0);
    assert!(instructions.contains("catch failures"));
    assert!(messages[0].content.contains("=== Pane %2 (bash) ==="));
    assert!(!messages[0].content.contains("=== Pane %1"));
    assert!(recorder.saw("WatchSuggestion(\"The build log shows a failing test.\")"));
}

#[tokio::test(start_paused = true)]
async fn watch_survives_backend_errors_and_no_comment() {
    let backend = ScriptedBackend::new(vec![
        Err(AiBackendError::transport("connection reset")),
        Ok("<NoComment>1</NoComment>".into()),
    ]);
    let pane = FakePane::plain();
    let recorder = Recorder::answering(None);
    let config = fast_config();
    let control = SessionControl::new();
    let session = session();

    let outcome = WatchLoop::new(&backend, &pane, &config, &control, &session, "anything")
        .with_event_handler(&recorder)
        .with_max_cycles(3)
        .run()
        .await;

    assert_eq!(outcome.cycles, 3);
    assert_eq!(outcome.suggestions, 0);
    assert_eq!(backend.call_count(), 2);
    assert!(recorder.saw("BackendFailed"));
    assert!(!recorder.saw("WatchSuggestion"));
}

#[tokio::test(start_paused = true)]
async fn coordinator_watch_restores_idle_status() {
    let backend = ScriptedBackend::replying(&["Looks fine."]);
    let pane = FakePane::plain();
    let control = SessionControl::new();
    let recorder = Recorder::answering(None);
    let mut coordinator = ExecutionCoordinator::new(&backend, &pane, fast_config(), session())
        .with_event_handler(&recorder)
        .with_control(control.clone());

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        control.interrupt();
    });
    let outcome = coordinator.watch("keep an eye on it").await;
    stopper.await.unwrap();

    assert!(outcome.cycles >= 2);
    assert_eq!(outcome.suggestions, 1);
    assert_eq!(coordinator.session().status, SessionStatus::Idle);
    assert!(coordinator.session().watch_goal.is_none());
    assert!(recorder.saw("StatusChanged(Watching)"));
}
