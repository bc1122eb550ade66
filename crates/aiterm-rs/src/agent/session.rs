//! Per-session state: conversation, status, panes and control handle.
//!
//! A [`Session`] is one explicit value owned by the
//! [`ExecutionCoordinator`](super::coordinator::ExecutionCoordinator). No
//! other component mutates its message sequence.

use super::config::SessionOverrides;
use crate::context::KnowledgeSet;
use crate::{Message, MessageRole};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

// ── ChatMessage ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Conversation,
    /// Synthetic summary produced by a squash.
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub content: String,
    pub from_user: bool,
    pub timestamp: DateTime<Local>,
    pub kind: MessageKind,
}

impl ChatMessage {
    fn new(content: impl Into<String>, from_user: bool, kind: MessageKind) -> Self {
        Self {
            content: content.into(),
            from_user,
            timestamp: Local::now(),
            kind,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, true, MessageKind::Conversation)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, false, MessageKind::Conversation)
    }

    /// The instructions message. Only meaningful at index 0.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(content, false, MessageKind::Conversation)
    }

    pub fn summary(content: impl Into<String>) -> Self {
        Self::new(content, false, MessageKind::Summary)
    }
}

/// Wire role of the message at `index`: index 0 not from the user is the
/// system message.
pub fn role_for(index: usize, message: &ChatMessage) -> MessageRole {
    if index == 0 && !message.from_user {
        MessageRole::System
    } else if message.from_user {
        MessageRole::User
    } else {
        MessageRole::Assistant
    }
}

// ── Status ─────────────────────────────────────────────────────────

/// Coordinator state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    AwaitingAi,
    AwaitingConfirmation,
    Executing,
    Waiting,
    Done,
    Watching,
}

impl SessionStatus {
    /// Prompt symbol for this status.
    pub fn symbol(self) -> &'static str {
        match self {
            SessionStatus::Idle => "?",
            SessionStatus::AwaitingAi
            | SessionStatus::AwaitingConfirmation
            | SessionStatus::Executing
            | SessionStatus::Waiting => "▶",
            SessionStatus::Done => "✓",
            SessionStatus::Watching => "∞",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::AwaitingAi => "awaiting AI",
            SessionStatus::AwaitingConfirmation => "awaiting confirmation",
            SessionStatus::Executing => "executing",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Done => "done",
            SessionStatus::Watching => "watching",
        };
        write!(f, "{s}")
    }
}

/// One completed command observed through prompt markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExecHistory {
    pub command: String,
    pub output: String,
    pub exit_code: i32,
}

// ── Session ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub chat_pane: String,
    pub exec_pane: String,
    pub window: String,
    pub status: SessionStatus,
    pub messages: Vec<ChatMessage>,
    pub exec_history: Vec<CommandExecHistory>,
    pub overrides: SessionOverrides,
    pub knowledge: KnowledgeSet,
    pub watch_goal: Option<String>,
}

impl Session {
    /// Start a session whose conversation is pinned by `instructions`.
    pub fn new(
        chat_pane: impl Into<String>,
        exec_pane: impl Into<String>,
        window: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_session_id(),
            chat_pane: chat_pane.into(),
            exec_pane: exec_pane.into(),
            window: window.into(),
            status: SessionStatus::Idle,
            messages: vec![ChatMessage::system(instructions)],
            exec_history: Vec::new(),
            overrides: SessionOverrides::default(),
            knowledge: KnowledgeSet::new(),
            watch_goal: None,
        }
    }

    /// The pinned instructions, if index 0 is a system message.
    pub fn instructions(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| !m.from_user)
            .map(|m| m.content.as_str())
    }

    /// Every message after the pinned instructions, role-tagged for the wire.
    pub fn conversation_messages(&self) -> Vec<Message> {
        self.messages
            .iter()
            .enumerate()
            .filter_map(|(i, m)| match role_for(i, m) {
                MessageRole::System => None,
                role => Some(Message::new(role, m.content.clone())),
            })
            .collect()
    }

    /// Drop everything except the pinned instructions. Loaded knowledge
    /// and overrides survive.
    pub fn reset(&mut self) {
        let pinned = self.messages.first().filter(|m| !m.from_user).cloned();
        self.messages = pinned.into_iter().collect();
        self.exec_history.clear();
        self.watch_goal = None;
        self.status = SessionStatus::Idle;
    }
}

/// Generate a unique session ID.
pub fn generate_session_id() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("as-{ts:x}-{count:04x}")
}

// ── SessionControl ─────────────────────────────────────────────────

/// Pause toggle and interrupt flag shared between the loop, the key
/// listener and the Ctrl-C handler.
#[derive(Debug, Clone)]
pub struct SessionControl {
    pause: Arc<watch::Sender<bool>>,
    interrupt: Arc<AtomicBool>,
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            pause: Arc::new(tx),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.pause.borrow()
    }

    /// Flip the pause state and return the new value.
    pub fn toggle_pause(&self) -> bool {
        let mut now = false;
        self.pause.send_modify(|paused| {
            *paused = !*paused;
            now = *paused;
        });
        now
    }

    pub fn set_paused(&self, paused: bool) {
        self.pause.send_if_modified(|p| {
            let changed = *p != paused;
            *p = paused;
            changed
        });
    }

    pub fn subscribe_pause(&self) -> watch::Receiver<bool> {
        self.pause.subscribe()
    }

    /// Request the running loop to stop at its next check.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
        // Wake a paused countdown so it can observe the interrupt.
        self.set_paused(false);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    pub fn clear_interrupt(&self) {
        self.interrupt.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_starts_with_pinned_instructions() {
        let session = Session::new("%1", "%2", "$0:1", "be helpful");
        assert_eq!(session.instructions(), Some("be helpful"));
        assert_eq!(session.status, SessionStatus::Idle);
        assert!(session.id.starts_with("as-"));
    }

    #[test]
    fn conversation_messages_skip_system_and_tag_roles() {
        let mut session = Session::new("%1", "%2", "$0:1", "sys");
        session.messages.push(ChatMessage::user("hi"));
        session.messages.push(ChatMessage::assistant("hello"));
        session.messages.push(ChatMessage::summary("earlier"));

        let wire = session.conversation_messages();
        let roles: Vec<_> = wire.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::Assistant]
        );
        assert_eq!(wire[0].content, "hi");
    }

    #[test]
    fn user_message_at_index_zero_is_not_system() {
        assert_eq!(role_for(0, &ChatMessage::user("x")), MessageRole::User);
        assert_eq!(role_for(0, &ChatMessage::system("x")), MessageRole::System);
        assert_eq!(role_for(3, &ChatMessage::system("x")), MessageRole::Assistant);
    }

    #[test]
    fn reset_keeps_instructions_and_knowledge() {
        let mut session = Session::new("%1", "%2", "$0:1", "sys");
        session.messages.push(ChatMessage::user("hi"));
        session.exec_history.push(CommandExecHistory {
            command: "ls".into(),
            output: String::new(),
            exit_code: 0,
        });
        session.knowledge.insert(crate::context::KnowledgeBase {
            name: "git".into(),
            content: "tips".into(),
            estimated_tokens: 2,
            loaded: true,
        });
        session.reset();
        assert_eq!(session.messages.len(), 1);
        assert!(session.exec_history.is_empty());
        assert!(session.knowledge.contains("git"));
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(generate_session_id(), generate_session_id());
    }

    #[test]
    fn status_symbols() {
        assert_eq!(SessionStatus::Executing.symbol(), "▶");
        assert_eq!(SessionStatus::Idle.symbol(), "?");
        assert_eq!(SessionStatus::Done.symbol(), "✓");
        assert_eq!(SessionStatus::Watching.symbol(), "∞");
    }

    #[test]
    fn control_toggles_pause_and_interrupts() {
        let control = SessionControl::new();
        let rx = control.subscribe_pause();
        assert!(control.toggle_pause());
        assert!(*rx.borrow());
        assert!(!control.toggle_pause());

        control.set_paused(true);
        control.interrupt();
        assert!(control.is_interrupted());
        assert!(!control.is_paused());
        control.clear_interrupt();
        assert!(!control.is_interrupted());
    }
}
