//! Agent runtime: the [`ExecutionCoordinator`] loop and its supporting
//! modules.
//!
//! - [`coordinator::ExecutionCoordinator`]: ask, gate, dispatch, wait,
//!   observe. Start here.
//! - [`watch::WatchLoop`]: suggestion-only observation of the user's panes.
//! - [`config`]: [`EngineConfig`] and per-session [`SessionOverrides`].
//! - [`events`]: [`EventHandler`] and [`EngineEvent`] for front ends.
//!   Includes [`LoggingHandler`] and [`CompositeEventHandler`].
//! - [`session`]: conversation state, command history and the shared
//!   pause/interrupt [`SessionControl`].
//! - [`wait`]: pausable countdowns and completion polling.
//! - [`prompt`]: [`SystemPromptBuilder`] for the pinned instructions.
//! - [`transcript`]: debug files of every AI exchange.

pub mod config;
pub mod coordinator;
pub mod events;
pub mod prompt;
pub mod session;
pub mod transcript;
pub mod wait;
pub mod watch;

pub use config::{ConfigKey, EngineConfig, OverrideValue, SessionOverrides};
pub use coordinator::{ExecutionCoordinator, LoopOutcome, SettingView, SquashOutcome};
pub use events::{
    CompositeEventHandler, EngineEvent, EventHandler, EventResponse, LoggingHandler, NoopHandler,
};
pub use prompt::SystemPromptBuilder;
pub use session::{
    ChatMessage, CommandExecHistory, MessageKind, Session, SessionControl, SessionStatus,
};
pub use transcript::{FileTranscriptSink, TranscriptSink};
pub use watch::{WatchLoop, WatchOutcome};
