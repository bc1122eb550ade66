//! Convenience re-exports for common `aiterm-rs` types.
//!
//! ```ignore
//! use aiterm_rs::prelude::*;
//! ```
//!
//! Covers what a front end needs to run a session: the [`AiClient`], the
//! coordinator and its config, event handlers, and the pane contract.
//! Parser internals and risk rule tables stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::api::{AiBackend, ModelConfig, Provider};
pub use crate::error::{AiBackendError, EngineError, PaneError};
pub use crate::{AiClient, Message, MessageRole};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    ChatMessage, CommandExecHistory, CompositeEventHandler, ConfigKey, EngineConfig, EngineEvent,
    EventHandler, EventResponse, ExecutionCoordinator, FileTranscriptSink, LoggingHandler,
    LoopOutcome, NoopHandler, Session, SessionControl, SessionStatus,
    SquashOutcome, SystemPromptBuilder, WatchLoop, WatchOutcome,
};

// ── Gating and context ──────────────────────────────────────────────
pub use crate::context::{ContextUsage, DirKnowledgeStore, KnowledgeStore};
pub use crate::gate::{RiskAssessment, RiskLevel, RiskRuleConfig, RiskScorer};
pub use crate::pane::{PaneCollaborator, PaneDetails};
pub use crate::protocol::{Action, ActionKind};
