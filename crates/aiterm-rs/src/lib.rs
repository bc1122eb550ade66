//! AI-driven command orchestration for terminal multiplexer panes.
//!
//! `aiterm-rs` is the engine behind the `aiterm` assistant. A user states a
//! goal in a chat pane; the engine asks a chat model what to do, gates any
//! proposed command through risk scoring and user confirmation, dispatches
//! it to an exec pane, waits for it to finish and feeds the pane output back
//! to the model, until the model reports the goal accomplished.
//!
//! # Getting started
//!
//! ```ignore
//! use aiterm_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EngineError> {
//!     let model = ModelConfig::resolve(Provider::OpenRouter, "openai/gpt-4o-mini", None, None)?;
//!     let client = AiClient::new(model)?;
//!     let pane = my_multiplexer();
//!
//!     let session = Session::new("%1", "%2", "$0:1", SystemPromptBuilder::default_instructions());
//!     let mut coordinator = ExecutionCoordinator::new(&client, &pane, EngineConfig::default(), session)
//!         .with_event_handler(&LoggingHandler);
//!
//!     let outcome = coordinator.handle_input("free up disk space in /var/log").await;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **The main loop:** [`ExecutionCoordinator`](agent::coordinator::ExecutionCoordinator)
//!   and its [`LoopOutcome`](agent::coordinator::LoopOutcome).
//! - **Passive suggestions:** [`WatchLoop`](agent::watch::WatchLoop).
//! - **Reply format:** [`protocol`], with [`ResponseParser`](protocol::ResponseParser)
//!   and the [`Action`](protocol::Action) it produces.
//! - **Risk gating:** [`gate`], with [`RiskScorer`](gate::RiskScorer) rules and
//!   [`ActionGate`](gate::ActionGate).
//! - **Token budget and squashing:** [`context`].
//! - **Multiplexer contract:** [`PaneCollaborator`](pane::PaneCollaborator).
//! - **Model access:** [`AiBackend`](api::AiBackend) and [`AiClient`].
//! - **Front-end integration:** [`EventHandler`](agent::events::EventHandler).

pub mod agent;
pub mod api;
pub mod context;
pub mod error;
pub mod gate;
pub mod pane;
pub mod prelude;
pub mod protocol;

use api::{AiBackend, BackendFuture, ModelConfig};
use error::{AiBackendError, EngineError};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Referer header sent with every request.
pub const DEFAULT_REFERER: &str = "https://github.com/andreim2k/aiterm";

/// Title header sent with every request.
pub const DEFAULT_TITLE: &str = "AITerm";

/// HTTP client timeout. The coordinator applies its own request timeout on
/// top of this.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

// ── Message types ──────────────────────────────────────────────────

/// Role of a message on the wire.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A role-tagged message as sent to the model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

// ── Request / response types ───────────────────────────────────────

/// Chat completion request body.
#[derive(Serialize, Debug)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<Message>,
}

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Turn an HTTP status and body into the reply text.
fn parse_completion(status: u16, body: &str) -> Result<String, AiBackendError> {
    if !(200..300).contains(&status) {
        return Err(AiBackendError::http(status, body.trim()));
    }

    let parsed: RawChatResponse = serde_json::from_str(body)
        .map_err(|e| AiBackendError::transport(format!("failed to parse response: {e}")))?;

    if let Some(err) = parsed.error {
        return Err(AiBackendError::http(status, format!("API error: {}", err.message)));
    }

    parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| AiBackendError::http(status, "no completion choices returned"))
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for OpenAI-compatible chat completions.
pub struct AiClient {
    client: reqwest::Client,
    config: ModelConfig,
    endpoint: String,
    referer: String,
    title: String,
}

impl AiClient {
    /// Create a client with the default Referer and X-Title headers.
    pub fn new(config: ModelConfig) -> Result<Self, EngineError> {
        Self::with_headers(config, DEFAULT_REFERER, DEFAULT_TITLE)
    }

    pub fn with_headers(
        config: ModelConfig,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("aiterm/", env!("CARGO_PKG_VERSION")))
            .timeout(CLIENT_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Setup(format!("failed to build HTTP client: {e}")))?;
        let endpoint = config.endpoint()?;
        Ok(Self {
            client,
            config,
            endpoint,
            referer: referer.into(),
            title: title.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Send one chat completion request and return the reply text.
    pub async fn chat(
        &self,
        instructions: &str,
        messages: &[Message],
    ) -> Result<String, AiBackendError> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(Message::system(instructions));
        wire.extend_from_slice(messages);
        let body = ChatRequest {
            model: &self.config.model,
            messages: wire,
        };

        debug!(
            "AI request: provider={}, model={}, messages={}",
            self.config.provider,
            self.config.model,
            body.messages.len(),
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiBackendError::transport(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AiBackendError::transport(format!("failed to read response: {e}")))?;

        debug!(
            "AI response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        parse_completion(status.as_u16(), &text)
    }
}

impl AiBackend for AiClient {
    fn send<'a>(&'a self, instructions: &'a str, messages: &'a [Message]) -> BackendFuture<'a> {
        Box::pin(self.chat(instructions, messages))
    }
}
