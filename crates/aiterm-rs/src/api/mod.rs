//! AI backend abstraction and provider configuration.
//!
//! - [`AiBackend`]: the narrow `send(instructions, messages)` contract the
//!   engine depends on. [`AiClient`](crate::AiClient) implements it over
//!   HTTP; tests implement it with scripted replies.
//! - [`provider`]: [`Provider`] base URLs and API key lookup.

pub mod provider;

pub use provider::{ModelConfig, Provider};

use crate::Message;
use crate::error::AiBackendError;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`AiBackend::send`].
pub type BackendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, AiBackendError>> + Send + 'a>>;

/// One round-trip to a chat model.
///
/// `instructions` becomes the system message; `messages` are the
/// role-tagged conversation after it. The engine never retries a failed
/// call.
pub trait AiBackend: Send + Sync {
    fn send<'a>(&'a self, instructions: &'a str, messages: &'a [Message]) -> BackendFuture<'a>;
}
