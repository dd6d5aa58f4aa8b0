//! Completion client seam for the LM backing a run.
//!
//! A client performs exactly one completion per call and reports every
//! failure as a [`CompletionError`] value; nothing escapes as a panic. Two
//! backends exist:
//!
//! - [`HttpClient`]: OpenAI-compatible `chat/completions` endpoint.
//! - [`CommandClient`]: any local command that reads a prompt on stdin and
//!   writes the completion to stdout (`llm`, `ollama run`, a script).
mod command;
mod http;

pub use command::CommandClient;
pub use http::HttpClient;

use crate::config::{BackendConfig, PipelineConfig};
use anyhow::Result;
use serde::Serialize;
use std::time::Duration;

/// Sampling parameters fixed for the lifetime of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionOptions {
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl CompletionOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        }
    }
}

/// Why a completion produced no usable text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed (status {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("provider error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("empty response")]
    EmptyResponse,

    #[error("LM command failed: {0}")]
    Command(String),
}

/// Raw text of one completion, or the reason there is none.
pub type RawCompletion = std::result::Result<String, CompletionError>;

/// One-shot completion against an LM.
pub trait CompletionClient {
    fn complete(&self, system: &str, user: &str, options: &CompletionOptions) -> RawCompletion;
}

impl<C: CompletionClient + ?Sized> CompletionClient for Box<C> {
    fn complete(&self, system: &str, user: &str, options: &CompletionOptions) -> RawCompletion {
        (**self).complete(system, user, options)
    }
}

/// Boxed client that can move between threads with its pipeline.
pub type BoxedClient = Box<dyn CompletionClient + Send + Sync>;

/// Build the client described by the backend config.
///
/// Configuration problems (missing API key, unknown command) surface here,
/// before any step runs.
pub fn client_from_config(backend: &BackendConfig) -> Result<BoxedClient> {
    match backend {
        BackendConfig::Http {
            base_url,
            api_key_env,
            timeout_secs,
        } => {
            let client = HttpClient::from_env(
                base_url,
                api_key_env,
                Duration::from_secs(*timeout_secs),
            )?;
            Ok(Box::new(client))
        }
        BackendConfig::Command { command } => Ok(Box::new(CommandClient::new(command)?)),
    }
}

/// Treat whitespace-only completions as empty.
pub(crate) fn non_empty(text: String) -> RawCompletion {
    if text.trim().is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    Ok(text)
}
