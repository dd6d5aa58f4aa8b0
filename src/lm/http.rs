//! Blocking client for OpenAI-compatible `chat/completions` endpoints.
use super::{non_empty, CompletionClient, CompletionError, CompletionOptions, RawCompletion};
use crate::util::truncate_string;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP completion client with a bearer API key.
pub struct HttpClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
}

impl HttpClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            endpoint: chat_endpoint(base_url),
            api_key,
        }
    }

    /// Build a client reading the API key from `api_key_env`.
    pub fn from_env(base_url: &str, api_key_env: &str, timeout: Duration) -> Result<Self> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("missing API key: set {api_key_env} or use --lm"))?;
        Ok(Self::new(base_url, api_key, timeout))
    }
}

impl CompletionClient for HttpClient {
    fn complete(&self, system: &str, user: &str, options: &CompletionOptions) -> RawCompletion {
        let request = build_request(system, user, options);
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %options.model,
            max_tokens = options.max_output_tokens,
            "sending completion request"
        );

        let start = Instant::now();
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(&request)
            .map_err(|err| CompletionError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| CompletionError::Transport(format!("read response body: {err}")))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            status,
            prompt_bytes = user.len(),
            response_bytes = body.len(),
            "completion request complete"
        );

        classify_response(status, &body)
    }
}

fn build_request<'a>(
    system: &'a str,
    user: &'a str,
    options: &'a CompletionOptions,
) -> ChatRequest<'a> {
    ChatRequest {
        model: &options.model,
        messages: [
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ],
        max_tokens: options.max_output_tokens,
        temperature: options.temperature,
    }
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn classify_response(status: u16, body: &str) -> RawCompletion {
    match status {
        401 | 403 => Err(CompletionError::Auth {
            status,
            message: truncate_string(body.trim(), ERROR_BODY_LIMIT),
        }),
        400.. => Err(CompletionError::Provider {
            status,
            message: truncate_string(body.trim(), ERROR_BODY_LIMIT),
        }),
        _ => parse_chat_response(body),
    }
}

fn parse_chat_response(body: &str) -> RawCompletion {
    if body.trim().is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|err| CompletionError::InvalidResponse(format!("parse response JSON: {err}")))?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(CompletionError::EmptyResponse)?;
    non_empty(text)
}
