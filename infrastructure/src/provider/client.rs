//! Minimal `/chat/completions` client.

use coach_application::{AdvisoryError, InvokeError};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Construction failure of a provider adapter.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Failure of one completion call, before mapping to a port error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ChatError> for InvokeError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::RateLimited(m) => InvokeError::RateLimited(m),
            ChatError::Unavailable(m) => InvokeError::Unavailable(m),
            ChatError::Rejected(m) => InvokeError::Rejected(m),
            ChatError::InvalidResponse(m) => InvokeError::InvalidResponse(m),
        }
    }
}

impl From<ChatError> for AdvisoryError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::RateLimited(m) => AdvisoryError::RateLimited(m),
            ChatError::Unavailable(m) => AdvisoryError::Unavailable(m),
            ChatError::Rejected(m) | ChatError::InvalidResponse(m) => AdvisoryError::Rejected(m),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Sampling parameters of one adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatClient {
    /// `base_url` includes the API version prefix, e.g. `http://localhost:8000/v1`.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn complete(
        &self,
        params: &CompletionParams,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ChatError> {
        let request = ChatRequest {
            model: &params.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %params.model, prompt_bytes = user_prompt.len(), "POST {}", url);

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChatError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        parse_completion(&body)
    }
}

/// Map a non-success status to a retry class.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ChatError {
    let message = format!("{status}: {}", truncate(body, 200));
    if status == StatusCode::TOO_MANY_REQUESTS {
        ChatError::RateLimited(message)
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ChatError::Unavailable(message)
    } else {
        ChatError::Rejected(message)
    }
}

/// Extract the first choice's content.
pub(crate) fn parse_completion(body: &str) -> Result<String, ChatError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ChatError::InvalidResponse(e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| ChatError::InvalidResponse("no choices in response".to_string()))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
