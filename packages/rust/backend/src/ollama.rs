//! Ollama chat backend (`POST /api/chat`, non-streaming).

use std::time::{Duration, Instant};

use promptsieve_shared::{OllamaConfig, PromptSieveError, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use crate::{Backend, BackendReply};

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("promptsieve/", env!("CARGO_PKG_VERSION"));

/// How much of an error body we keep in messages.
const ERROR_BODY_EXCERPT: usize = 200;

/// Connection settings for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaOptions {
    /// Base URL, e.g. `http://localhost:11434`.
    pub host: String,
    /// Model to chat with.
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl From<&OllamaConfig> for OllamaOptions {
    fn from(config: &OllamaConfig) -> Self {
        Self {
            host: config.host.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        }
    }
}

impl Default for OllamaOptions {
    fn default() -> Self {
        Self::from(&OllamaConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Talks to an Ollama server with reqwest's blocking client.
///
/// Must not be created or dropped on an async runtime thread.
pub struct OllamaBackend {
    client: Client,
    endpoint: Url,
    model: String,
}

impl OllamaBackend {
    pub fn new(opts: &OllamaOptions) -> Result<Self> {
        let endpoint = chat_endpoint(&opts.host)?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| {
                PromptSieveError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            model: opts.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Backend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip_all, fields(model = %self.model))]
    fn invoke(&self, prompt: &str) -> Result<BackendReply> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .map_err(|e| PromptSieveError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        let body = response.text().map_err(|e| {
            PromptSieveError::Network(format!("{}: failed to read body: {e}", self.endpoint))
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ChatResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| excerpt(&body).to_string());
            return Err(PromptSieveError::Backend(format!("HTTP {status}: {detail}")));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            PromptSieveError::parse(format!(
                "invalid Ollama response: {e} (got: {})",
                excerpt(&body)
            ))
        })?;

        if let Some(error) = parsed.error {
            return Err(PromptSieveError::Backend(error));
        }

        let message = parsed
            .message
            .ok_or_else(|| PromptSieveError::parse("Ollama response has no message"))?;

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(latency_ms, chars = message.content.len(), "ollama replied");

        Ok(BackendReply {
            text: message.content,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            latency_ms,
        })
    }
}

/// `{host}/api/chat`, keeping any path prefix on the host.
fn chat_endpoint(host: &str) -> Result<Url> {
    let invalid = |detail: String| {
        PromptSieveError::config(format!("invalid Ollama host '{host}': {detail}"))
    };

    let mut endpoint = Url::parse(host.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
    endpoint
        .path_segments_mut()
        .map_err(|()| invalid("cannot be a base URL".into()))?
        .pop_if_empty()
        .extend(["api", "chat"]);
    Ok(endpoint)
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(ERROR_BODY_EXCERPT) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
