//! Language-model backends.
//!
//! The pipeline only ever sees [`Backend::invoke`]: one prompt in, one reply
//! out, or an error. How the model is reached is up to the implementation:
//! - [`OllamaBackend`]: HTTP `/api/chat` on an Ollama server
//! - [`BridgeBackend`]: a subprocess speaking JSON lines on stdin/stdout

mod bridge;
mod ollama;

use promptsieve_shared::Result;
use serde::{Deserialize, Serialize};

pub use bridge::{BridgeBackend, BridgeOptions};
pub use ollama::{OllamaBackend, OllamaOptions};

/// A backend's answer to a single prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendReply {
    /// Raw textual verdict.
    pub text: String,
    /// Model that produced it, when the backend reports one.
    #[serde(default)]
    pub model: String,
    /// Wall-clock time spent on the call.
    #[serde(default)]
    pub latency_ms: u64,
}

impl BackendReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: String::new(),
            latency_ms: 0,
        }
    }
}

/// A blocking prompt → verdict function that may fail.
///
/// Calls are made strictly one at a time; implementations impose their own
/// timeouts, the caller does not.
pub trait Backend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Send one prompt and wait for the reply.
    fn invoke(&self, prompt: &str) -> Result<BackendReply>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke(&self, prompt: &str) -> Result<BackendReply> {
        (**self).invoke(prompt)
    }
}
