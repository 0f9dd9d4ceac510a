//! Subprocess bridge backend.
//!
//! Spawns a helper process and exchanges JSON lines with it: the bridge
//! announces `{"type":"ready"}`, then answers each `prompt` request with a
//! `result` or `error` message carrying the same id.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;
use std::time::Instant;

use promptsieve_shared::{BridgeConfig, PromptSieveError, Result};
use tracing::{info, warn};

use crate::{Backend, BackendReply};

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// Request message sent to the bridge.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "type")]
enum RequestMessage<'a> {
    #[serde(rename = "prompt")]
    Prompt { id: String, prompt: &'a str },
    #[serde(rename = "shutdown")]
    Shutdown,
}

/// Response message received from the bridge.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type")]
enum ResponseMessage {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "result")]
    Result { id: String, result: BackendReply },
    #[serde(rename = "error")]
    Error { id: String, error: String },
}

/// How to launch the bridge.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub command: String,
    pub args: Vec<String>,
}

impl From<&BridgeConfig> for BridgeOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bridge handle
// ---------------------------------------------------------------------------

struct BridgeHandle {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    request_counter: u64,
}

impl BridgeHandle {
    fn spawn(opts: &BridgeOptions) -> Result<Self> {
        info!(cmd = %opts.command, "spawning backend bridge");

        let mut child = Command::new(&opts.command)
            .args(&opts.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                PromptSieveError::config(format!(
                    "failed to spawn bridge: {e}. Is `{}` installed?",
                    opts.command
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PromptSieveError::Backend("failed to capture bridge stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PromptSieveError::Backend("failed to capture bridge stdout".into()))?;

        let mut handle = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            request_counter: 0,
        };
        handle.wait_for_ready()?;
        Ok(handle)
    }

    fn read_message(&mut self) -> Result<ResponseMessage> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .map_err(|e| PromptSieveError::Network(format!("bridge read error: {e}")))?;

        if line.is_empty() {
            return Err(PromptSieveError::Network(
                "bridge closed stdout unexpectedly".into(),
            ));
        }

        serde_json::from_str(line.trim()).map_err(|e| {
            let shown: String = line.chars().take(200).collect();
            PromptSieveError::parse(format!("invalid bridge message: {e} (got: {shown})"))
        })
    }

    fn wait_for_ready(&mut self) -> Result<()> {
        match self.read_message()? {
            ResponseMessage::Ready => {
                info!("bridge is ready");
                Ok(())
            }
            other => Err(PromptSieveError::Backend(format!(
                "expected ready message, got: {other:?}"
            ))),
        }
    }

    fn send(&mut self, request: &RequestMessage<'_>) -> Result<()> {
        let json = serde_json::to_string(request)
            .map_err(|e| PromptSieveError::parse(format!("failed to serialize request: {e}")))?;
        writeln!(self.stdin, "{json}")
            .and_then(|()| self.stdin.flush())
            .map_err(|e| PromptSieveError::Network(format!("failed to write to bridge: {e}")))
    }

    fn prompt(&mut self, prompt: &str) -> Result<BackendReply> {
        self.request_counter += 1;
        let id = format!("req-{}", self.request_counter);

        self.send(&RequestMessage::Prompt {
            id: id.clone(),
            prompt,
        })?;

        // Replies to earlier requests (e.g. after a bridge-side retry) are
        // dropped until ours arrives.
        loop {
            match self.read_message()? {
                ResponseMessage::Result {
                    id: resp_id,
                    result,
                } if resp_id == id => return Ok(result),
                ResponseMessage::Error { id: resp_id, error } if resp_id == id => {
                    return Err(PromptSieveError::Backend(error));
                }
                ResponseMessage::Result { id: resp_id, .. }
                | ResponseMessage::Error { id: resp_id, .. } => {
                    warn!(expected = %id, got = %resp_id, "discarding stale bridge reply");
                }
                ResponseMessage::Ready => {
                    return Err(PromptSieveError::Backend(
                        "unexpected ready message during prompt".into(),
                    ));
                }
            }
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.send(&RequestMessage::Shutdown) {
            warn!(error = %e, "failed to send bridge shutdown");
        }
        match self.child.wait() {
            Ok(status) => info!(?status, "bridge exited"),
            Err(e) => warn!("bridge wait error: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// A long-lived helper process answering prompts over JSON lines.
///
/// The process is shut down when the backend is dropped.
pub struct BridgeBackend {
    handle: Mutex<BridgeHandle>,
}

impl BridgeBackend {
    pub fn spawn(opts: &BridgeOptions) -> Result<Self> {
        Ok(Self {
            handle: Mutex::new(BridgeHandle::spawn(opts)?),
        })
    }
}

impl Backend for BridgeBackend {
    fn name(&self) -> &str {
        "bridge"
    }

    fn invoke(&self, prompt: &str) -> Result<BackendReply> {
        let start = Instant::now();
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| PromptSieveError::Backend("bridge handle poisoned".into()))?;
        let mut reply = handle.prompt(prompt)?;
        if reply.latency_ms == 0 {
            reply.latency_ms = start.elapsed().as_millis() as u64;
        }
        Ok(reply)
    }
}

impl Drop for BridgeBackend {
    fn drop(&mut self) {
        if let Ok(handle) = self.handle.get_mut() {
            handle.shutdown();
        }
    }
}
