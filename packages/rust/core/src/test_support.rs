use std::collections::VecDeque;
use std::sync::Mutex;

use promptsieve_backend::{Backend, BackendReply};
use promptsieve_shared::{PromptSieveError, Result};

use crate::pipeline::RunOutput;
use crate::progress::RunProgress;

/// Replays scripted replies in order and records every prompt it receives.
///
/// `Err` entries become network errors. An exhausted script echoes the prompt.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<std::result::Result<&str, &str>>) -> Self {
        let script = script
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn invoke(&self, prompt: &str) -> Result<BackendReply> {
        self.calls.lock().unwrap().push(prompt.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(BackendReply::text(text)),
            Some(Err(reason)) => Err(PromptSieveError::Network(reason)),
            None => Ok(BackendReply::text(prompt)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase(String),
    Started(usize, usize),
    Failed(usize, String),
    /// Number of results in the finished run.
    Finished(usize),
}

/// Records every progress callback in order.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl RunProgress for RecordingProgress {
    fn phase(&self, name: &str) {
        self.push(ProgressEvent::Phase(name.to_string()));
    }

    fn unit_started(&self, current: usize, total: usize) {
        self.push(ProgressEvent::Started(current, total));
    }

    fn unit_failed(&self, index: usize, reason: &str) {
        self.push(ProgressEvent::Failed(index, reason.to_string()));
    }

    fn finished(&self, output: &RunOutput) {
        self.push(ProgressEvent::Finished(output.results.len()));
    }
}
