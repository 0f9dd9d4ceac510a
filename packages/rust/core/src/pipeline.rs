//! The chunked-prompt pipeline: subject → units → prompts → backend → results.
//!
//! One [`Pipeline`] type serves every agent. What differs between agents is
//! captured by two knobs:
//! - [`ChunkStrategy`]: send the whole subject once, or word-pack it into chunks
//! - [`FailurePolicy`]: abort on the first backend error, or substitute a
//!   sentinel for the failed unit and keep going
//!
//! Units are processed strictly in order, one blocking backend call at a time.
//! Results are positionally aligned with the units that produced them.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use promptsieve_backend::Backend;
use promptsieve_chunker::{ChunkSize, chunk_with};
use promptsieve_shared::{Instruction, PromptSieveError, ReferenceList, Result, RunId, Subject};

use crate::progress::{RunProgress, SilentProgress};

/// Substituted for a failed chunk in word-packed runs.
pub const CHUNK_SENTINEL: &str = "Failed to generate response for this chunk.";

/// Substituted for a failed single-shot run.
pub const RUN_SENTINEL: &str = "Failed to generate response.";

// ---------------------------------------------------------------------------
// Knobs
// ---------------------------------------------------------------------------

/// How the subject is divided into units of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    /// One unit: the whole rendered subject.
    Whole,
    /// Greedy word packing under a character budget.
    WordPack(ChunkSize),
}

impl ChunkStrategy {
    pub fn label(&self) -> String {
        match self {
            Self::Whole => "whole".into(),
            Self::WordPack(size) => format!("word-pack({size})"),
        }
    }
}

/// What happens when a backend call fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Return the first backend error; no further units are sent.
    Propagate,
    /// Record the sentinel for the failed unit and continue.
    Sentinel(String),
}

impl FailurePolicy {
    /// The conventional sentinel for the given chunking.
    pub fn sentinel_for(chunking: ChunkStrategy) -> Self {
        match chunking {
            ChunkStrategy::Whole => Self::Sentinel(RUN_SENTINEL.into()),
            ChunkStrategy::WordPack(_) => Self::Sentinel(CHUNK_SENTINEL.into()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Propagate => "propagate",
            Self::Sentinel(_) => "sentinel",
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitResult {
    /// The backend's raw reply.
    Response { text: String },
    /// The call failed and the sentinel stands in for the reply.
    Failed { sentinel: String, reason: String },
}

impl UnitResult {
    /// The reply text, or the sentinel for a failed unit.
    pub fn text(&self) -> &str {
        match self {
            Self::Response { text } => text,
            Self::Failed { sentinel, .. } => sentinel,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Everything a run produced, in unit order.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub run_id: RunId,
    pub agent: String,
    pub backend: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub results: Vec<UnitResult>,
}

impl RunOutput {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    /// Reply or sentinel text for every unit.
    pub fn texts(&self) -> Vec<&str> {
        self.results.iter().map(UnitResult::text).collect()
    }

    /// The only result of a single-shot run.
    pub fn single(&self) -> Option<&UnitResult> {
        match self.results.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A configured classification agent.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    instruction: Instruction,
    subject: Subject,
    reference: Option<ReferenceList>,
    chunking: ChunkStrategy,
    on_failure: FailurePolicy,
}

impl Pipeline {
    /// Validate `task` and pair it with an already-validated subject.
    ///
    /// Defaults to a single-shot run that propagates backend errors.
    pub fn new(task: impl Into<String>, subject: Subject) -> Result<Self> {
        Ok(Self {
            name: "pipeline".into(),
            instruction: Instruction::new(task)?,
            subject,
            reference: None,
            chunking: ChunkStrategy::Whole,
            on_failure: FailurePolicy::Propagate,
        })
    }

    /// Name used in logs and reports.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_reference_list(mut self, reference: ReferenceList) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_chunking(mut self, chunking: ChunkStrategy) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_failure_policy(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference_list(&self) -> Option<&ReferenceList> {
        self.reference.as_ref()
    }

    pub fn chunking(&self) -> ChunkStrategy {
        self.chunking
    }

    pub fn failure_policy(&self) -> &FailurePolicy {
        &self.on_failure
    }

    /// Re-check every input invariant.
    ///
    /// Construction already enforces these; `run` calls this again so a
    /// pipeline never reaches the backend with bad input.
    pub fn validate(&self) -> Result<()> {
        if self.instruction.as_str().trim().is_empty() {
            return Err(PromptSieveError::validation("task", "Task cannot be empty."));
        }
        if self.subject.render().trim().is_empty() {
            return Err(PromptSieveError::validation(
                "content",
                "Content cannot be empty.",
            ));
        }
        if let FailurePolicy::Sentinel(text) = &self.on_failure {
            if text.trim().is_empty() {
                return Err(PromptSieveError::validation(
                    "sentinel",
                    "Sentinel text cannot be empty.",
                ));
            }
        }
        Ok(())
    }

    /// Append more directions to the task.
    pub fn amend_instruction(&mut self, extra: &str) {
        self.instruction.append(extra);
    }

    /// Append more material to the subject.
    pub fn amend_subject(&mut self, extra: &str) {
        self.subject.append(extra);
    }

    /// The subject divided per the chunk strategy.
    pub fn units(&self) -> Vec<String> {
        let rendered = self.subject.render();
        match self.chunking {
            ChunkStrategy::Whole => vec![rendered],
            ChunkStrategy::WordPack(size) => chunk_with(&rendered, size),
        }
    }

    /// One prompt per unit: task, unit, and the reference list if any.
    pub fn build_prompts(&self) -> Vec<String> {
        let reference = self.reference.as_ref().map(ReferenceList::render);
        self.units()
            .into_iter()
            .map(|unit| match &reference {
                Some(list) => format!("{}\n{unit}\n{list}", self.instruction.as_str()),
                None => format!("{}\n{unit}", self.instruction.as_str()),
            })
            .collect()
    }

    /// Send each prompt in order, applying the failure policy per unit.
    ///
    /// Only backend failures ([`PromptSieveError::is_backend_failure`]) are
    /// eligible for a sentinel. Any other error aborts the run.
    pub fn invoke_all(
        &self,
        backend: &dyn Backend,
        prompts: &[String],
        progress: &dyn RunProgress,
    ) -> Result<Vec<UnitResult>> {
        let total = prompts.len();
        let mut results = Vec::with_capacity(total);

        for (i, prompt) in prompts.iter().enumerate() {
            let unit = i + 1;
            progress.unit_started(unit, total);
            info!(unit, total, backend = backend.name(), "sending prompt to backend");

            match backend.invoke(prompt) {
                Ok(reply) => results.push(UnitResult::Response { text: reply.text }),
                Err(e) => match &self.on_failure {
                    // only failures talking to the model are isolated per unit
                    FailurePolicy::Sentinel(_) if !e.is_backend_failure() => {
                        error!(unit, total, error = %e, "backend unusable, aborting run");
                        return Err(e);
                    }
                    FailurePolicy::Propagate => {
                        error!(unit, total, error = %e, "backend call failed, aborting run");
                        return Err(e);
                    }
                    FailurePolicy::Sentinel(sentinel) => {
                        warn!(unit, total, error = %e, "backend call failed, using sentinel");
                        progress.unit_failed(unit, &e.to_string());
                        results.push(UnitResult::Failed {
                            sentinel: sentinel.clone(),
                            reason: e.to_string(),
                        });
                    }
                },
            }
        }

        Ok(results)
    }

    /// Run headless.
    pub fn run(&self, backend: &dyn Backend) -> Result<RunOutput> {
        self.run_with_progress(backend, &SilentProgress)
    }

    /// Validate, build prompts, and invoke the backend for every unit.
    #[instrument(skip_all, fields(
        agent = %self.name,
        chunking = %self.chunking.label(),
        policy = self.on_failure.label(),
    ))]
    pub fn run_with_progress(
        &self,
        backend: &dyn Backend,
        progress: &dyn RunProgress,
    ) -> Result<RunOutput> {
        self.validate()?;

        let run_id = RunId::new();
        let started_at = Utc::now();
        let start = Instant::now();

        let prompts = self.build_prompts();
        info!(%run_id, units = prompts.len(), "starting run");
        progress.phase(&format!("Running {} ({} units)", self.name, prompts.len()));

        let results = self.invoke_all(backend, &prompts, progress)?;

        let output = RunOutput {
            run_id,
            agent: self.name.clone(),
            backend: backend.name().to_string(),
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
            results,
        };

        info!(
            run_id = %output.run_id,
            units = output.results.len(),
            failed = output.failed_count(),
            elapsed_ms = output.elapsed_ms,
            "run complete"
        );
        progress.finished(&output);

        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ProgressEvent, RecordingProgress, ScriptedBackend};
    use promptsieve_backend::BackendReply;

    fn text_pipeline(task: &str, content: &str) -> Pipeline {
        Pipeline::new(task, Subject::text(content).unwrap())
            .unwrap()
            .with_name("test")
    }

    fn size(n: i64) -> ChunkStrategy {
        ChunkStrategy::WordPack(ChunkSize::new(n).unwrap())
    }

    #[test]
    fn blank_task_rejected_at_construction() {
        let err = Pipeline::new("  ", Subject::text("content").unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Task cannot be empty.");
    }

    #[test]
    fn whole_strategy_builds_one_prompt() {
        let pipeline = text_pipeline("Is it complete?", "Dummy data for testing");
        assert_eq!(
            pipeline.build_prompts(),
            vec!["Is it complete?\nDummy data for testing"]
        );
    }

    #[test]
    fn word_pack_builds_prompt_per_chunk() {
        let pipeline = text_pipeline("T", "alpha beta gamma delta").with_chunking(size(10));
        assert_eq!(
            pipeline.build_prompts(),
            vec!["T\nalpha beta", "T\ngamma", "T\ndelta"]
        );
    }

    #[test]
    fn reference_list_is_appended_to_every_prompt() {
        let careers = ReferenceList::new(
            "career_list",
            vec!["Backend Developer".into(), "Data Scientist".into()],
        )
        .unwrap();
        let pipeline = text_pipeline("Tag it", "apis databases servers")
            .with_chunking(size(10))
            .with_reference_list(careers);
        let prompts = pipeline.build_prompts();
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[0], "Tag it\napis\nBackend Developer, Data Scientist");
        assert!(prompts.iter().all(|p| p.ends_with("Backend Developer, Data Scientist")));
    }

    #[test]
    fn list_subject_renders_comma_joined() {
        let urls = Subject::list(
            "url_list",
            vec!["http://a.example".into(), "http://b.example".into()],
        )
        .unwrap();
        let pipeline = Pipeline::new("Scan these", urls).unwrap();
        assert_eq!(
            pipeline.build_prompts(),
            vec!["Scan these\nhttp://a.example, http://b.example"]
        );
    }

    #[test]
    fn amendments_append_with_newline() {
        let mut pipeline = text_pipeline("Base task", "base content");
        pipeline.amend_instruction("Extra rule");
        pipeline.amend_subject("more content");
        assert_eq!(
            pipeline.build_prompts(),
            vec!["Base task\nExtra rule\nbase content\nmore content"]
        );
    }

    #[test]
    fn sentinel_isolates_failed_chunk() {
        let backend = ScriptedBackend::new(vec![
            Ok("first"),
            Err("connection reset"),
            Ok("third"),
        ]);
        let pipeline = text_pipeline("T", "one two three")
            .with_chunking(size(3))
            .with_failure_policy(FailurePolicy::Sentinel(CHUNK_SENTINEL.into()));

        let output = pipeline.run(&backend).unwrap();

        assert_eq!(output.results.len(), 3);
        assert_eq!(output.texts(), vec!["first", CHUNK_SENTINEL, "third"]);
        assert_eq!(output.failed_count(), 1);
        match &output.results[1] {
            UnitResult::Failed { reason, .. } => assert!(reason.contains("connection reset")),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(backend.calls(), vec!["T\none", "T\ntwo", "T\nthree"]);
    }

    #[test]
    fn progress_reports_each_unit_and_failure() {
        let backend = ScriptedBackend::new(vec![Ok("a"), Err("timeout"), Ok("c")]);
        let progress = RecordingProgress::default();
        let pipeline = text_pipeline("T", "one two three")
            .with_chunking(size(3))
            .with_failure_policy(FailurePolicy::Sentinel(CHUNK_SENTINEL.into()));

        pipeline.run_with_progress(&backend, &progress).unwrap();

        let events = progress.events();
        let units: Vec<_> = events
            .iter()
            .filter(|e| !matches!(e, ProgressEvent::Phase(_)))
            .cloned()
            .collect();
        assert_eq!(
            units,
            vec![
                ProgressEvent::Started(1, 3),
                ProgressEvent::Started(2, 3),
                ProgressEvent::Failed(2, "network error: timeout".into()),
                ProgressEvent::Started(3, 3),
                ProgressEvent::Finished(3),
            ]
        );
        assert!(matches!(events.first(), Some(ProgressEvent::Phase(_))));
    }

    #[test]
    fn sentinel_policy_does_not_hide_non_backend_errors() {
        struct Misconfigured;

        impl Backend for Misconfigured {
            fn name(&self) -> &str {
                "misconfigured"
            }

            fn invoke(&self, _prompt: &str) -> Result<BackendReply> {
                Err(PromptSieveError::config("no model configured"))
            }
        }

        let pipeline = text_pipeline("T", "one two")
            .with_chunking(size(3))
            .with_failure_policy(FailurePolicy::Sentinel(CHUNK_SENTINEL.into()));

        let err = pipeline.run(&Misconfigured).unwrap_err();
        assert!(matches!(err, PromptSieveError::Config { .. }));
    }

    #[test]
    fn propagate_aborts_on_first_failure() {
        let backend = ScriptedBackend::new(vec![Ok("first"), Err("model not found"), Ok("never")]);
        let pipeline = text_pipeline("T", "one two three").with_chunking(size(3));

        let err = pipeline.run(&backend).unwrap_err();

        assert!(err.to_string().contains("model not found"));
        assert_eq!(backend.call_count(), 2);
    }

    #[test]
    fn single_shot_sentinel_policy() {
        let backend = ScriptedBackend::new(vec![Err("timeout")]);
        let pipeline = text_pipeline("T", "content")
            .with_failure_policy(FailurePolicy::sentinel_for(ChunkStrategy::Whole));

        let output = pipeline.run(&backend).unwrap();
        let only = output.single().expect("one result");
        assert_eq!(only.text(), RUN_SENTINEL);
        assert!(only.is_failed());
    }

    #[test]
    fn results_align_with_chunks() {
        let backend = ScriptedBackend::echo();
        let pipeline = text_pipeline("T", "a b c d e f g").with_chunking(size(3));

        let output = pipeline.run(&backend).unwrap();
        let expected: Vec<String> = pipeline.build_prompts();
        assert_eq!(output.texts(), expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn blank_sentinel_fails_validation_before_backend() {
        let backend = ScriptedBackend::echo();
        let pipeline =
            text_pipeline("T", "content").with_failure_policy(FailurePolicy::Sentinel(" ".into()));

        let err = pipeline.run(&backend).unwrap_err();
        assert_eq!(err.field(), Some("sentinel"));
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn non_string_list_element_never_reaches_backend() {
        let backend = ScriptedBackend::echo();
        let value = serde_json::json!(["http://a.example", 42]);

        let built = Subject::from_json("url_list", &value)
            .and_then(|urls| Pipeline::new("Scan these", urls))
            .and_then(|pipeline| pipeline.run(&backend));

        assert_eq!(built.unwrap_err().field(), Some("url_list"));
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn run_output_serializes_status_tags() {
        let backend = ScriptedBackend::new(vec![Ok("Yes"), Err("boom")]);
        let pipeline = text_pipeline("T", "aa bb")
            .with_chunking(size(2))
            .with_failure_policy(FailurePolicy::Sentinel(CHUNK_SENTINEL.into()));

        let output = pipeline.run(&backend).unwrap();
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["agent"], "test");
        assert_eq!(json["backend"], "scripted");
        assert_eq!(json["results"][0]["status"], "response");
        assert_eq!(json["results"][0]["text"], "Yes");
        assert_eq!(json["results"][1]["status"], "failed");
        assert_eq!(json["results"][1]["sentinel"], CHUNK_SENTINEL);
    }

    #[test]
    fn strategy_and_policy_labels() {
        assert_eq!(ChunkStrategy::Whole.label(), "whole");
        assert_eq!(size(1000).label(), "word-pack(1000)");
        assert_eq!(FailurePolicy::Propagate.label(), "propagate");
        assert_eq!(
            FailurePolicy::sentinel_for(size(5)),
            FailurePolicy::Sentinel(CHUNK_SENTINEL.into())
        );
    }
}
