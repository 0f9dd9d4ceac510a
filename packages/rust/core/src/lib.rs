//! Prompt pipeline and built-in agents for PromptSieve.
//!
//! This crate ties together validation, chunking, and backend invocation
//! into single runs (e.g., [`AgentKind::ContentGuard`] over a long article).

pub mod agents;
pub mod pipeline;
pub mod progress;

#[cfg(test)]
mod test_support;

pub use agents::{AgentKind, AgentSettings};
pub use pipeline::{
    CHUNK_SENTINEL, ChunkStrategy, FailurePolicy, Pipeline, RUN_SENTINEL, RunOutput, UnitResult,
};
pub use progress::{RunProgress, SilentProgress};
