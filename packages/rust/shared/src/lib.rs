//! Shared types, error model, and configuration for promptsieve.
//!
//! This crate is the foundation depended on by all other promptsieve crates.
//! It provides:
//! - The unified error type, [`PromptSieveError`]
//! - Domain types ([`Instruction`], [`Subject`], [`ReferenceList`], [`RunId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AgentConfig, AppConfig, BackendKind, BridgeConfig, DefaultsConfig, OllamaConfig, OnError,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{PromptSieveError, Result};
pub use types::{Instruction, ReferenceList, RunId, Subject};
