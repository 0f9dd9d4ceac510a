//! Error types for promptsieve.
//!
//! Library crates use [`PromptSieveError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all promptsieve operations.
#[derive(Debug, thiserror::Error)]
pub enum PromptSieveError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Input rejected before any backend interaction.
    ///
    /// Displays as the bare message so callers can surface it verbatim
    /// (e.g. `Task cannot be empty.`).
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Transport failure while reaching the backend.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered, but reported an error.
    #[error("backend error: {0}")]
    Backend(String),

    /// A backend response could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PromptSieveError>;

impl PromptSieveError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error naming the offending field.
    pub fn validation(field: &'static str, msg: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The input field a validation error refers to.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Whether this error came from talking to the backend.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Backend(_) | Self::Parse { .. })
    }
}
