//! Application configuration for promptsieve.
//!
//! User config lives at `~/.promptsieve/promptsieve.toml`.
//! CLI flags override agent sections, which override `[defaults]`,
//! which override built-in values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PromptSieveError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "promptsieve.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".promptsieve";

// ---------------------------------------------------------------------------
// Config structs (matching promptsieve.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Ollama backend settings.
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Subprocess bridge backend settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Per-agent overrides keyed by preset name (e.g. `content_guard`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agents: BTreeMap<String, AgentConfig>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Chunk-size budget in characters for word-packing agents.
    ///
    /// Signed so that a bad value is reported as a validation error
    /// rather than a TOML type error.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,

    /// Which backend answers prompts.
    #[serde(default)]
    pub backend: BackendKind,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            backend: BackendKind::default(),
        }
    }
}

fn default_chunk_size() -> i64 {
    1000
}

/// Backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// HTTP chat endpoint of a local or remote Ollama server.
    #[default]
    Ollama,
    /// A subprocess speaking JSON lines on stdin/stdout.
    Bridge,
}

/// `[ollama]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_host")]
    pub host: String,

    /// Model identifier passed on every chat request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout applied at the backend boundary.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "phi3".into()
}
fn default_timeout_secs() -> u64 {
    120
}

/// `[bridge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Program to spawn.
    #[serde(default = "default_bridge_command")]
    pub command: String,

    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: default_bridge_command(),
            args: Vec::new(),
        }
    }
}

fn default_bridge_command() -> String {
    "promptsieve-bridge".into()
}

/// What a pipeline does when a backend call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Abort the run and return the error.
    Propagate,
    /// Substitute the sentinel string and keep going.
    Sentinel,
}

impl std::str::FromStr for OnError {
    type Err = PromptSieveError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "propagate" => Ok(Self::Propagate),
            "sentinel" => Ok(Self::Sentinel),
            other => Err(PromptSieveError::validation(
                "on_error",
                format!("unknown failure policy '{other}': expected 'propagate' or 'sentinel'"),
            )),
        }
    }
}

/// `[agents.<name>]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Chunk-size override for this agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<i64>,

    /// Failure policy override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnError>,

    /// Replacement sentinel text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinel: Option<String>,
}

impl AppConfig {
    /// Overrides for the named agent, or an empty set.
    pub fn agent(&self, name: &str) -> AgentConfig {
        self.agents.get(name).cloned().unwrap_or_default()
    }

    /// Effective chunk size for the named agent before validation.
    pub fn chunk_size_for(&self, name: &str) -> i64 {
        self.agents
            .get(name)
            .and_then(|a| a.chunk_size)
            .unwrap_or(self.defaults.chunk_size)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.promptsieve/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PromptSieveError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.promptsieve/promptsieve.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PromptSieveError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PromptSieveError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PromptSieveError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PromptSieveError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PromptSieveError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("chunk_size"));
        assert!(toml_str.contains("http://localhost:11434"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.chunk_size, 1000);
        assert_eq!(parsed.ollama.model, "phi3");
        assert_eq!(parsed.ollama.timeout_secs, 120);
        assert_eq!(parsed.defaults.backend, BackendKind::Ollama);
    }

    #[test]
    fn config_with_agent_overrides() {
        let toml_str = r#"
[defaults]
chunk_size = 500

[agents.content_guard]
chunk_size = 250
on_error = "propagate"

[agents.url_filter]
sentinel = "URL check unavailable."
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.chunk_size_for("content_guard"), 250);
        assert_eq!(config.chunk_size_for("tag_generator"), 500);
        assert_eq!(config.agent("content_guard").on_error, Some(OnError::Propagate));
        assert_eq!(
            config.agent("url_filter").sentinel.as_deref(),
            Some("URL check unavailable.")
        );
        assert!(config.agent("content_validator").on_error.is_none());
    }

    #[test]
    fn bridge_backend_selection() {
        let toml_str = r#"
[defaults]
backend = "bridge"

[bridge]
command = "bun"
args = ["run", "bridge.ts"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.backend, BackendKind::Bridge);
        assert_eq!(config.bridge.command, "bun");
        assert_eq!(config.bridge.args, vec!["run", "bridge.ts"]);
    }

    #[test]
    fn negative_chunk_size_parses_for_later_validation() {
        let config: AppConfig = toml::from_str("[defaults]\nchunk_size = -1\n").expect("parse");
        assert_eq!(config.defaults.chunk_size, -1);
    }

    #[test]
    fn on_error_from_str() {
        assert_eq!("sentinel".parse::<OnError>().unwrap(), OnError::Sentinel);
        assert_eq!("propagate".parse::<OnError>().unwrap(), OnError::Propagate);
        let err = "retry".parse::<OnError>().unwrap_err();
        assert_eq!(err.field(), Some("on_error"));
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/promptsieve.toml")).unwrap_err();
        assert!(matches!(err, PromptSieveError::Io { .. }));
    }
}
