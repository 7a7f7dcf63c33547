//! Configuration management
//!
//! Configuration file: ~/.config/skillrun/config.toml (or platform equivalent).
//! Every field has a default, so a missing file is not an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub paths: PathsConfig,

    /// Models the selector may choose from when no model is given
    #[serde(default)]
    pub models: Vec<AgentEntry>,
}

/// Chat backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Execution loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Pause before every model call after the first one
    #[serde(default = "default_iteration_delay_ms")]
    pub iteration_delay_ms: u64,

    /// Durable history entries replayed into each request
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Decline a pending confirmation after this many seconds (unset waits forever)
    #[serde(default)]
    pub approval_timeout_secs: Option<u64>,

    /// Tool names are cut at this delimiter before dispatch; empty disables
    #[serde(default = "default_tool_suffix_delimiter")]
    pub tool_suffix_delimiter: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub sessions_dir: Option<PathBuf>,

    #[serde(default)]
    pub skill_dirs: Vec<PathBuf>,

    /// Folders file tools may touch; empty leaves them unrestricted
    #[serde(default)]
    pub allowed_dirs: Vec<PathBuf>,
}

/// A selectable agent: a model name plus what it is good at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen3:8b".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_iterations() -> usize {
    32
}

fn default_iteration_delay_ms() -> u64 {
    1000
}

fn default_history_window() -> usize {
    4
}

fn default_tool_suffix_delimiter() -> String {
    "<|".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            iteration_delay_ms: default_iteration_delay_ms(),
            history_window: default_history_window(),
            approval_timeout_secs: None,
            tool_suffix_delimiter: default_tool_suffix_delimiter(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.as_ref().display()))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// `<platform config dir>/skillrun`
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;

        Ok(config_dir.join("skillrun"))
    }

    /// Apply overrides from an environment-like lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = first_set(&lookup, &["SKILLRUN_BASE_URL", "COMPAT_URL"]) {
            self.backend.base_url = url;
        }
        if let Some(key) = first_set(&lookup, &["SKILLRUN_API_KEY", "COMPAT_API_KEY"]) {
            self.backend.api_key = Some(key);
        }
        if let Some(model) = first_set(&lookup, &["SKILLRUN_MODEL"]) {
            self.backend.model = model;
        }
        if let Some(dir) = first_set(&lookup, &["SKILLRUN_SESSIONS_DIR"]) {
            self.paths.sessions_dir = Some(PathBuf::from(dir));
        }
    }

    /// Where session directories live
    pub fn sessions_dir(&self) -> Result<PathBuf> {
        match self.paths.sessions_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join("sessions")),
        }
    }

    /// Directories scanned for skills
    pub fn skill_dirs(&self) -> Vec<PathBuf> {
        if !self.paths.skill_dirs.is_empty() {
            return self.paths.skill_dirs.clone();
        }

        let mut dirs = vec![PathBuf::from(".skills")];
        if let Ok(config_dir) = Self::config_dir() {
            dirs.push(config_dir.join("skills"));
        }
        dirs
    }
}

/// First non-empty value among `keys`
fn first_set(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| lookup(*key).filter(|v| !v.is_empty()))
}
