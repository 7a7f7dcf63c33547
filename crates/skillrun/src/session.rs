//! Session persistence
//!
//! Layout under the sessions root:
//!
//! ```text
//! index.json                      {"session_id": "..."}
//! <id>/history.json               durable messages
//! <id>/summary.json               last extracted summary
//! <id>/tool-logs/<stamp>.json     tool results of one invocation
//! ```
//!
//! Reads are forgiving: a missing or unreadable file is treated as empty.
//! Writes go through a temp file and a rename.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillrun_core::Message;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.json";
const HISTORY_FILE: &str = "history.json";
const SUMMARY_FILE: &str = "summary.json";
const TOOL_LOG_DIR: &str = "tool-logs";

/// Unique session identifier
pub type SessionId = String;

/// Current-session pointer
#[derive(Debug, Serialize, Deserialize)]
struct SessionIndex {
    session_id: SessionId,
}

/// State of the current session, as loaded at the start of an invocation
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub dir: PathBuf,
    /// Last summary block the model produced
    pub summary: Option<Value>,
    /// Durable history, oldest first
    pub history: Vec<Message>,
    /// False when the id was minted by this call
    pub resumed: bool,
}

/// Session store rooted at one directory
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Id named by the index pointer, if it is present and well-formed
    pub fn current_id(&self) -> Option<SessionId> {
        let path = self.root.join(INDEX_FILE);
        let json = fs::read_to_string(&path).ok()?;

        match serde_json::from_str::<SessionIndex>(&json) {
            Ok(index) if is_valid_id(&index.session_id) => Some(index.session_id),
            Ok(index) => {
                warn!(session_id = %index.session_id, "Ignoring invalid session id in index");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt session index");
                None
            }
        }
    }

    /// Resume the current session or start a new one
    pub fn resolve(&self) -> Result<Session> {
        let (id, resumed) = match self.current_id() {
            Some(id) => (id, true),
            None => (self.start_new()?, false),
        };

        let dir = self.session_dir(&id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session directory {}", dir.display()))?;

        let history = self.load_history(&id);
        let summary = self.load_summary(&id);

        debug!(
            session_id = %id,
            resumed,
            messages = history.len(),
            has_summary = summary.is_some(),
            "Resolved session"
        );

        Ok(Session {
            id,
            dir,
            summary,
            history,
            resumed,
        })
    }

    /// Mint a new session id and point the index at it.
    ///
    /// Earlier sessions stay on disk untouched.
    pub fn start_new(&self) -> Result<SessionId> {
        let id = generate_session_id();
        let index = SessionIndex {
            session_id: id.clone(),
        };
        let json =
            serde_json::to_string_pretty(&index).context("Failed to serialize session index")?;

        fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create sessions directory {}", self.root.display())
        })?;
        write_atomic(&self.root.join(INDEX_FILE), json.as_bytes())
            .context("Failed to write session index")?;

        info!(session_id = %id, "Started new session");
        Ok(id)
    }

    pub fn load_history(&self, id: &str) -> Vec<Message> {
        let path = self.session_dir(id).join(HISTORY_FILE);
        match read_json::<Vec<Message>>(&path) {
            Ok(Some(history)) => history,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt session history");
                Vec::new()
            }
        }
    }

    /// Persist the durable subset of `messages`
    pub fn save_history(&self, id: &str, messages: &[Message]) -> Result<()> {
        let durable: Vec<&Message> = messages.iter().filter(|m| m.is_durable()).collect();
        let json = serde_json::to_string_pretty(&durable).context("Failed to serialize history")?;

        let dir = self.session_dir(id);
        fs::create_dir_all(&dir).context("Failed to create session directory")?;
        write_atomic(&dir.join(HISTORY_FILE), json.as_bytes()).context("Failed to write history")?;

        debug!(session_id = %id, messages = durable.len(), "Saved history");
        Ok(())
    }

    pub fn load_summary(&self, id: &str) -> Option<Value> {
        let path = self.session_dir(id).join(SUMMARY_FILE);
        match read_json::<Value>(&path) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt session summary");
                None
            }
        }
    }

    pub fn save_summary(&self, id: &str, summary: &Value) -> Result<()> {
        let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;

        let dir = self.session_dir(id);
        fs::create_dir_all(&dir).context("Failed to create session directory")?;
        write_atomic(&dir.join(SUMMARY_FILE), json.as_bytes()).context("Failed to write summary")?;

        debug!(session_id = %id, "Saved summary");
        Ok(())
    }

    /// Write one invocation's tool results under a timestamped name
    pub fn save_tool_log(&self, id: &str, records: &[Message]) -> Result<PathBuf> {
        let dir = self.session_dir(id).join(TOOL_LOG_DIR);
        fs::create_dir_all(&dir).context("Failed to create tool-log directory")?;

        let stamp = Local::now().format("%Y-%m-%d-%H-%M-%S-%3f").to_string();
        let mut path = dir.join(format!("{}.json", stamp));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{}-{}.json", stamp, n));
            n += 1;
        }

        let json = serde_json::to_string_pretty(records).context("Failed to serialize tool log")?;
        write_atomic(&path, json.as_bytes()).context("Failed to write tool log")?;

        debug!(session_id = %id, path = %path.display(), records = records.len(), "Saved tool log");
        Ok(path)
    }
}

/// `Ok(None)` when the file does not exist
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid path: {}", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to rename into {}", path.display()))?;
    Ok(())
}

/// Ids become directory names
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

/// Unix time in nanoseconds
fn generate_session_id() -> SessionId {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
        .to_string()
}
