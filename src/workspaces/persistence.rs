//! Per-folder session state (open tabs, expansion), not user settings.

use crate::error::{Error, Result};
use crate::path_key::PathKey;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ─────────────────────────────────────────────────────────────────────────────
// Session State
// ─────────────────────────────────────────────────────────────────────────────

/// What to bring back when a folder is reopened.
///
/// Stored in `{folder}/.notedeck/state.json`. Untitled buffers are never
/// recorded since they have nothing to reload from.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SessionState {
    /// Files open in tabs, in tab order
    pub open_tabs: Vec<PathKey>,

    /// The tab that was active
    pub active_file: Option<PathKey>,

    /// Expanded directories in the file tree
    pub expanded_paths: Vec<PathKey>,

    /// Recently opened files within this folder, newest first
    pub recent_files: Vec<PathKey>,
}

impl SessionState {
    /// Whether there is anything worth restoring.
    pub fn is_empty(&self) -> bool {
        self.open_tabs.is_empty() && self.expanded_paths.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// The subdirectory holding per-folder state.
const SESSION_DIR: &str = ".notedeck";

/// The state file name.
const STATE_FILE: &str = "state.json";

/// Location of the session file for `folder`.
pub fn session_path(folder: &Path) -> PathBuf {
    folder.join(SESSION_DIR).join(STATE_FILE)
}

/// Load the session saved for `folder`.
///
/// Returns `None` if the state file doesn't exist or is invalid.
pub fn load_session(folder: &Path) -> Option<SessionState> {
    let state_path = session_path(folder);

    if !state_path.exists() {
        log::debug!("No session file at {:?}", state_path);
        return None;
    }

    match std::fs::read_to_string(&state_path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(state) => {
                log::debug!("Loaded session from {:?}", state_path);
                Some(state)
            }
            Err(e) => {
                log::warn!("Failed to parse session state: {}", e);
                None
            }
        },
        Err(e) => {
            log::warn!("Failed to read session state: {}", e);
            None
        }
    }
}

/// Save the session for `folder`, creating `.notedeck` if needed.
pub fn save_session(folder: &Path, state: &SessionState) -> Result<()> {
    let state_dir = folder.join(SESSION_DIR);
    std::fs::create_dir_all(&state_dir).map_err(|source| Error::FileWrite {
        path: state_dir.clone(),
        source,
    })?;

    let state_path = state_dir.join(STATE_FILE);
    let content = serde_json::to_string_pretty(state)?;
    std::fs::write(&state_path, content).map_err(|source| Error::FileWrite {
        path: state_path.clone(),
        source,
    })?;
    log::debug!("Saved session to {:?}", state_path);

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(path: &str) -> PathKey {
        PathKey::parse(path).unwrap()
    }

    #[test]
    fn test_session_default_is_empty() {
        let state = SessionState::default();
        assert!(state.is_empty());
        assert!(state.active_file.is_none());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let parsed: SessionState =
            serde_json::from_str(r#"{"open_tabs": ["/notes/a.md"]}"#).unwrap();
        assert_eq!(parsed.open_tabs, vec![key("/notes/a.md")]);
        assert!(parsed.expanded_paths.is_empty());
    }

    #[test]
    fn test_load_save_session() {
        let dir = TempDir::new().unwrap();
        let state = SessionState {
            open_tabs: vec![key("/notes/a.md"), key("/notes/b.md")],
            active_file: Some(key("/notes/b.md")),
            expanded_paths: vec![key("/notes"), key("/notes/daily")],
            recent_files: vec![key("/notes/b.md")],
        };

        save_session(dir.path(), &state).unwrap();
        assert!(session_path(dir.path()).exists());

        let loaded = load_session(dir.path()).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_corrupt_session_is_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(SESSION_DIR)).unwrap();
        std::fs::write(session_path(dir.path()), "{not json").unwrap();
        assert!(load_session(dir.path()).is_none());
    }
}
