//! Backend collaborator.
//!
//! Storage lives behind an asynchronous `Backend` trait so the state manager
//! never touches the filesystem directly. Every call is a single-shot
//! operation that may fail; retries are the caller's business.

mod local;
#[cfg(test)]
pub(crate) mod mock;

pub use local::{is_markdown_file, FsBackend, SavePrompt};

use crate::error::Result;
use crate::path_key::PathKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Directory Entries
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of a directory listing or folder snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Full path; falls back to `name` when empty
    #[serde(default)]
    pub path: String,
    /// Whether the entry is a directory
    #[serde(default)]
    pub is_dir: bool,
    /// Whether a directory has listable children, when the backend knows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_children: Option<bool>,
    /// Nested entries, present in folder snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<DirectoryEntry>>,
}

impl DirectoryEntry {
    /// A file entry.
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir: false,
            has_children: None,
            children: None,
        }
    }

    /// A directory entry whose children are not included.
    pub fn directory(name: impl Into<String>, path: impl Into<String>, has_children: bool) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_dir: true,
            has_children: Some(has_children),
            children: None,
        }
    }

    /// Attach nested children (folder snapshots).
    pub fn with_children(mut self, children: Vec<DirectoryEntry>) -> Self {
        self.has_children = Some(!children.is_empty());
        self.children = Some(children);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Asynchronous storage operations consumed by the state manager.
///
/// The state manager runs on a single logical thread, so futures are not
/// required to be `Send`.
#[async_trait(?Send)]
pub trait Backend {
    /// List the children of a directory.
    async fn load_directory_entries(&self, path: &PathKey) -> Result<Vec<DirectoryEntry>>;

    /// Read a document's text.
    async fn load_document(&self, path: &PathKey) -> Result<String>;

    /// Write `content` to the backend's active file, or to a location chosen
    /// through a save dialog when `force_dialog` is set or no file is active.
    ///
    /// Fails with `Error::SaveCancelled` when the dialog is dismissed.
    async fn save_document(&self, content: &str, force_dialog: bool) -> Result<PathKey>;

    /// Create an empty file. `Ok(false)` means the backend refused.
    async fn create_file(&self, path: &PathKey) -> Result<bool>;

    /// Create a directory. `Ok(false)` means the backend refused.
    async fn create_directory(&self, path: &PathKey) -> Result<bool>;

    /// Delete a file or directory tree. `Ok(false)` means the backend refused.
    async fn delete_file(&self, path: &PathKey) -> Result<bool>;

    /// Rename or move a file or directory. `Ok(false)` means the backend refused.
    async fn rename_file(&self, old_path: &PathKey, new_path: &PathKey) -> Result<bool>;

    /// Tell the backend which file is active (`None` for a scratch buffer).
    async fn set_active_file(&self, path: Option<&PathKey>) -> Result<()>;
}
