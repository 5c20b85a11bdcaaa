//! Filesystem backend.
//!
//! Serves Markdown notes straight from disk: listings contain directories
//! and Markdown files only, directories first, then names compared
//! case-insensitively.

use super::{Backend, DirectoryEntry};
use crate::error::{Error, Result};
use crate::path_key::PathKey;
use async_trait::async_trait;
use log::{debug, info, warn};
use std::cell::RefCell;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Chooses a save location. Receives the current file, if any; `None`
/// means the user dismissed the dialog.
pub type SavePrompt = Box<dyn FnMut(Option<&Path>) -> Option<PathBuf>>;

/// Extensions recognised as Markdown.
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "mkd", "mdx"];

/// Check whether a file name has a Markdown extension.
pub fn is_markdown_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            MARKDOWN_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

// ─────────────────────────────────────────────────────────────────────────────
// FsBackend
// ─────────────────────────────────────────────────────────────────────────────

/// `Backend` implementation over `std::fs`.
pub struct FsBackend {
    /// File that `save_document` writes to without a dialog
    active_file: RefCell<Option<PathBuf>>,
    /// Stand-in for the native save dialog
    save_prompt: RefCell<Option<SavePrompt>>,
    /// Names never shown in listings
    hidden_patterns: Vec<String>,
}

impl Default for FsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FsBackend {
    /// Folders that are always hidden.
    pub const DEFAULT_HIDDEN_PATTERNS: &'static [&'static str] =
        &["node_modules", "target", "__pycache__"];

    /// Create a backend with no save prompt.
    pub fn new() -> Self {
        Self {
            active_file: RefCell::new(None),
            save_prompt: RefCell::new(None),
            hidden_patterns: Self::DEFAULT_HIDDEN_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Install the prompt used for save-as and first saves.
    pub fn with_save_prompt(self, prompt: SavePrompt) -> Self {
        *self.save_prompt.borrow_mut() = Some(prompt);
        self
    }

    /// Hide additional names (exact match or `*.ext`).
    pub fn with_hidden_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// The file the backend currently treats as active.
    pub fn active_file(&self) -> Option<PathBuf> {
        self.active_file.borrow().clone()
    }

    /// Build the folder-opened snapshot: the root and its direct children.
    pub fn folder_snapshot(&self, root: &Path) -> Result<DirectoryEntry> {
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| root.to_string_lossy().into_owned());
        let children = self.read_children(root)?;
        Ok(DirectoryEntry::directory(name, root.to_string_lossy(), false).with_children(children))
    }

    fn read_children(&self, dir: &Path) -> Result<Vec<DirectoryEntry>> {
        let read_dir = fs::read_dir(dir).map_err(|source| Error::FileRead {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut entries = Vec::new();
        for entry in read_dir.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue; // Skip entries with invalid UTF-8 names
            };
            if self.is_hidden(&name) {
                continue;
            }
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!("folder tree: stat entry '{}': {}", path.display(), e);
                    continue;
                }
            };

            let path_str = path.to_string_lossy().into_owned();
            if file_type.is_dir() {
                let has_children = self.directory_has_children(&path);
                entries.push(DirectoryEntry::directory(name, path_str, has_children));
            } else if is_markdown_file(&name) {
                entries.push(DirectoryEntry::file(name, path_str));
            }
        }

        // Sort: directories first, then alphabetically (case-insensitive)
        entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        });

        Ok(entries)
    }

    fn directory_has_children(&self, dir: &Path) -> bool {
        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) => {
                warn!("folder tree: read dir '{}': {}", dir.display(), e);
                return false;
            }
        };

        read_dir.flatten().any(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.is_hidden(&name) {
                return false;
            }
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => true,
                Ok(file_type) if file_type.is_symlink() => false,
                Ok(_) => is_markdown_file(&name),
                Err(_) => false,
            }
        })
    }

    fn is_hidden(&self, name: &str) -> bool {
        if name.starts_with('.') {
            return true;
        }
        self.hidden_patterns.iter().any(|pattern| {
            pattern == name
                || pattern
                    .strip_prefix('*')
                    .is_some_and(|suffix| name.ends_with(suffix))
        })
    }

    fn choose_save_target(&self, current: Option<&Path>) -> Result<PathBuf> {
        let mut prompt = self.save_prompt.borrow_mut();
        let Some(prompt) = prompt.as_mut() else {
            return Err(Error::backend("SaveDocument", "no save dialog available"));
        };
        (prompt)(current).ok_or(Error::SaveCancelled)
    }
}

#[async_trait(?Send)]
impl Backend for FsBackend {
    async fn load_directory_entries(&self, path: &PathKey) -> Result<Vec<DirectoryEntry>> {
        self.read_children(path.as_path())
    }

    async fn load_document(&self, path: &PathKey) -> Result<String> {
        debug!("Reading {}", path);
        fs::read_to_string(path.as_path()).map_err(|source| Error::FileRead {
            path: path.as_path().to_path_buf(),
            source,
        })
    }

    async fn save_document(&self, content: &str, force_dialog: bool) -> Result<PathKey> {
        let current = self.active_file();
        let target = match current {
            Some(path) if !force_dialog => path,
            current => self.choose_save_target(current.as_deref())?,
        };

        fs::write(&target, content).map_err(|source| Error::FileWrite {
            path: target.clone(),
            source,
        })?;
        info!("Saved {}", target.display());

        let key = PathKey::from_path(&target)
            .ok_or_else(|| Error::backend("SaveDocument", "no target file selected"))?;
        *self.active_file.borrow_mut() = Some(target);
        Ok(key)
    }

    async fn create_file(&self, path: &PathKey) -> Result<bool> {
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_path())
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                warn!("Refusing to create {}: already exists", path);
                Ok(false)
            }
            Err(source) => Err(Error::FileWrite {
                path: path.as_path().to_path_buf(),
                source,
            }),
        }
    }

    async fn create_directory(&self, path: &PathKey) -> Result<bool> {
        fs::create_dir_all(path.as_path())?;
        Ok(true)
    }

    async fn delete_file(&self, path: &PathKey) -> Result<bool> {
        let target = path.as_path();
        if !target.exists() {
            warn!("Refusing to delete {}: not found", path);
            return Ok(false);
        }
        if target.is_dir() {
            fs::remove_dir_all(target)?;
        } else {
            fs::remove_file(target)?;
        }
        Ok(true)
    }

    async fn rename_file(&self, old_path: &PathKey, new_path: &PathKey) -> Result<bool> {
        if !old_path.as_path().exists() {
            warn!("Refusing to rename {}: source not found", old_path);
            return Ok(false);
        }
        if new_path.as_path().exists() {
            warn!("Refusing to rename {} -> {}: target exists", old_path, new_path);
            return Ok(false);
        }
        fs::rename(old_path.as_path(), new_path.as_path())?;
        Ok(true)
    }

    async fn set_active_file(&self, path: Option<&PathKey>) -> Result<()> {
        *self.active_file.borrow_mut() = path.map(|p| p.as_path().to_path_buf());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(path: &Path) -> PathKey {
        PathKey::from_path(path).unwrap()
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Journal/2024")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("Journal/2024/jan.md"), "# Jan").unwrap();
        fs::write(root.join("b.md"), "b").unwrap();
        fs::write(root.join("A.markdown"), "a").unwrap();
        fs::write(root.join("image.png"), "").unwrap();
        dir
    }

    #[test]
    fn test_is_markdown_file() {
        assert!(is_markdown_file("notes.md"));
        assert!(is_markdown_file("NOTES.MDX"));
        assert!(is_markdown_file("a.mkd"));
        assert!(!is_markdown_file("a.txt"));
        assert!(!is_markdown_file("md"));
    }

    #[tokio::test]
    async fn test_listing_filters_and_sorts() {
        let dir = sample_tree();
        let backend = FsBackend::new();
        let entries = backend
            .load_directory_entries(&key(dir.path()))
            .await
            .unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["empty", "Journal", "A.markdown", "b.md"]);
        assert_eq!(entries[0].has_children, Some(false));
        assert_eq!(entries[1].has_children, Some(true));
    }

    #[tokio::test]
    async fn test_listing_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new();
        let result = backend
            .load_directory_entries(&key(&dir.path().join("nope")))
            .await;
        assert!(matches!(result, Err(Error::FileRead { .. })));
    }

    #[test]
    fn test_folder_snapshot_includes_direct_children() {
        let dir = sample_tree();
        let snapshot = FsBackend::new().folder_snapshot(dir.path()).unwrap();
        assert!(snapshot.is_dir);
        assert_eq!(snapshot.has_children, Some(true));
        assert_eq!(snapshot.children.as_ref().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_save_uses_active_file_then_prompt() {
        let dir = TempDir::new().unwrap();
        let chosen = dir.path().join("chosen.md");
        let prompt_target = chosen.clone();
        let backend = FsBackend::new()
            .with_save_prompt(Box::new(move |_current: Option<&Path>| {
                Some(prompt_target.clone())
            }));

        let saved = backend.save_document("first", false).await.unwrap();
        assert_eq!(saved, key(&chosen));
        assert_eq!(fs::read_to_string(&chosen).unwrap(), "first");

        let existing = dir.path().join("existing.md");
        backend.set_active_file(Some(&key(&existing))).await.unwrap();
        backend.save_document("second", false).await.unwrap();
        assert_eq!(fs::read_to_string(&existing).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_save_cancelled_when_prompt_dismissed() {
        let backend = FsBackend::new().with_save_prompt(Box::new(|_: Option<&Path>| None));
        let err = backend.save_document("x", true).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_create_rename_delete() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new();
        let file = key(&dir.path().join("new.md"));
        let renamed = key(&dir.path().join("renamed.md"));

        assert!(backend.create_file(&file).await.unwrap());
        assert!(!backend.create_file(&file).await.unwrap());
        assert!(backend.rename_file(&file, &renamed).await.unwrap());
        assert!(!backend.rename_file(&file, &renamed).await.unwrap());

        let sub = key(&dir.path().join("sub"));
        assert!(backend.create_directory(&sub).await.unwrap());
        assert!(!backend.rename_file(&renamed, &sub).await.unwrap());

        assert!(backend.delete_file(&sub).await.unwrap());
        assert!(backend.delete_file(&renamed).await.unwrap());
        assert!(!backend.delete_file(&renamed).await.unwrap());
    }

    #[test]
    fn test_hidden_patterns() {
        let backend = FsBackend::new().with_hidden_patterns(["*.tmp.md", "drafts"]);
        assert!(backend.is_hidden(".obsidian"));
        assert!(backend.is_hidden("node_modules"));
        assert!(backend.is_hidden("drafts"));
        assert!(backend.is_hidden("scratch.tmp.md"));
        assert!(!backend.is_hidden("notes.md"));
    }
}
