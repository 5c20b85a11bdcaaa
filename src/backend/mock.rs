//! In-memory backend used by unit tests.

// Not every test module uses every helper
#![allow(dead_code)]

use super::{Backend, DirectoryEntry};
use crate::error::{Error, Result};
use crate::path_key::PathKey;
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

/// Scriptable backend that records every call it receives.
#[derive(Default)]
pub(crate) struct MockBackend {
    listings: RefCell<HashMap<PathKey, Vec<DirectoryEntry>>>,
    failing_listings: RefCell<HashSet<PathKey>>,
    documents: RefCell<HashMap<PathKey, String>>,
    active: RefCell<Option<PathKey>>,
    /// Result of the next save dialog; `None` dismisses it
    dialog_choice: RefCell<Option<PathKey>>,
    fail_save: Cell<bool>,
    fail_active: Cell<bool>,
    refuse_mutations: Cell<bool>,
    pub listing_calls: RefCell<Vec<PathKey>>,
    pub active_calls: RefCell<Vec<Option<PathKey>>>,
    pub saved: RefCell<Vec<(PathKey, String)>>,
}

pub(crate) fn key(path: &str) -> PathKey {
    PathKey::parse(path).unwrap()
}

/// File entry named after the last segment of `path`.
pub(crate) fn file_entry(path: &str) -> DirectoryEntry {
    DirectoryEntry::file(key(path).file_name(), path)
}

/// Directory entry named after the last segment of `path`.
pub(crate) fn dir_entry(path: &str, has_children: bool) -> DirectoryEntry {
    DirectoryEntry::directory(key(path).file_name(), path, has_children)
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the listing returned for `dir`.
    pub fn with_listing(self, dir: &str, entries: Vec<DirectoryEntry>) -> Self {
        self.listings.borrow_mut().insert(key(dir), entries);
        self
    }

    /// Register a readable document.
    pub fn with_document(self, path: &str, content: &str) -> Self {
        self.documents
            .borrow_mut()
            .insert(key(path), content.to_string());
        self
    }

    pub fn fail_listing(&self, dir: &str) {
        self.failing_listings.borrow_mut().insert(key(dir));
    }

    pub fn set_listing(&self, dir: &str, entries: Vec<DirectoryEntry>) {
        self.listings.borrow_mut().insert(key(dir), entries);
    }

    pub fn choose_on_save(&self, path: Option<&str>) {
        *self.dialog_choice.borrow_mut() = path.map(key);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_save.set(fail);
    }

    pub fn fail_active_notices(&self, fail: bool) {
        self.fail_active.set(fail);
    }

    pub fn refuse_mutations(&self, refuse: bool) {
        self.refuse_mutations.set(refuse);
    }

    pub fn listing_count(&self, dir: &str) -> usize {
        let dir = key(dir);
        self.listing_calls
            .borrow()
            .iter()
            .filter(|called| **called == dir)
            .count()
    }

    pub fn active(&self) -> Option<PathKey> {
        self.active.borrow().clone()
    }

    pub fn has_entry(&self, path: &str) -> bool {
        let path = key(path);
        self.listings
            .borrow()
            .values()
            .flatten()
            .any(|entry| key(&entry.path) == path)
    }

    fn add_entry(&self, entry: DirectoryEntry) {
        let path = key(&entry.path);
        if let Some(parent) = path.parent() {
            let mut listings = self.listings.borrow_mut();
            let siblings = listings.entry(parent).or_default();
            siblings.retain(|existing| key(&existing.path) != path);
            siblings.push(entry);
        }
    }

    fn remove_entry(&self, path: &PathKey) -> Option<DirectoryEntry> {
        let parent = path.parent()?;
        let mut listings = self.listings.borrow_mut();
        let siblings = listings.get_mut(&parent)?;
        let index = siblings.iter().position(|entry| key(&entry.path) == *path)?;
        Some(siblings.remove(index))
    }
}

#[async_trait(?Send)]
impl Backend for MockBackend {
    async fn load_directory_entries(&self, path: &PathKey) -> Result<Vec<DirectoryEntry>> {
        self.listing_calls.borrow_mut().push(path.clone());
        if self.failing_listings.borrow().contains(path) {
            return Err(Error::backend("LoadDirectoryEntries", "listing failed"));
        }
        Ok(self.listings.borrow().get(path).cloned().unwrap_or_default())
    }

    async fn load_document(&self, path: &PathKey) -> Result<String> {
        self.documents
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::backend("LoadDocument", format!("{} not found", path)))
    }

    async fn save_document(&self, content: &str, force_dialog: bool) -> Result<PathKey> {
        if self.fail_save.get() {
            return Err(Error::backend("SaveDocument", "disk full"));
        }
        let active = self.active.borrow().clone();
        let target = match active {
            Some(path) if !force_dialog => path,
            _ => self
                .dialog_choice
                .borrow_mut()
                .take()
                .ok_or(Error::SaveCancelled)?,
        };
        self.documents
            .borrow_mut()
            .insert(target.clone(), content.to_string());
        self.saved
            .borrow_mut()
            .push((target.clone(), content.to_string()));
        *self.active.borrow_mut() = Some(target.clone());
        Ok(target)
    }

    async fn create_file(&self, path: &PathKey) -> Result<bool> {
        if self.refuse_mutations.get() || self.documents.borrow().contains_key(path) {
            return Ok(false);
        }
        self.documents.borrow_mut().insert(path.clone(), String::new());
        self.add_entry(file_entry(path.as_str()));
        Ok(true)
    }

    async fn create_directory(&self, path: &PathKey) -> Result<bool> {
        if self.refuse_mutations.get() {
            return Ok(false);
        }
        self.add_entry(dir_entry(path.as_str(), false));
        self.listings.borrow_mut().entry(path.clone()).or_default();
        Ok(true)
    }

    async fn delete_file(&self, path: &PathKey) -> Result<bool> {
        if self.refuse_mutations.get() {
            return Ok(false);
        }
        let removed = self.remove_entry(path).is_some();
        self.documents
            .borrow_mut()
            .retain(|doc, _| !doc.is_same_or_within(path));
        self.listings
            .borrow_mut()
            .retain(|dir, _| !dir.is_same_or_within(path));
        Ok(removed)
    }

    async fn rename_file(&self, old_path: &PathKey, new_path: &PathKey) -> Result<bool> {
        if self.refuse_mutations.get() {
            return Ok(false);
        }
        let Some(mut entry) = self.remove_entry(old_path) else {
            return Ok(false);
        };
        entry.name = new_path.file_name().to_string();
        entry.path = new_path.as_str().to_string();
        self.add_entry(entry);

        let rebase_entries = |entries: Vec<DirectoryEntry>| -> Vec<DirectoryEntry> {
            entries
                .into_iter()
                .map(|mut entry| {
                    if let Some(moved) = key(&entry.path).rebase(old_path, new_path) {
                        entry.path = moved.as_str().to_string();
                    }
                    entry
                })
                .collect()
        };

        let listings = std::mem::take(&mut *self.listings.borrow_mut());
        *self.listings.borrow_mut() = listings
            .into_iter()
            .map(|(dir, entries)| {
                let dir = dir.rebase(old_path, new_path).unwrap_or(dir);
                (dir, rebase_entries(entries))
            })
            .collect();

        let documents = std::mem::take(&mut *self.documents.borrow_mut());
        *self.documents.borrow_mut() = documents
            .into_iter()
            .map(|(path, content)| (path.rebase(old_path, new_path).unwrap_or(path), content))
            .collect();
        Ok(true)
    }

    async fn set_active_file(&self, path: Option<&PathKey>) -> Result<()> {
        self.active_calls.borrow_mut().push(path.cloned());
        if self.fail_active.get() {
            return Err(Error::backend("SetActiveFile", "backend unavailable"));
        }
        *self.active.borrow_mut() = path.cloned();
        Ok(())
    }
}
