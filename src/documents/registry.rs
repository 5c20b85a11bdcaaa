//! Document registry: open documents, dirty tracking and tab order.

use crate::editor::EditorWidget;
use crate::path_key::{PathKey, UNTITLED_NAME};
use log::{debug, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

// ─────────────────────────────────────────────────────────────────────────────
// Open Document
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime state for a document shown in a tab.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenDocument {
    /// Identity of the document (a placeholder key for scratch buffers)
    pub path: PathKey,
    /// Tab label
    pub display_name: String,
    /// Content as last loaded from or written to storage
    pub saved_content: String,
    /// Content as last pulled from the editing widget
    pub current_content: String,
    /// Cached `current_content != saved_content`
    pub is_dirty: bool,
}

impl OpenDocument {
    fn new(path: PathKey, content: &str) -> Self {
        Self {
            display_name: display_name_for(&path),
            path,
            saved_content: content.to_string(),
            current_content: content.to_string(),
            is_dirty: false,
        }
    }

    /// Whether the document has no backing file yet.
    pub fn is_untitled(&self) -> bool {
        self.path.is_untitled()
    }

    /// Tab title with a dirty marker, e.g. `notes.md *`.
    pub fn title(&self) -> String {
        if self.is_dirty {
            format!("{} *", self.display_name)
        } else {
            self.display_name.clone()
        }
    }

    /// Recompute the dirty flag, returning whether it changed.
    fn refresh_dirty(&mut self) -> bool {
        let was_dirty = self.is_dirty;
        self.is_dirty = self.current_content != self.saved_content;
        was_dirty != self.is_dirty
    }
}

fn display_name_for(path: &PathKey) -> String {
    if path.is_untitled() {
        UNTITLED_NAME.to_string()
    } else {
        path.file_name().to_string()
    }
}

/// A document removed by `DocumentRegistry::close`.
#[derive(Debug, Clone)]
pub struct ClosedDocument {
    /// The removed document
    pub document: OpenDocument,
    /// Tab that should become active if the closed one was active
    pub fallback: Option<PathKey>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Document Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Owns open documents and keeps them in bijection with the tab order.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    documents: HashMap<PathKey, OpenDocument>,
    tab_order: Vec<PathKey>,
}

impl DocumentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open documents.
    pub fn len(&self) -> usize {
        self.tab_order.len()
    }

    /// Whether no document is open.
    pub fn is_empty(&self) -> bool {
        self.tab_order.is_empty()
    }

    /// Tab order, oldest first.
    pub fn tab_order(&self) -> &[PathKey] {
        &self.tab_order
    }

    /// Documents in tab order.
    pub fn iter(&self) -> impl Iterator<Item = &OpenDocument> {
        self.tab_order.iter().filter_map(|key| self.documents.get(key))
    }

    /// Look up a document.
    pub fn get(&self, path: &PathKey) -> Option<&OpenDocument> {
        self.documents.get(path)
    }

    /// Whether a document is open under `path`.
    pub fn contains(&self, path: &PathKey) -> bool {
        self.documents.contains_key(path)
    }

    /// Position of a document in the tab strip.
    pub fn tab_index(&self, path: &PathKey) -> Option<usize> {
        self.tab_order.iter().position(|key| key == path)
    }

    /// Whether any open document has unsaved edits.
    pub fn has_unsaved_changes(&self) -> bool {
        self.documents.values().any(|doc| doc.is_dirty)
    }

    /// Keys of documents with unsaved edits, in tab order.
    pub fn dirty_paths(&self) -> Vec<PathKey> {
        self.iter()
            .filter(|doc| doc.is_dirty)
            .map(|doc| doc.path.clone())
            .collect()
    }

    /// Keys of open documents equal to or beneath `dir`, in tab order.
    pub fn paths_within(&self, dir: &PathKey) -> Vec<PathKey> {
        self.tab_order
            .iter()
            .filter(|key| key.is_same_or_within(dir))
            .cloned()
            .collect()
    }

    /// Find or create a document and load `content` into it.
    ///
    /// A missing path gets a fresh `untitled-<millis>` key. Existing
    /// documents have both saved and current content overwritten and their
    /// dirty flag cleared. New documents are appended to the tab order.
    pub fn upsert(&mut self, path: Option<PathKey>, content: &str) -> &OpenDocument {
        let key = match path {
            Some(path) => path,
            None => self.mint_untitled(),
        };

        let created = match self.documents.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let doc = entry.get_mut();
                doc.saved_content = content.to_string();
                doc.current_content = content.to_string();
                doc.is_dirty = false;
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(OpenDocument::new(key.clone(), content));
                true
            }
        };
        if created {
            debug!("Opened document {} in a new tab", key);
            self.tab_order.push(key.clone());
        }

        &self.documents[&key]
    }

    /// Pull the widget's text into the active document.
    ///
    /// Returns the text, or `None` without an active document or widget.
    /// Must run before anything changes which document is active.
    pub fn persist(
        &mut self,
        active: Option<&PathKey>,
        editor: Option<&dyn EditorWidget>,
    ) -> Option<String> {
        let editor = editor?;
        let doc = self.documents.get_mut(active?)?;
        let text = editor.text();
        doc.current_content = text.clone();
        if doc.refresh_dirty() {
            debug!("{} dirty = {}", doc.path, doc.is_dirty);
        }
        Some(text)
    }

    /// Record a successful save of `path`, re-keying to `new_path` on save-as.
    ///
    /// Returns `false` when `path` is not open.
    pub fn mark_saved(&mut self, path: &PathKey, new_path: &PathKey) -> bool {
        let Some(doc) = self.documents.get_mut(path) else {
            return false;
        };
        doc.saved_content = doc.current_content.clone();
        doc.is_dirty = false;

        if path.as_str() != new_path.as_str() {
            self.rekey(path, new_path);
        }
        true
    }

    /// Move a document to a new key, keeping its tab position.
    ///
    /// A different document already open under `new` is dropped.
    pub fn rekey(&mut self, old: &PathKey, new: &PathKey) -> bool {
        let Some(mut doc) = self.documents.remove(old) else {
            return false;
        };

        if old != new && self.documents.remove(new).is_some() {
            warn!("{} replaces an already open document at {}", old, new);
            self.tab_order.retain(|key| key != new);
        }

        doc.path = new.clone();
        doc.display_name = display_name_for(new);

        match self.tab_index(old) {
            Some(index) => self.tab_order[index] = new.clone(),
            None => self.tab_order.push(new.clone()),
        }
        self.documents.insert(new.clone(), doc);
        debug!("Re-keyed document {} -> {}", old, new);
        true
    }

    /// Remove a document and its tab.
    ///
    /// The fallback is the tab now at the closed tab's index, else the one
    /// before it, else the first remaining tab.
    pub fn close(&mut self, path: &PathKey) -> Option<ClosedDocument> {
        let document = self.documents.remove(path)?;
        let index = self.tab_index(path);
        if let Some(index) = index {
            self.tab_order.remove(index);
        }

        let index = index.unwrap_or(0);
        let fallback = self
            .tab_order
            .get(index)
            .or_else(|| index.checked_sub(1).and_then(|prev| self.tab_order.get(prev)))
            .or_else(|| self.tab_order.first())
            .cloned();

        debug!("Closed document {}, fallback {:?}", path, fallback);
        Some(ClosedDocument { document, fallback })
    }

    /// Mark a document dirty after a widget change.
    ///
    /// Returns `true` only on the clean → dirty transition.
    pub fn mark_dirty_on_edit(&mut self, path: &PathKey) -> bool {
        match self.documents.get_mut(path) {
            Some(doc) if !doc.is_dirty => {
                doc.is_dirty = true;
                true
            }
            _ => false,
        }
    }

    /// Whether the document map and the tab order are in bijection.
    pub fn is_consistent(&self) -> bool {
        if self.tab_order.len() != self.documents.len() {
            return false;
        }
        let mut seen = std::collections::HashSet::new();
        self.tab_order
            .iter()
            .all(|key| seen.insert(key) && self.documents.contains_key(key))
    }

    fn mint_untitled(&self) -> PathKey {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let mut attempt = 0;
        loop {
            let key = PathKey::untitled(stamp, attempt);
            if !self.documents.contains_key(&key) {
                return key;
            }
            attempt += 1;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::MemoryEditor;

    fn key(s: &str) -> PathKey {
        PathKey::parse(s).unwrap()
    }

    fn open(registry: &mut DocumentRegistry, paths: &[&str]) {
        for path in paths {
            registry.upsert(Some(key(path)), "");
        }
    }

    #[test]
    fn test_upsert_creates_and_appends_tab() {
        let mut registry = DocumentRegistry::new();
        let doc = registry.upsert(Some(key("/notes/a.md")), "# A");
        assert_eq!(doc.display_name, "a.md");
        assert_eq!(doc.saved_content, "# A");
        assert!(!doc.is_dirty);
        assert_eq!(registry.tab_order(), &[key("/notes/a.md")]);
    }

    #[test]
    fn test_upsert_existing_overwrites_and_keeps_single_tab() {
        let mut registry = DocumentRegistry::new();
        registry.upsert(Some(key("/notes/a.md")), "old");
        registry.mark_dirty_on_edit(&key("/notes/a.md"));

        let doc = registry.upsert(Some(key("\\NOTES\\a.md")), "new");
        assert_eq!(doc.current_content, "new");
        assert_eq!(doc.saved_content, "new");
        assert!(!doc.is_dirty);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_upsert_without_path_creates_untitled() {
        let mut registry = DocumentRegistry::new();
        let first = registry.upsert(None, "scratch").path.clone();
        let second = registry.upsert(None, "more").path.clone();

        assert_ne!(first, second);
        assert!(first.is_untitled());
        assert_eq!(registry.get(&first).unwrap().display_name, "Untitled");
        assert_eq!(registry.len(), 2);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_persist_pulls_widget_text() {
        let mut registry = DocumentRegistry::new();
        let editor = MemoryEditor::new();
        let path = key("/notes/a.md");
        registry.upsert(Some(path.clone()), "saved");

        editor.type_text("edited");
        let text = registry.persist(Some(&path), Some(&editor));
        assert_eq!(text.as_deref(), Some("edited"));
        assert!(registry.get(&path).unwrap().is_dirty);

        editor.type_text("saved");
        registry.persist(Some(&path), Some(&editor));
        assert!(!registry.get(&path).unwrap().is_dirty);
    }

    #[test]
    fn test_persist_without_widget_or_document() {
        let mut registry = DocumentRegistry::new();
        let editor = MemoryEditor::new();
        registry.upsert(Some(key("/a.md")), "x");
        assert!(registry.persist(Some(&key("/a.md")), None).is_none());
        assert!(registry.persist(None, Some(&editor)).is_none());
        assert!(registry.persist(Some(&key("/b.md")), Some(&editor)).is_none());
    }

    #[test]
    fn test_persist_then_upsert_same_path_keeps_edits() {
        let mut registry = DocumentRegistry::new();
        let editor = MemoryEditor::new();
        let path = key("/notes/a.md");
        registry.upsert(Some(path.clone()), "v1");

        editor.type_text("v1 with edits");
        let persisted = registry.persist(Some(&path), Some(&editor)).unwrap();
        let doc = registry.upsert(Some(path.clone()), &persisted);
        assert_eq!(doc.current_content, persisted);
    }

    #[test]
    fn test_mark_dirty_on_edit_only_transitions_once() {
        let mut registry = DocumentRegistry::new();
        let path = key("/a.md");
        registry.upsert(Some(path.clone()), "");
        assert!(registry.mark_dirty_on_edit(&path));
        assert!(!registry.mark_dirty_on_edit(&path));
        assert!(!registry.mark_dirty_on_edit(&key("/missing.md")));
        assert_eq!(registry.dirty_paths(), vec![path]);
    }

    #[test]
    fn test_close_fallback_prefers_same_index() {
        let mut registry = DocumentRegistry::new();
        open(&mut registry, &["/x.md", "/y.md", "/z.md"]);

        let closed = registry.close(&key("/y.md")).unwrap();
        assert_eq!(closed.fallback, Some(key("/z.md")));

        let closed = registry.close(&key("/z.md")).unwrap();
        assert_eq!(closed.fallback, Some(key("/x.md")));

        let closed = registry.close(&key("/x.md")).unwrap();
        assert!(closed.fallback.is_none());
        assert!(registry.is_empty());
        assert!(registry.close(&key("/x.md")).is_none());
    }

    #[test]
    fn test_save_as_rekeys_untitled_in_place() {
        let mut registry = DocumentRegistry::new();
        open(&mut registry, &["/first.md"]);
        let untitled = registry.upsert(None, "").path.clone();
        open(&mut registry, &["/last.md"]);

        let editor = MemoryEditor::new();
        editor.type_text("draft");
        registry.persist(Some(&untitled), Some(&editor));

        let target = key("/notes/new.md");
        assert!(registry.mark_saved(&untitled, &target));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.tab_order()[1], target);
        assert!(!registry.contains(&untitled));
        let doc = registry.get(&target).unwrap();
        assert!(!doc.is_dirty);
        assert_eq!(doc.display_name, "new.md");
        assert_eq!(doc.saved_content, "draft");
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_save_as_onto_open_document_replaces_it() {
        let mut registry = DocumentRegistry::new();
        open(&mut registry, &["/a.md", "/b.md", "/c.md"]);

        registry.mark_saved(&key("/c.md"), &key("/a.md"));
        assert_eq!(registry.tab_order(), &[key("/b.md"), key("/a.md")]);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_bijection_holds_over_mixed_operations() {
        let mut registry = DocumentRegistry::new();
        let paths = ["/a.md", "/b.md", "/A.md", "/c.md", "/b.md", "\\c.md"];
        for (i, path) in paths.iter().enumerate() {
            registry.upsert(Some(key(path)), &i.to_string());
            if i % 2 == 1 {
                registry.upsert(None, "");
            }
            assert!(registry.is_consistent());
        }
        assert_eq!(registry.len(), 6);

        let order: Vec<PathKey> = registry.tab_order().to_vec();
        for path in order.iter().step_by(2) {
            registry.close(path);
            assert!(registry.is_consistent());
        }
        registry.rekey(&key("/b.md"), &key("/renamed.md"));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_paths_within_directory() {
        let mut registry = DocumentRegistry::new();
        open(&mut registry, &["/A/x.md", "/A/sub/y.md", "/AB/z.md"]);
        assert_eq!(
            registry.paths_within(&key("/a")),
            vec![key("/A/x.md"), key("/A/sub/y.md")]
        );
    }

    #[test]
    fn test_title_marks_dirty() {
        let mut registry = DocumentRegistry::new();
        registry.upsert(Some(key("/notes/todo.md")), "");
        registry.mark_dirty_on_edit(&key("/notes/todo.md"));
        assert_eq!(registry.get(&key("/notes/todo.md")).unwrap().title(), "todo.md *");
    }
}
