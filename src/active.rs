//! Active-document controller.
//!
//! The single authority for what the editing widget currently shows and
//! whether the backend has been told about it. Switching documents always
//! persists the outgoing widget text into the registry before the incoming
//! text is pushed, and that push happens with change notifications
//! suppressed so loading content never marks a document dirty.

use crate::backend::Backend;
use crate::documents::DocumentRegistry;
use crate::editor::{ChangeSignal, EditorWidget};
use crate::error::{Error, Result};
use crate::path_key::PathKey;
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Builds the editing widget on first use.
pub type EditorFactory = Box<dyn FnMut() -> Option<Box<dyn EditorWidget>>>;

// ─────────────────────────────────────────────────────────────────────────────
// Pointers
// ─────────────────────────────────────────────────────────────────────────────

/// What the user is looking at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivePointers {
    /// Document shown in the editor (may be an untitled placeholder)
    pub active_file: Option<PathKey>,
    /// Backing file of the active document; `None` for scratch buffers
    pub current_file: Option<PathKey>,
    /// Folder being browsed
    pub current_folder: Option<PathKey>,
}

impl ActivePointers {
    fn point_at(&mut self, path: &PathKey) {
        self.active_file = Some(path.clone());
        if path.is_untitled() {
            self.current_file = None;
        } else {
            self.current_file = Some(path.clone());
            if let Some(parent) = path.parent() {
                self.current_folder = Some(parent);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Active Sync
// ─────────────────────────────────────────────────────────────────────────────

/// Token bookkeeping for "set active file" notifications.
#[derive(Debug, Default)]
struct SyncState {
    issued: Cell<u64>,
    acknowledged: Cell<u64>,
    synced_path: RefCell<Option<PathKey>>,
}

/// A pending "set active file" notification.
///
/// Delivery is best effort: a failure is logged and never rolls back local
/// state. A notice that a newer one has superseded is not sent, and a
/// completion older than one already acknowledged is dropped.
#[derive(Debug)]
#[must_use = "an active-file notice does nothing until delivered"]
pub struct ActiveFileNotice {
    token: u64,
    path: Option<PathKey>,
    sync: Rc<SyncState>,
}

impl ActiveFileNotice {
    pub fn token(&self) -> u64 {
        self.token
    }

    /// File the backend will be told about (`None` for a scratch buffer).
    pub fn path(&self) -> Option<&PathKey> {
        self.path.as_ref()
    }

    /// Send the notification. Returns whether it became the acknowledged
    /// state.
    pub async fn deliver(self, backend: &dyn Backend) -> bool {
        if self.token < self.sync.issued.get() {
            debug!("Skipping superseded active-file notice #{}", self.token);
            return false;
        }
        if let Err(e) = backend.set_active_file(self.path.as_ref()).await {
            warn!("Failed to notify backend of active file: {}", e);
            return false;
        }
        if self.token <= self.sync.acknowledged.get() {
            debug!("Discarding stale active-file completion #{}", self.token);
            return false;
        }
        self.sync.acknowledged.set(self.token);
        *self.sync.synced_path.borrow_mut() = self.path;
        true
    }
}

/// Outcome of a switch: what to reveal in the tree and what to tell the
/// backend.
#[derive(Debug)]
pub struct Activation {
    pub notice: ActiveFileNotice,
    /// File whose ancestors should be loaded and expanded
    pub reveal: Option<PathKey>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the editing widget and the active pointers.
pub struct ActiveDocumentController {
    editor: Option<Box<dyn EditorWidget>>,
    factory: Option<EditorFactory>,
    signal: Rc<ChangeSignal>,
    pointers: ActivePointers,
    sync: Rc<SyncState>,
    welcome_markdown: String,
}

impl ActiveDocumentController {
    /// Create a controller whose widget is built on first use.
    pub fn new(factory: Option<EditorFactory>, welcome_markdown: impl Into<String>) -> Self {
        Self {
            editor: None,
            factory,
            signal: Rc::new(ChangeSignal::new()),
            pointers: ActivePointers::default(),
            sync: Rc::new(SyncState::default()),
            welcome_markdown: welcome_markdown.into(),
        }
    }

    /// Create a controller around an already constructed widget.
    pub fn with_editor(editor: Box<dyn EditorWidget>, welcome_markdown: impl Into<String>) -> Self {
        let mut controller = Self::new(None, welcome_markdown);
        controller.attach(editor);
        controller
    }

    fn attach(&mut self, mut editor: Box<dyn EditorWidget>) {
        let signal = Rc::clone(&self.signal);
        editor.on_change(Box::new(move || signal.notify()));
        self.editor = Some(editor);
    }

    pub fn pointers(&self) -> &ActivePointers {
        &self.pointers
    }

    pub fn pointers_mut(&mut self) -> &mut ActivePointers {
        &mut self.pointers
    }

    pub fn active_file(&self) -> Option<&PathKey> {
        self.pointers.active_file.as_ref()
    }

    pub fn set_current_folder(&mut self, folder: Option<PathKey>) {
        self.pointers.current_folder = folder;
    }

    pub fn has_editor(&self) -> bool {
        self.editor.is_some()
    }

    /// Text currently in the widget.
    pub fn editor_text(&self) -> Option<String> {
        self.editor.as_ref().map(|editor| editor.text())
    }

    /// Build the widget if it does not exist yet. Returns whether a widget is
    /// available.
    pub fn ensure_editor_ready(&mut self) -> bool {
        if self.editor.is_some() {
            return true;
        }
        let Some(factory) = self.factory.as_mut() else {
            return false;
        };
        match factory() {
            Some(editor) => {
                debug!("Editor widget constructed");
                self.attach(editor);
                true
            }
            None => {
                warn!("Editor widget could not be constructed");
                false
            }
        }
    }

    /// Like [`Self::ensure_editor_ready`], for callers that report the
    /// missing widget as an error.
    pub fn require_editor(&mut self) -> Result<()> {
        if self.ensure_editor_ready() {
            Ok(())
        } else {
            Err(Error::EditorUnavailable)
        }
    }

    /// Pull the widget's text into the active document.
    pub fn persist(&self, docs: &mut DocumentRegistry) -> Option<String> {
        docs.persist(self.pointers.active_file.as_ref(), self.editor.as_deref())
    }

    /// Make `path` the active document, creating an empty one if needed.
    ///
    /// `None` clears the pointers and shows the welcome text.
    pub fn set_active(&mut self, docs: &mut DocumentRegistry, path: Option<PathKey>) -> Activation {
        self.persist(docs);
        match path {
            Some(path) => self.activate(docs, path),
            None => self.deactivate(),
        }
    }

    /// Load freshly read content and make it active.
    ///
    /// The outgoing document is persisted before `content` is stored, so
    /// re-opening the active file replaces the widget text with the new
    /// content instead of the stale buffer.
    pub fn open_document(
        &mut self,
        docs: &mut DocumentRegistry,
        path: Option<PathKey>,
        content: &str,
    ) -> Activation {
        self.persist(docs);
        let key = docs.upsert(path, content).path.clone();
        self.activate(docs, key)
    }

    /// Re-point at `path` without touching the widget (after a save).
    pub fn point_to(&mut self, path: &PathKey) -> Activation {
        self.pointers.point_at(path);
        Activation {
            notice: self.issue_notice(),
            reveal: self.pointers.current_file.clone(),
        }
    }

    /// Drain widget change notifications into the active document's dirty
    /// flag. Returns whether a tab title changed.
    pub fn pump_editor_changes(&mut self, docs: &mut DocumentRegistry) -> bool {
        if !self.signal.take() {
            return false;
        }
        match &self.pointers.active_file {
            Some(active) => docs.mark_dirty_on_edit(active),
            None => false,
        }
    }

    /// Issue a fresh notice for the current file.
    pub fn issue_notice(&self) -> ActiveFileNotice {
        let token = self.sync.issued.get() + 1;
        self.sync.issued.set(token);
        ActiveFileNotice {
            token,
            path: self.pointers.current_file.clone(),
            sync: Rc::clone(&self.sync),
        }
    }

    /// Whether the newest notice has been acknowledged.
    pub fn is_backend_synced(&self) -> bool {
        self.sync.issued.get() == self.sync.acknowledged.get()
    }

    /// Path the backend last acknowledged as active.
    pub fn synced_path(&self) -> Option<PathKey> {
        self.sync.synced_path.borrow().clone()
    }

    /// Make sure the backend knows the current file, retrying a notice that
    /// failed or is still outstanding. Called before saving.
    pub async fn ensure_backend_synced(&self, backend: &dyn Backend) -> bool {
        if self.is_backend_synced() {
            return true;
        }
        self.issue_notice().deliver(backend).await
    }

    fn activate(&mut self, docs: &mut DocumentRegistry, path: PathKey) -> Activation {
        if !docs.contains(&path) {
            docs.upsert(Some(path.clone()), "");
        }
        let content = docs
            .get(&path)
            .map(|doc| doc.current_content.clone())
            .unwrap_or_default();

        self.load_into_editor(&content);
        self.pointers.point_at(&path);
        debug!("Active document is now {}", path);

        Activation {
            notice: self.issue_notice(),
            reveal: self.pointers.current_file.clone(),
        }
    }

    fn deactivate(&mut self) -> Activation {
        self.pointers.active_file = None;
        self.pointers.current_file = None;
        if self.editor.is_some() {
            let welcome = self.welcome_markdown.clone();
            self.load_into_editor(&welcome);
        }
        debug!("No active document");
        Activation {
            notice: self.issue_notice(),
            reveal: None,
        }
    }

    fn load_into_editor(&mut self, content: &str) {
        if !self.ensure_editor_ready() {
            warn!("No editor widget; skipping content load");
            return;
        }
        if let Some(editor) = self.editor.as_mut() {
            let _quiet = self.signal.suppress();
            editor.set_text(content);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
