//! Application state management for notedeck
//!
//! `AppState` ties the document registry, the folder tree and the active
//! document controller to a backend. It is the single entry point for
//! backend events and user gestures, and it turns every backend outcome into
//! status line feedback instead of propagating errors.

use crate::active::{Activation, ActiveDocumentController, ActivePointers, EditorFactory};
use crate::backend::{Backend, DirectoryEntry};
use crate::config::{save_config_silent, Settings};
use crate::documents::{DocumentRegistry, OpenDocument};
use crate::editor::EditorWidget;
use crate::error::{Error, Result};
use crate::path_key::PathKey;
use crate::rename::RenameReconciler;
use crate::workspaces::{
    filter_events, load_session, save_session, DirectoryTreeCache, SessionState, WorkspaceEvent,
    WorkspaceWatcher,
};
use log::{debug, error, info, warn};
use std::rc::Rc;

/// Recent files remembered per folder session.
const MAX_SESSION_RECENT: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Which part of the UI a theme change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeTarget {
    Toolbar,
    Editor,
    Preview,
}

/// Events arriving from the backend.
///
/// Paths are carried as the raw strings the backend sent; they are parsed
/// into `PathKey`s on arrival.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// A file was picked (e.g. from a menu) and should be loaded and opened
    OpenFileRequested(String),
    /// A file was read externally; an empty path opens a scratch buffer
    FileOpened { path: String, content: String },
    /// A folder was picked, with the snapshot of its top level
    FolderOpened { path: String, snapshot: DirectoryEntry },
    /// The user asked to save (`force` shows the save-as dialog)
    SaveRequested { force: bool },
    /// The backend saved the active document on its own
    FileSaved(String),
    /// Theme changes are applied by the UI shell
    ThemeChanged { target: ThemeTarget, name: String },
}

/// Action waiting for the user to confirm discarding unsaved changes.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    /// Close one dirty tab
    CloseTab(PathKey),
    /// Close every tab although some are dirty
    CloseAllTabs,
}

// ─────────────────────────────────────────────────────────────────────────────
// Status Line
// ─────────────────────────────────────────────────────────────────────────────

/// Tone of the text currently on the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusKind {
    #[default]
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
struct Flash {
    message: String,
    kind: StatusKind,
    expires_at: f64,
}

/// Base text derived from the active pointers, optionally covered by a
/// transient flash message.
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    base: String,
    flash: Option<Flash>,
}

impl StatusLine {
    /// Text to display right now.
    pub fn text(&self) -> &str {
        self.flash
            .as_ref()
            .map_or(self.base.as_str(), |flash| flash.message.as_str())
    }

    pub fn kind(&self) -> StatusKind {
        self.flash.as_ref().map_or(StatusKind::Info, |flash| flash.kind)
    }

    /// Text shown once any flash has expired.
    pub fn base_text(&self) -> &str {
        &self.base
    }

    pub fn is_flashing(&self) -> bool {
        self.flash.is_some()
    }

    fn set_base(&mut self, text: String) {
        self.base = text;
    }

    fn show(&mut self, message: String, kind: StatusKind, expires_at: f64) {
        self.flash = Some(Flash {
            message,
            kind,
            expires_at,
        });
    }

    fn clear_flash(&mut self) {
        self.flash = None;
    }

    /// Drop the flash if it has expired. Returns whether it did.
    fn expire(&mut self, now: f64) -> bool {
        match &self.flash {
            Some(flash) if now >= flash.expires_at => {
                self.flash = None;
                true
            }
            _ => false,
        }
    }
}

fn base_text(pointers: &ActivePointers) -> String {
    if let Some(file) = &pointers.current_file {
        format!("Editing: {}", file)
    } else if let Some(folder) = &pointers.current_folder {
        format!("Browsing: {}", folder)
    } else {
        "No document loaded".to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tree Items
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    fn of(is_dir: bool) -> Self {
        if is_dir {
            Self::Folder
        } else {
            Self::File
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Folder => "Folder",
        }
    }
}

/// Check a name typed for a new or renamed tree item.
fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidName("Name cannot be empty".to_string()));
    }
    if trimmed.contains(['/', '\\']) {
        return Err(Error::InvalidName(
            "Name cannot contain path separators".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Application State
// ─────────────────────────────────────────────────────────────────────────────

/// Central application state.
///
/// All mutation happens on one logical thread; backend calls are awaited
/// in place and local state only changes after the backend confirmed the
/// operation, with the exception of the active document which switches
/// immediately.
pub struct AppState {
    backend: Rc<dyn Backend>,
    docs: DocumentRegistry,
    tree: DirectoryTreeCache,
    active: ActiveDocumentController,
    settings: Settings,
    settings_dirty: bool,
    status: StatusLine,
    /// Clock value from the last `tick`, in seconds
    now: f64,
    pending_action: Option<PendingAction>,
    confirm_message: Option<String>,
    watcher: Option<WorkspaceWatcher>,
    watch_folders: bool,
    /// Files opened within the current folder, newest first
    session_recent: Vec<PathKey>,
}

impl AppState {
    /// Create the state with an editing widget built on first use.
    pub fn new(backend: Rc<dyn Backend>, factory: Option<EditorFactory>, settings: Settings) -> Self {
        let active = ActiveDocumentController::new(factory, settings.welcome_markdown.clone());
        Self::build(backend, active, settings)
    }

    /// Create the state around an existing editing widget.
    pub fn with_editor(
        backend: Rc<dyn Backend>,
        editor: Box<dyn EditorWidget>,
        settings: Settings,
    ) -> Self {
        let active =
            ActiveDocumentController::with_editor(editor, settings.welcome_markdown.clone());
        Self::build(backend, active, settings)
    }

    fn build(backend: Rc<dyn Backend>, active: ActiveDocumentController, settings: Settings) -> Self {
        let mut state = Self {
            backend,
            docs: DocumentRegistry::new(),
            tree: DirectoryTreeCache::new(),
            active,
            settings,
            settings_dirty: false,
            status: StatusLine::default(),
            now: 0.0,
            pending_action: None,
            confirm_message: None,
            watcher: None,
            watch_folders: false,
            session_recent: Vec::new(),
        };
        state.refresh_status();
        state
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn documents(&self) -> &DocumentRegistry {
        &self.docs
    }

    pub fn tree(&self) -> &DirectoryTreeCache {
        &self.tree
    }

    pub fn pointers(&self) -> &ActivePointers {
        self.active.pointers()
    }

    pub fn active_document(&self) -> Option<&OpenDocument> {
        self.active.active_file().and_then(|path| self.docs.get(path))
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn status_text(&self) -> &str {
        self.status.text()
    }

    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.pending_action.as_ref()
    }

    /// Question to show while an action awaits confirmation.
    pub fn confirm_message(&self) -> Option<&str> {
        self.confirm_message.as_deref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.docs.has_unsaved_changes()
    }

    /// Tab labels in tab order, dirty ones marked.
    pub fn tab_titles(&self) -> Vec<String> {
        self.docs.iter().map(OpenDocument::title).collect()
    }

    /// Whether the backend has acknowledged the current file.
    pub fn is_backend_synced(&self) -> bool {
        self.active.is_backend_synced()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Status
    // ─────────────────────────────────────────────────────────────────────────

    /// Advance the clock and expire a finished flash message.
    pub fn tick(&mut self, now: f64) {
        self.now = now;
        if self.status.expire(now) {
            debug!("Status flash expired");
        }
    }

    fn flash(&mut self, message: impl Into<String>, kind: StatusKind) {
        let expires_at = self.now + self.settings.status_flash_secs;
        self.status.show(message.into(), kind, expires_at);
    }

    fn refresh_status(&mut self) {
        self.status.set_base(base_text(self.active.pointers()));
    }

    /// Refresh the status line, reveal the new file in the tree and tell the
    /// backend about it.
    async fn finish_activation(&mut self, activation: Activation) {
        let Activation { notice, reveal } = activation;
        self.refresh_status();
        if let Some(target) = reveal {
            self.tree
                .ensure_ancestors_loaded(self.backend.as_ref(), &target)
                .await;
        }
        notice.deliver(self.backend.as_ref()).await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Backend Events
    // ─────────────────────────────────────────────────────────────────────────

    /// React to an event from the backend.
    pub async fn handle_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::OpenFileRequested(raw) => match PathKey::parse(&raw) {
                Some(path) => self.load_and_open(&path, "Open failed").await,
                None => warn!("Ignoring open request without a path"),
            },
            BackendEvent::FileOpened { path, content } => {
                self.handle_file_opened(PathKey::parse(&path), &content)
                    .await
            }
            BackendEvent::FolderOpened { path, snapshot } => {
                self.handle_folder_opened(&path, &snapshot).await
            }
            BackendEvent::SaveRequested { force } => {
                self.save(force).await;
            }
            BackendEvent::FileSaved(raw) => self.handle_file_saved(&raw).await,
            BackendEvent::ThemeChanged { target, name } => {
                debug!("Theme change for {:?} to '{}' left to the UI", target, name);
            }
        }
    }

    async fn load_and_open(&mut self, path: &PathKey, failure: &str) {
        match self.backend.load_document(path).await {
            Ok(content) => {
                self.handle_file_opened(Some(path.clone()), &content)
                    .await
            }
            Err(e) => {
                error!("Failed to open {}: {}", path, e);
                self.flash(failure, StatusKind::Error);
            }
        }
    }

    async fn handle_file_opened(&mut self, path: Option<PathKey>, content: &str) {
        if let Err(e) = self.active.require_editor() {
            warn!("Ignoring opened file: {}", e);
            return;
        }

        let activation = self.active.open_document(&mut self.docs, path, content);
        let current = self.active.pointers().current_file.clone();
        let label = match current {
            Some(file) => {
                self.remember_file(&file);
                file.to_string()
            }
            None => "Untitled".to_string(),
        };
        info!("Opened {}", label);
        self.finish_activation(activation).await;
        self.flash(format!("Opened: {}", label), StatusKind::Success);
    }

    async fn handle_folder_opened(&mut self, raw: &str, snapshot: &DirectoryEntry) {
        let Some(root) = PathKey::parse(raw).or_else(|| PathKey::parse(&snapshot.path)) else {
            warn!("Received folder snapshot without a path");
            return;
        };

        self.persist_session();
        self.active.persist(&mut self.docs);
        if !self.tree.install(snapshot) {
            self.flash("Open failed", StatusKind::Error);
            return;
        }

        self.active.set_current_folder(Some(root.clone()));
        let activation = self.active.set_active(&mut self.docs, None);
        self.finish_activation(activation).await;

        self.session_recent.clear();
        self.update_settings(|s| s.add_recent_folder(root.clone()));
        self.start_watching(&root);

        info!("Opened folder {}", root);
        self.flash(format!("Opened folder: {}", root), StatusKind::Success);
    }

    async fn handle_file_saved(&mut self, raw: &str) {
        let Some(saved) = PathKey::parse(raw) else {
            warn!("Save notification without a path");
            return;
        };
        let previous = self.active.active_file().cloned();
        let markdown = self
            .active
            .persist(&mut self.docs)
            .or_else(|| self.active.editor_text())
            .unwrap_or_default();
        self.apply_saved(previous, saved, &markdown).await;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Saving
    // ─────────────────────────────────────────────────────────────────────────

    /// Save the active document, through the save-as dialog when `force_dialog`
    /// is set or the document has no backing file.
    ///
    /// Returns `true` if the document was written.
    pub async fn save(&mut self, force_dialog: bool) -> bool {
        if let Err(e) = self.active.require_editor() {
            warn!("Save skipped: {}", e);
            return false;
        }

        let previous = self.active.active_file().cloned();
        let markdown = self
            .active
            .persist(&mut self.docs)
            .or_else(|| self.active.editor_text())
            .unwrap_or_default();
        // The backend saves to whatever it believes is active.
        if !self
            .active
            .ensure_backend_synced(self.backend.as_ref())
            .await
        {
            error!("Save aborted: backend does not know the active file");
            self.flash("Save failed", StatusKind::Error);
            return false;
        }

        match self.backend.save_document(&markdown, force_dialog).await {
            Ok(saved) => {
                self.apply_saved(previous, saved, &markdown).await;
                true
            }
            Err(e) if e.is_cancelled() => {
                debug!("Save cancelled");
                self.status.clear_flash();
                self.refresh_status();
                false
            }
            Err(e) => {
                error!("Save failed: {}", e);
                self.flash("Save failed", StatusKind::Error);
                false
            }
        }
    }

    async fn apply_saved(&mut self, previous: Option<PathKey>, saved: PathKey, markdown: &str) {
        let known = previous
            .as_ref()
            .is_some_and(|prev| self.docs.mark_saved(prev, &saved));
        if !known && !self.docs.mark_saved(&saved, &saved) {
            self.docs.upsert(Some(saved.clone()), markdown);
        }

        let activation = self.active.point_to(&saved);
        self.remember_file(&saved);
        self.finish_activation(activation).await;

        info!("Saved {}", saved);
        self.flash(format!("Saved: {}", saved), StatusKind::Success);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tab Gestures
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a file from the tree. An already open file is switched to
    /// without reloading it.
    pub async fn open_file(&mut self, path: &PathKey) {
        if self.docs.contains(path) {
            self.switch_to(path).await;
            return;
        }
        self.load_and_open(path, "Failed to open file").await;
    }

    /// Make an open document the active one.
    pub async fn switch_to(&mut self, path: &PathKey) -> bool {
        if self.active.active_file() == Some(path) {
            return true;
        }
        if !self.docs.contains(path) {
            warn!("Cannot switch to {}: not open", path);
            return false;
        }
        let activation = self.active.set_active(&mut self.docs, Some(path.clone()));
        self.finish_activation(activation).await;
        true
    }

    /// Close a tab, discarding unsaved changes.
    ///
    /// Closing the active tab activates the tab that takes its place.
    pub async fn close_tab(&mut self, path: &PathKey) -> bool {
        let was_active = self.active.active_file() == Some(path);
        let Some(closed) = self.docs.close(path) else {
            return false;
        };

        if was_active {
            let activation = self.active.set_active(&mut self.docs, closed.fallback);
            self.finish_activation(activation).await;
        }

        info!("Closed {}", path);
        self.flash(
            format!("Closed: {}", closed.document.display_name),
            StatusKind::Info,
        );
        true
    }

    /// Close a tab, asking for confirmation first if it has unsaved changes.
    ///
    /// Returns `true` if the tab was closed immediately.
    pub async fn request_close_tab(&mut self, path: &PathKey) -> bool {
        self.active.persist(&mut self.docs);
        let Some(doc) = self.docs.get(path) else {
            return false;
        };
        if doc.is_dirty {
            self.confirm_message = Some(format!(
                "'{}' has unsaved changes. Close anyway?",
                doc.display_name
            ));
            self.pending_action = Some(PendingAction::CloseTab(path.clone()));
            return false;
        }
        self.close_tab(path).await
    }

    /// Close every tab, asking for confirmation first if any is dirty.
    pub async fn request_close_all_tabs(&mut self) -> bool {
        self.active.persist(&mut self.docs);
        let dirty = self.docs.dirty_paths().len();
        if dirty > 0 {
            self.confirm_message = Some(format!(
                "{} tab(s) have unsaved changes. Close all anyway?",
                dirty
            ));
            self.pending_action = Some(PendingAction::CloseAllTabs);
            return false;
        }
        self.close_all_tabs().await;
        true
    }

    /// Run the action the user just confirmed.
    pub async fn confirm_pending_action(&mut self) {
        self.confirm_message = None;
        let Some(action) = self.pending_action.take() else {
            return;
        };
        match action {
            PendingAction::CloseTab(path) => {
                self.close_tab(&path).await;
            }
            PendingAction::CloseAllTabs => {
                self.close_all_tabs().await;
            }
        }
    }

    /// Drop the pending action.
    pub fn cancel_pending_action(&mut self) {
        if let Some(action) = self.pending_action.take() {
            debug!("Cancelled {:?}", action);
        }
        self.confirm_message = None;
    }

    /// Close every tab except `keep`. Returns the number closed.
    pub async fn close_other_tabs(&mut self, keep: &PathKey) -> usize {
        if !self.docs.contains(keep) {
            return 0;
        }
        let others: Vec<PathKey> = self
            .docs
            .tab_order()
            .iter()
            .filter(|path| *path != keep)
            .cloned()
            .collect();
        let closed = self.close_paths(&others, Some(keep.clone())).await;
        self.flash(format!("Closed {} other tab(s)", closed), StatusKind::Info);
        closed
    }

    /// Close every tab after `anchor` in tab order.
    pub async fn close_tabs_to_right(&mut self, anchor: &PathKey) -> usize {
        let Some(index) = self.docs.tab_index(anchor) else {
            return 0;
        };
        let right: Vec<PathKey> = self.docs.tab_order()[index + 1..].to_vec();
        let closed = self.close_paths(&right, Some(anchor.clone())).await;
        self.flash(
            format!("Closed {} tab(s) to the right", closed),
            StatusKind::Info,
        );
        closed
    }

    /// Close every tab.
    pub async fn close_all_tabs(&mut self) -> usize {
        let all = self.docs.tab_order().to_vec();
        let closed = self.close_paths(&all, None).await;
        self.flash(format!("Closed all tabs ({})", closed), StatusKind::Info);
        closed
    }

    /// Close `paths`; if the active document was among them, activate
    /// `fallback` once at the end.
    async fn close_paths(&mut self, paths: &[PathKey], fallback: Option<PathKey>) -> usize {
        let active = self.active.active_file().cloned();
        let closed = paths
            .iter()
            .filter(|path| self.docs.close(path).is_some())
            .count();

        if active.is_some_and(|path| !self.docs.contains(&path)) {
            let activation = self.active.set_active(&mut self.docs, fallback);
            self.finish_activation(activation).await;
        }
        debug!("Closed {} tab(s)", closed);
        closed
    }

    /// Mark the active document dirty after the user typed.
    ///
    /// Returns whether a tab title changed.
    pub fn pump_editor_changes(&mut self) -> bool {
        self.active.pump_editor_changes(&mut self.docs)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tree Gestures
    // ─────────────────────────────────────────────────────────────────────────

    /// Expand or collapse a folder in the tree.
    pub async fn toggle_folder(&mut self, path: &PathKey) -> bool {
        self.tree.toggle_expand(self.backend.as_ref(), path).await
    }

    /// Re-list every expanded folder.
    pub async fn refresh_tree(&mut self) -> bool {
        if self.tree.root().is_none() {
            self.flash("No folder opened", StatusKind::Info);
            return false;
        }
        self.tree.refresh(self.backend.as_ref()).await;
        self.flash("Refresh completed", StatusKind::Success);
        true
    }

    /// Create an empty file named `name` in `folder` (the root if `None`).
    pub async fn create_file_in(&mut self, folder: Option<&PathKey>, name: &str) -> bool {
        self.create_item(ItemKind::File, folder, name).await
    }

    /// Create a folder named `name` in `folder` (the root if `None`).
    pub async fn create_folder_in(&mut self, folder: Option<&PathKey>, name: &str) -> bool {
        self.create_item(ItemKind::Folder, folder, name).await
    }

    async fn create_item(&mut self, kind: ItemKind, folder: Option<&PathKey>, name: &str) -> bool {
        let name = match validate_name(name) {
            Ok(name) => name,
            Err(e) => {
                warn!("Rejected name '{}': {}", name, e);
                self.flash(e.to_string(), StatusKind::Error);
                return false;
            }
        };
        let Some(folder) = folder.or(self.tree.root()).cloned() else {
            self.flash("No folder opened", StatusKind::Info);
            return false;
        };

        let target = folder.join(&name);
        let result = match kind {
            ItemKind::File => self.backend.create_file(&target).await,
            ItemKind::Folder => self.backend.create_directory(&target).await,
        };

        match result {
            Ok(true) => {
                info!("Created {}", target);
                self.tree.expand(&folder);
                self.tree.refresh(self.backend.as_ref()).await;
                let message = if self.tree.root() == Some(&folder) {
                    format!("{} created successfully", kind.label())
                } else {
                    format!(
                        "{} created successfully in \"{}\"",
                        kind.label(),
                        folder.file_name()
                    )
                };
                self.flash(message, StatusKind::Success);
                true
            }
            Ok(false) => {
                warn!("Backend refused to create {}", target);
                self.flash(format!("{} creation failed", kind.label()), StatusKind::Error);
                false
            }
            Err(e) => {
                error!("Failed to create {}: {}", target, e);
                self.flash(format!("{} creation failed", kind.label()), StatusKind::Error);
                false
            }
        }
    }

    /// Rename a tree item in place, then rewrite every open reference to it.
    pub async fn rename_item(&mut self, target: &PathKey, new_name: &str) -> bool {
        let is_dir = self.tree.node(target).is_some_and(|node| node.is_dir);
        let kind = ItemKind::of(is_dir);
        let name = match validate_name(new_name) {
            Ok(name) => name,
            Err(e) => {
                warn!("Rejected name '{}': {}", new_name, e);
                self.flash(e.to_string(), StatusKind::Error);
                return false;
            }
        };
        if name == target.file_name() {
            return false;
        }

        let new_path = target.with_file_name(&name);
        match self.backend.rename_file(target, &new_path).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Backend refused to rename {}", target);
                self.flash(format!("{} renamed failed", kind.label()), StatusKind::Error);
                return false;
            }
            Err(e) => {
                error!("Failed to rename {}: {}", target, e);
                self.flash(format!("{} renamed failed", kind.label()), StatusKind::Error);
                return false;
            }
        }

        let outcome = RenameReconciler::apply(
            &mut self.docs,
            &mut self.tree,
            self.active.pointers_mut(),
            target,
            &new_path,
            is_dir,
        );
        self.update_settings(|s| s.rename_paths(target, &new_path));
        for path in &mut self.session_recent {
            if let Some(moved) = path.rebase(target, &new_path) {
                *path = moved;
            }
        }
        self.tree.refresh(self.backend.as_ref()).await;

        if outcome.active_updated {
            self.active
                .issue_notice()
                .deliver(self.backend.as_ref())
                .await;
        }
        self.refresh_status();
        info!("Renamed {} -> {}", target, new_path);
        self.flash(format!("{} renamed successfully", kind.label()), StatusKind::Success);
        true
    }

    /// Delete a tree item. Documents open from it stay open.
    pub async fn delete_item(&mut self, target: &PathKey) -> bool {
        let is_dir = self.tree.node(target).is_some_and(|node| node.is_dir);
        let kind = ItemKind::of(is_dir);

        match self.backend.delete_file(target).await {
            Ok(true) => {
                info!("Deleted {}", target);
                self.tree.refresh(self.backend.as_ref()).await;
                self.flash(format!("{} deleted successfully", kind.label()), StatusKind::Success);
                true
            }
            Ok(false) => {
                warn!("Backend refused to delete {}", target);
                self.flash(format!("{} deleted failed", kind.label()), StatusKind::Error);
                false
            }
            Err(e) => {
                error!("Failed to delete {}: {}", target, e);
                self.flash(format!("{} deleted failed", kind.label()), StatusKind::Error);
                false
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session State
    // ─────────────────────────────────────────────────────────────────────────

    /// Snapshot of the current folder session, if a folder is open.
    pub fn capture_session(&self) -> Option<SessionState> {
        self.tree.root()?;
        Some(SessionState {
            open_tabs: self
                .docs
                .tab_order()
                .iter()
                .filter(|path| !path.is_untitled())
                .cloned()
                .collect(),
            active_file: self.active.pointers().current_file.clone(),
            expanded_paths: self.tree.expanded_paths(),
            recent_files: self.session_recent.clone(),
        })
    }

    /// Write the session file for the open folder. Returns `true` on success.
    pub fn persist_session(&self) -> bool {
        let (Some(root), Some(state)) = (self.tree.root(), self.capture_session()) else {
            return false;
        };
        match save_session(root.as_path(), &state) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save session for {}: {}", root, e);
                false
            }
        }
    }

    /// Reopen the tabs and expansion saved for the open folder.
    ///
    /// Tabs whose files can no longer be read are skipped.
    pub async fn restore_session(&mut self) -> bool {
        let Some(root) = self.tree.root().cloned() else {
            return false;
        };
        let Some(session) = load_session(root.as_path()) else {
            return false;
        };
        if session.is_empty() {
            return false;
        }

        self.tree
            .restore_expanded(self.backend.as_ref(), &session.expanded_paths)
            .await;
        for path in &session.open_tabs {
            if self.docs.contains(path) {
                continue;
            }
            match self.backend.load_document(path).await {
                Ok(content) => {
                    self.docs.upsert(Some(path.clone()), &content);
                }
                Err(e) => warn!("Skipping saved tab {}: {}", path, e),
            }
        }

        if let Some(active) = session.active_file.filter(|path| self.docs.contains(path)) {
            let activation = self.active.set_active(&mut self.docs, Some(active));
            self.finish_activation(activation).await;
        }
        self.session_recent = session.recent_files;

        info!(
            "Restored session for {}: {} tab(s)",
            root,
            self.docs.len()
        );
        true
    }

    fn remember_file(&mut self, path: &PathKey) {
        if path.is_untitled() {
            return;
        }
        self.update_settings(|s| {
            s.last_file = Some(path.clone());
            s.add_recent_file(path.clone());
        });
        if self.tree.root().is_some_and(|root| path.is_within(root)) {
            self.session_recent.retain(|p| p != path);
            self.session_recent.insert(0, path.clone());
            self.session_recent.truncate(MAX_SESSION_RECENT);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // File Watching
    // ─────────────────────────────────────────────────────────────────────────

    /// Watch opened folders for outside changes.
    pub fn set_watching(&mut self, enabled: bool) {
        self.watch_folders = enabled;
        if !enabled {
            self.watcher = None;
        } else if let Some(root) = self.tree.root().cloned() {
            self.start_watching(&root);
        }
    }

    fn start_watching(&mut self, root: &PathKey) {
        self.watcher = None;
        if !self.watch_folders {
            return;
        }
        match WorkspaceWatcher::new(root.clone()) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => warn!("Failed to watch {}: {}", root, e),
        }
    }

    /// Refresh the tree if files under the root changed outside the app.
    ///
    /// Returns whether a refresh happened.
    pub async fn poll_watcher(&mut self) -> bool {
        let Some(watcher) = &self.watcher else {
            return false;
        };
        let Some(root) = self.tree.root().cloned() else {
            return false;
        };
        let events = filter_events(watcher.poll_events(), &root, &[]);

        let mut structural = false;
        for event in &events {
            if let WorkspaceEvent::Error(message) = event {
                warn!("File watcher: {}", message);
            } else if event.is_structural() && event.path().is_some_and(|p| p.is_within(&root)) {
                structural = true;
            }
        }
        if !structural {
            return false;
        }

        debug!("Refreshing tree after {} watcher event(s)", events.len());
        self.tree.refresh(self.backend.as_ref()).await;
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Settings Management
    // ─────────────────────────────────────────────────────────────────────────

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Update settings and mark them as dirty.
    pub fn update_settings<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        f(&mut self.settings);
        self.settings_dirty = true;
    }

    pub fn settings_dirty(&self) -> bool {
        self.settings_dirty
    }

    /// Save settings to the config file if modified.
    ///
    /// Returns `true` if settings were saved.
    pub fn save_settings_if_dirty(&mut self) -> bool {
        if !self.settings_dirty {
            return false;
        }
        if save_config_silent(&self.settings) {
            self.settings_dirty = false;
            info!("Settings saved");
            return true;
        }
        false
    }

    /// Prepare state for application shutdown.
    ///
    /// Saves the folder session and any modified settings. Unsaved documents
    /// are not written.
    pub fn shutdown(&mut self) {
        self.active.persist(&mut self.docs);
        if self.has_unsaved_changes() {
            warn!(
                "Shutting down with {} unsaved document(s)",
                self.docs.dirty_paths().len()
            );
        }
        self.persist_session();
        self.save_settings_if_dirty();
        self.watcher = None;
        info!("Application state shutdown complete");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
