//! notedeck - document, tab and file-tree state for a Markdown note shell
//!
//! The crate owns the set of open documents and their tab order, a lazily
//! loaded folder tree, the single editing widget and the pointers saying
//! what is active. Storage lives behind the asynchronous [`backend::Backend`]
//! trait and the widget behind [`editor::EditorWidget`], so the whole state
//! machine runs headless.

pub mod active;
pub mod backend;
pub mod config;
pub mod documents;
pub mod editor;
pub mod error;
pub mod path_key;
pub mod rename;
pub mod state;
pub mod workspaces;

pub use active::{ActiveDocumentController, ActivePointers};
pub use backend::{Backend, DirectoryEntry, FsBackend};
pub use documents::{DocumentRegistry, OpenDocument};
pub use error::{Error, Result};
pub use path_key::PathKey;
pub use rename::{RenameOutcome, RenameReconciler};
pub use state::{AppState, BackendEvent, PendingAction, StatusKind, ThemeTarget};
pub use workspaces::DirectoryTreeCache;
