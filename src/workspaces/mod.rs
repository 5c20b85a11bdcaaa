//! Folder support: the lazily loaded file tree, per-folder session state
//! and the file watcher.

mod file_tree;
mod persistence;
mod watcher;

pub use file_tree::{
    DirectoryTreeCache, FileTreeNode, HasChildren, LoadTicket, NodeLoadState, TreeRow,
};
pub use persistence::{load_session, save_session, session_path, SessionState};
pub use watcher::{filter_events, WorkspaceEvent, WorkspaceWatcher};
