//! Rename reconciliation.
//!
//! After the backend confirms a rename or move, every reference to the old
//! path is rewritten: open documents (keys, tab entries, titles), the active
//! pointers and the cached tree nodes. Documents outside the renamed path are
//! never touched.

use crate::active::ActivePointers;
use crate::documents::DocumentRegistry;
use crate::path_key::PathKey;
use crate::workspaces::DirectoryTreeCache;
use log::{debug, info};

/// What a reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenameOutcome {
    /// Open documents that moved, as `(old, new)` in tab order
    pub rewritten: Vec<(PathKey, PathKey)>,
    /// Whether the active document was among them
    pub active_updated: bool,
    /// Whether the browsed folder moved
    pub folder_updated: bool,
}

impl RenameOutcome {
    pub fn is_empty(&self) -> bool {
        self.rewritten.is_empty() && !self.active_updated && !self.folder_updated
    }
}

/// Rewrites state after `old` was renamed to `new`.
pub struct RenameReconciler;

impl RenameReconciler {
    pub fn apply(
        docs: &mut DocumentRegistry,
        tree: &mut DirectoryTreeCache,
        pointers: &mut ActivePointers,
        old: &PathKey,
        new: &PathKey,
        was_dir: bool,
    ) -> RenameOutcome {
        let mut outcome = RenameOutcome::default();

        let affected: Vec<PathKey> = if was_dir {
            docs.paths_within(old)
        } else {
            docs.tab_order().iter().filter(|key| *key == old).cloned().collect()
        };

        for path in affected {
            let Some(target) = path.rebase(old, new) else {
                continue;
            };
            if docs.rekey(&path, &target) {
                outcome.rewritten.push((path, target));
            }
        }

        if let Some(active) = pointers.active_file.clone() {
            if let Some((_, moved)) = outcome.rewritten.iter().find(|(from, _)| *from == active) {
                pointers.active_file = Some(moved.clone());
                if pointers.current_file.is_some() {
                    pointers.current_file = Some(moved.clone());
                }
                outcome.active_updated = true;
            }
        }

        if was_dir {
            if let Some(folder) = pointers.current_folder.as_ref() {
                if let Some(moved) = folder.rebase(old, new) {
                    pointers.current_folder = Some(moved);
                    outcome.folder_updated = true;
                }
            }
        }

        let nodes = tree.rename_subtree(old, new);
        debug!(
            "Rename {} -> {}: {} documents, {} tree nodes",
            old,
            new,
            outcome.rewritten.len(),
            nodes
        );
        if !outcome.rewritten.is_empty() {
            info!("Renamed {} open document(s) under {}", outcome.rewritten.len(), new);
        }
        outcome
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
