//! Lazily loaded directory tree.
//!
//! Nodes live in an arena keyed by `PathKey`; parents and children refer to
//! each other by key. After the first install the tree is only ever changed
//! node by node (listings spliced into a parent, subtrees re-keyed on rename)
//! so the user's expansion state survives refreshes.

use crate::backend::{Backend, DirectoryEntry};
use crate::error::Result;
use crate::path_key::PathKey;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

// ─────────────────────────────────────────────────────────────────────────────
// File Tree Node
// ─────────────────────────────────────────────────────────────────────────────

/// What is known about a directory's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HasChildren {
    /// Not listed yet and the backend gave no hint
    Unknown,
    Yes,
    No,
}

/// Load lifecycle of a directory node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLoadState {
    Unloaded,
    Loading,
    LoadedWithChildren,
    LoadedEmpty,
}

/// A file or directory in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTreeNode {
    /// Display name of the file or folder
    pub name: String,

    /// Identity of this item
    pub path: PathKey,

    /// Whether this item is a directory
    pub is_dir: bool,

    /// Child keys in listing order; `None` until the directory is listed
    pub children: Option<Vec<PathKey>>,

    pub has_children: HasChildren,

    /// A listing request is in flight
    pub is_loading: bool,

    /// Parent key (`None` for the root)
    pub parent: Option<PathKey>,
}

impl FileTreeNode {
    /// Normalize a backend entry. Entries with neither path nor name are
    /// dropped.
    fn from_entry(entry: &DirectoryEntry, parent: Option<PathKey>) -> Option<Self> {
        let raw = if entry.path.trim().is_empty() {
            &entry.name
        } else {
            &entry.path
        };
        let path = PathKey::parse(raw)?;
        let name = if entry.name.trim().is_empty() {
            path.file_name().to_string()
        } else {
            entry.name.clone()
        };

        let nested = entry.children.as_ref().is_some_and(|c| !c.is_empty());
        let has_children = match (entry.is_dir, nested, entry.has_children) {
            (false, _, _) => HasChildren::No,
            (true, true, _) => HasChildren::Yes,
            (true, false, Some(true)) => HasChildren::Yes,
            (true, false, Some(false)) => HasChildren::No,
            (true, false, None) => HasChildren::Unknown,
        };

        Some(Self {
            name,
            path,
            is_dir: entry.is_dir,
            children: None,
            has_children,
            is_loading: false,
            parent,
        })
    }

    /// Whether this node has a non-empty cached child list.
    pub fn has_loaded_children(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn load_state(&self) -> NodeLoadState {
        if self.is_loading {
            NodeLoadState::Loading
        } else if self.has_loaded_children() {
            NodeLoadState::LoadedWithChildren
        } else if self.children.is_some() || self.has_children == HasChildren::No {
            NodeLoadState::LoadedEmpty
        } else {
            NodeLoadState::Unloaded
        }
    }
}

/// Proof that a listing for `path` was started with `begin_load`.
#[derive(Debug)]
#[must_use = "a load ticket must be passed to finish_load"]
pub struct LoadTicket {
    path: PathKey,
}

impl LoadTicket {
    pub fn path(&self) -> &PathKey {
        &self.path
    }
}

/// A node as it appears in a flattened tree view.
#[derive(Debug, Clone, Copy)]
pub struct TreeRow<'a> {
    pub node: &'a FileTreeNode,
    /// Nesting level below the root (direct children are 0)
    pub depth: usize,
    pub expanded: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory Tree Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Arena of tree nodes plus the set of expanded directories.
#[derive(Debug, Default)]
pub struct DirectoryTreeCache {
    nodes: HashMap<PathKey, FileTreeNode>,
    root: Option<PathKey>,
    expanded: HashSet<PathKey>,
}

impl DirectoryTreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole tree with a folder-opened snapshot.
    ///
    /// The expansion set is reset to just the root.
    pub fn install(&mut self, snapshot: &DirectoryEntry) -> bool {
        self.nodes.clear();
        self.expanded.clear();
        self.root = None;

        let Some(mut root) = FileTreeNode::from_entry(snapshot, None) else {
            warn!("Ignoring folder snapshot without a path");
            return false;
        };
        root.is_dir = true;
        let key = root.path.clone();
        self.nodes.insert(key.clone(), root);
        if let Some(children) = &snapshot.children {
            self.splice(&key, children);
        }
        self.expanded.insert(key.clone());
        debug!("Installed tree rooted at {} ({} nodes)", key, self.nodes.len());
        self.root = Some(key);
        true
    }

    /// Drop every node (no folder open).
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.expanded.clear();
        self.root = None;
    }

    pub fn root(&self) -> Option<&PathKey> {
        self.root.as_ref()
    }

    pub fn node(&self, path: &PathKey) -> Option<&FileTreeNode> {
        self.nodes.get(path)
    }

    /// Cached children of a directory, in listing order.
    pub fn children(&self, path: &PathKey) -> Vec<&FileTreeNode> {
        self.nodes
            .get(path)
            .and_then(|node| node.children.as_ref())
            .map(|keys| keys.iter().filter_map(|key| self.nodes.get(key)).collect())
            .unwrap_or_default()
    }

    pub fn load_state(&self, path: &PathKey) -> Option<NodeLoadState> {
        self.nodes.get(path).map(FileTreeNode::load_state)
    }

    pub fn is_expanded(&self, path: &PathKey) -> bool {
        self.expanded.contains(path)
    }

    /// Expanded directories, shallowest first.
    pub fn expanded_paths(&self) -> Vec<PathKey> {
        let mut paths: Vec<PathKey> = self.expanded.iter().cloned().collect();
        paths.sort_by(|a, b| {
            a.depth()
                .cmp(&b.depth())
                .then_with(|| a.normalized().cmp(b.normalized()))
        });
        paths
    }

    /// Mark a known directory as expanded without loading it.
    pub fn expand(&mut self, path: &PathKey) -> bool {
        match self.nodes.get(path) {
            Some(node) if node.is_dir => self.expanded.insert(path.clone()),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lazy loading
    // ─────────────────────────────────────────────────────────────────────────

    /// Start loading a directory's children.
    ///
    /// Returns `None` when no request is needed: the node is a file, already
    /// has children, is known to have none, or is already loading.
    pub fn begin_load(&mut self, path: &PathKey) -> Option<LoadTicket> {
        let node = self.nodes.get_mut(path)?;
        if !node.is_dir
            || node.is_loading
            || node.has_loaded_children()
            || node.has_children == HasChildren::No
        {
            return None;
        }
        node.is_loading = true;
        debug!("Loading children of {}", path);
        Some(LoadTicket { path: path.clone() })
    }

    /// Apply the outcome of a listing started with `begin_load`.
    ///
    /// A failed listing leaves the node loaded and empty.
    pub fn finish_load(&mut self, ticket: LoadTicket, result: Result<Vec<DirectoryEntry>>) {
        let path = ticket.path;
        let Some(node) = self.nodes.get_mut(&path) else {
            debug!("Dropping listing for {}: node no longer in tree", path);
            return;
        };
        node.is_loading = false;

        match result {
            Ok(entries) => self.splice(&path, &entries),
            Err(e) => {
                warn!("Failed to list {}: {}", path, e);
                self.degrade(&path);
            }
        }
    }

    /// Load a directory's children unless they are cached or known absent.
    pub async fn ensure_children(&mut self, backend: &dyn Backend, path: &PathKey) {
        let Some(ticket) = self.begin_load(path) else {
            return;
        };
        let result = backend.load_directory_entries(ticket.path()).await;
        self.finish_load(ticket, result);
    }

    /// Load and expand every directory between the root and `target`.
    ///
    /// Targets outside the tree are ignored.
    pub async fn ensure_ancestors_loaded(&mut self, backend: &dyn Backend, target: &PathKey) {
        let Some(root) = self.root.clone() else {
            return;
        };
        if !target.is_within(&root) {
            debug!("Not revealing {}: outside {}", target, root);
            return;
        }

        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = target.parent();
        while let Some(dir) = cursor {
            if !dir.is_same_or_within(&root) || !seen.insert(dir.clone()) {
                break;
            }
            let reached_root = dir == root;
            chain.push(dir.clone());
            if reached_root {
                break;
            }
            cursor = dir.parent();
        }
        if chain.last() != Some(&root) {
            chain.push(root);
        }

        for dir in chain.into_iter().rev() {
            if !self.nodes.contains_key(&dir) {
                debug!("Reveal stopped at {}: not in listing", dir);
                break;
            }
            self.ensure_children(backend, &dir).await;
            self.expanded.insert(dir);
        }
    }

    /// Collapse an expanded directory, or load and expand a collapsed one.
    ///
    /// Returns whether the directory is expanded afterwards. Collapsing keeps
    /// cached children.
    pub async fn toggle_expand(&mut self, backend: &dyn Backend, path: &PathKey) -> bool {
        if self.expanded.remove(path) {
            return false;
        }
        match self.nodes.get(path) {
            Some(node) if node.is_dir && node.has_children != HasChildren::No => {}
            _ => return false,
        }

        self.ensure_children(backend, path).await;
        let loaded = self
            .nodes
            .get(path)
            .is_some_and(FileTreeNode::has_loaded_children);
        if loaded {
            self.expanded.insert(path.clone());
        }
        loaded
    }

    /// Re-list the root and every expanded directory, parents first.
    ///
    /// Nodes that are still listed keep their cached children; nodes that
    /// disappeared are dropped along with their expansion entries.
    pub async fn refresh(&mut self, backend: &dyn Backend) {
        let Some(root) = self.root.clone() else {
            return;
        };
        let mut targets: Vec<PathKey> = self
            .expanded_paths()
            .into_iter()
            .filter(|path| *path != root)
            .collect();
        targets.insert(0, root);

        for path in targets {
            if !self.nodes.contains_key(&path) {
                self.expanded.remove(&path);
                continue;
            }
            let result = backend.load_directory_entries(&path).await;
            if let Some(node) = self.nodes.get_mut(&path) {
                node.is_loading = false;
            }
            match result {
                Ok(entries) => self.splice(&path, &entries),
                Err(e) => {
                    warn!("Failed to refresh {}: {}", path, e);
                    self.degrade(&path);
                }
            }
        }
    }

    /// Reload and expand a saved set of directories (session restore).
    pub async fn restore_expanded(&mut self, backend: &dyn Backend, paths: &[PathKey]) {
        let mut paths: Vec<&PathKey> = paths.iter().collect();
        paths.sort_by_key(|path| path.depth());
        for path in paths {
            if !self.nodes.contains_key(path) {
                continue;
            }
            self.ensure_children(backend, path).await;
            self.expand(path);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Renames
    // ─────────────────────────────────────────────────────────────────────────

    /// Re-key a node and its cached descendants after a rename.
    ///
    /// Returns the number of nodes re-keyed.
    pub fn rename_subtree(&mut self, old: &PathKey, new: &PathKey) -> usize {
        let Some(top) = self.nodes.get(old) else {
            return 0;
        };
        let old_parent = top.parent.clone();

        let mut affected = vec![old.clone()];
        let mut index = 0;
        while index < affected.len() {
            let children = self
                .nodes
                .get(&affected[index])
                .and_then(|node| node.children.clone())
                .unwrap_or_default();
            affected.extend(children);
            index += 1;
        }

        let rebase = |key: &PathKey| key.rebase(old, new).unwrap_or_else(|| key.clone());
        for key in &affected {
            let Some(mut node) = self.nodes.remove(key) else {
                continue;
            };
            node.path = rebase(key);
            if let Some(children) = node.children.as_mut() {
                for child in children.iter_mut() {
                    *child = rebase(child);
                }
            }
            if key == old {
                node.name = new.file_name().to_string();
                node.parent = new.parent().or_else(|| old_parent.clone());
            } else {
                node.parent = node.parent.as_ref().map(&rebase);
            }
            self.nodes.insert(node.path.clone(), node);
        }

        let new_parent = self.nodes.get(new).and_then(|node| node.parent.clone());
        if let Some(parent) = old_parent.as_ref().and_then(|key| self.nodes.get_mut(key)) {
            if let Some(children) = parent.children.as_mut() {
                match children.iter().position(|child| child == old) {
                    Some(i) if new_parent == old_parent => children[i] = new.clone(),
                    Some(i) => {
                        children.remove(i);
                    }
                    None => {}
                }
            }
        }
        if new_parent != old_parent {
            if let Some(parent) = new_parent.as_ref().and_then(|key| self.nodes.get_mut(key)) {
                if let Some(children) = parent.children.as_mut() {
                    children.push(new.clone());
                }
            }
        }

        self.expanded = std::mem::take(&mut self.expanded)
            .iter()
            .map(&rebase)
            .collect();
        if self.root.as_ref() == Some(old) {
            self.root = Some(new.clone());
        }

        debug!("Re-keyed {} tree nodes {} -> {}", affected.len(), old, new);
        affected.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Views
    // ─────────────────────────────────────────────────────────────────────────

    /// Depth-first rows for a tree view: the root's children, descending into
    /// expanded directories.
    pub fn visible_rows(&self) -> Vec<TreeRow<'_>> {
        let mut rows = Vec::new();
        if let Some(root) = &self.root {
            self.collect_rows(root, 0, &mut rows);
        }
        rows
    }

    fn collect_rows<'a>(&'a self, dir: &PathKey, depth: usize, rows: &mut Vec<TreeRow<'a>>) {
        for child in self.children(dir) {
            let expanded = child.is_dir && self.expanded.contains(&child.path);
            rows.push(TreeRow {
                node: child,
                depth,
                expanded,
            });
            if expanded {
                self.collect_rows(&child.path, depth + 1, rows);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace a directory's child list with `entries`, reusing nodes that
    /// keep their key.
    fn splice(&mut self, parent: &PathKey, entries: &[DirectoryEntry]) {
        let mut keys = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(fresh) = FileTreeNode::from_entry(entry, Some(parent.clone())) else {
                warn!("Skipping listing entry without a path under {}", parent);
                continue;
            };
            if keys.contains(&fresh.path) {
                continue;
            }
            let key = fresh.path.clone();

            match self.nodes.get_mut(&key) {
                Some(existing) => {
                    existing.name = fresh.name;
                    existing.parent = fresh.parent;
                    if existing.is_dir != fresh.is_dir {
                        existing.is_dir = fresh.is_dir;
                        existing.children = None;
                    }
                    if !existing.has_loaded_children() || fresh.has_children == HasChildren::Yes {
                        existing.has_children = fresh.has_children;
                    }
                }
                None => {
                    self.nodes.insert(key.clone(), fresh);
                }
            }

            if let Some(nested) = &entry.children {
                if !nested.is_empty() {
                    self.splice(&key, nested);
                }
            }
            keys.push(key);
        }

        let previous = self
            .nodes
            .get(parent)
            .and_then(|node| node.children.clone())
            .unwrap_or_default();
        for stale in previous.iter().filter(|key| !keys.contains(key)) {
            self.remove_subtree(stale);
        }

        if let Some(node) = self.nodes.get_mut(parent) {
            node.has_children = if keys.is_empty() {
                HasChildren::No
            } else {
                HasChildren::Yes
            };
            node.children = Some(keys);
        }
    }

    fn degrade(&mut self, path: &PathKey) {
        let previous = self
            .nodes
            .get_mut(path)
            .and_then(|node| {
                node.is_loading = false;
                node.has_children = HasChildren::No;
                node.children.replace(Vec::new())
            })
            .unwrap_or_default();
        for stale in &previous {
            self.remove_subtree(stale);
        }
        self.expanded.remove(path);
    }

    fn remove_subtree(&mut self, path: &PathKey) {
        let mut pending = vec![path.clone()];
        while let Some(key) = pending.pop() {
            if let Some(node) = self.nodes.remove(&key) {
                pending.extend(node.children.unwrap_or_default());
            }
            self.expanded.remove(&key);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
