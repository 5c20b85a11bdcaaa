//! File system watcher for the open folder.
//!
//! Watches the folder root for changes made outside the app so the tree can
//! be refreshed.

use crate::error::{Error, Result};
use crate::path_key::PathKey;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

/// File system events the folder tree cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceEvent {
    /// A file was modified externally
    FileModified(PathKey),
    /// A file or folder was created
    FileCreated(PathKey),
    /// A file or folder was deleted
    FileDeleted(PathKey),
    /// A file or folder was renamed (from, to)
    FileRenamed(PathKey, PathKey),
    /// The watcher encountered an error
    Error(String),
}

impl WorkspaceEvent {
    /// Whether the event changes what a directory listing would return.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::FileCreated(_) | Self::FileDeleted(_) | Self::FileRenamed(..)
        )
    }

    /// The path the event refers to (the destination for renames).
    pub fn path(&self) -> Option<&PathKey> {
        match self {
            Self::FileModified(p) | Self::FileCreated(p) | Self::FileDeleted(p) => Some(p),
            Self::FileRenamed(_, to) => Some(to),
            Self::Error(_) => None,
        }
    }
}

/// Watches a folder and queues `WorkspaceEvent`s for polling.
#[derive(Debug)]
pub struct WorkspaceWatcher {
    /// The internal notify watcher
    _watcher: RecommendedWatcher,
    /// Receiver for file system events
    receiver: Receiver<WorkspaceEvent>,
    /// Root path being watched
    root: PathKey,
}

impl WorkspaceWatcher {
    /// Start watching `root` recursively.
    pub fn new(root: PathKey) -> Result<Self> {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| {
                Self::handle_event(result, &tx);
            },
            Config::default().with_poll_interval(Duration::from_millis(500)),
        )
        .map_err(|e| Error::Application(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(root.as_path(), RecursiveMode::Recursive)
            .map_err(|e| Error::Application(format!("Failed to watch {}: {}", root, e)))?;
        log::debug!("Watching {}", root);

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            root,
        })
    }

    /// Convert a raw notify event into workspace events.
    fn handle_event(
        result: std::result::Result<Event, notify::Error>,
        tx: &Sender<WorkspaceEvent>,
    ) {
        match result {
            Ok(event) => {
                for event in translate(event) {
                    let _ = tx.send(event);
                }
            }
            Err(e) => {
                let _ = tx.send(WorkspaceEvent::Error(e.to_string()));
            }
        }
    }

    /// Drain pending events without blocking.
    pub fn poll_events(&self) -> Vec<WorkspaceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// The folder being watched.
    pub fn root(&self) -> &PathKey {
        &self.root
    }
}

fn translate(event: Event) -> Vec<WorkspaceEvent> {
    let keys: Vec<PathKey> = event
        .paths
        .iter()
        .filter_map(|path| PathKey::from_path(path))
        .collect();

    match event.kind {
        EventKind::Modify(notify::event::ModifyKind::Name(_)) if keys.len() == 2 => {
            vec![WorkspaceEvent::FileRenamed(keys[0].clone(), keys[1].clone())]
        }
        EventKind::Create(_) => keys.into_iter().map(WorkspaceEvent::FileCreated).collect(),
        EventKind::Remove(_) => keys.into_iter().map(WorkspaceEvent::FileDeleted).collect(),
        // A lone rename half: the listing changed either way
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => {
            keys.into_iter().map(WorkspaceEvent::FileCreated).collect()
        }
        EventKind::Modify(_) => keys.into_iter().map(WorkspaceEvent::FileModified).collect(),
        _ => Vec::new(),
    }
}

/// Drop events whose path has a hidden segment below `root` (dotfiles or
/// `hidden_patterns`). Segments above the root are never considered.
pub fn filter_events(
    events: Vec<WorkspaceEvent>,
    root: &PathKey,
    hidden_patterns: &[String],
) -> Vec<WorkspaceEvent> {
    events
        .into_iter()
        .filter(|event| {
            let Some(path) = event.path() else {
                return true; // Always pass through errors
            };

            let full = path.normalized();
            let relative = full.strip_prefix(root.normalized()).unwrap_or(full);
            !relative
                .split('/')
                .filter(|segment| !segment.is_empty())
                .any(|name| {
                    name.starts_with('.')
                        || hidden_patterns
                            .iter()
                            .any(|pattern| name.eq_ignore_ascii_case(pattern))
                })
        })
        .collect()
}
