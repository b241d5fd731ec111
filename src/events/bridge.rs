//! Filesystem notifications to change events.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::model::Language;

use super::coalescer::ChangeEventCoalescer;
use super::event::{CsmEvent, EventKind};
use super::EventError;

/// Translate one raw notification into change events.
///
/// A rename reported with both paths yields the deleted half first.
pub fn classify(event: &Event) -> Vec<CsmEvent> {
    let kind = match event.kind {
        notify::EventKind::Create(CreateKind::Folder) => EventKind::FolderCreated,
        notify::EventKind::Create(_) => EventKind::FileCreated,
        notify::EventKind::Remove(RemoveKind::Folder) => EventKind::SourceRootFilesDeleted,
        notify::EventKind::Remove(_) => EventKind::FileDeleted,
        notify::EventKind::Modify(ModifyKind::Name(mode)) => {
            return classify_rename(mode, &event.paths);
        }
        notify::EventKind::Modify(ModifyKind::Metadata(_)) => EventKind::FileAttributeChanged,
        notify::EventKind::Modify(_) => EventKind::FileChanged,
        notify::EventKind::Access(_) | notify::EventKind::Any | notify::EventKind::Other => {
            EventKind::Null
        }
    };
    event
        .paths
        .iter()
        .map(|path| CsmEvent::file(kind, path.clone()))
        .collect()
}

fn classify_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<CsmEvent> {
    match (mode, paths) {
        (RenameMode::Both, [from, to]) => vec![
            CsmEvent::file(EventKind::FileRenamedDeleted, from.clone()),
            CsmEvent::file(EventKind::FileRenamedCreated, to.clone()),
        ],
        (RenameMode::From, _) => renamed(EventKind::FileRenamedDeleted, paths),
        (RenameMode::To, _) => renamed(EventKind::FileRenamedCreated, paths),
        // Backends that cannot tell the halves apart: decide by existence
        _ => paths
            .iter()
            .map(|path| {
                let kind = if path.exists() {
                    EventKind::FileRenamedCreated
                } else {
                    EventKind::FileRenamedDeleted
                };
                CsmEvent::file(kind, path.clone())
            })
            .collect(),
    }
}

fn renamed(kind: EventKind, paths: &[PathBuf]) -> Vec<CsmEvent> {
    paths
        .iter()
        .map(|path| CsmEvent::file(kind, path.clone()))
        .collect()
}

/// Whether an event concerns a file the project tracks.
///
/// Folder-level kinds always pass; file kinds pass for supported languages.
fn accepts(event: &CsmEvent, languages: &[Language]) -> bool {
    match event.kind {
        EventKind::SourceRootFilesDeleted | EventKind::FolderCreated => true,
        _ => languages.contains(&Language::from_path(&event.path)),
    }
}

/// Feeds a coalescer from a `notify` watcher.
pub struct FsEventBridge {
    watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl std::fmt::Debug for FsEventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsEventBridge")
            .field("roots", &self.roots)
            .finish()
    }
}

impl FsEventBridge {
    pub fn new(
        coalescer: Arc<ChangeEventCoalescer>,
        languages: Vec<Language>,
    ) -> Result<Self, EventError> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for csm_event in classify(&event) {
                    if accepts(&csm_event, &languages) {
                        tracing::trace!("[events] fs {csm_event}");
                        coalescer.fire_event(csm_event);
                    }
                }
            }
            Err(e) => tracing::error!("[events] file watch error: {e}"),
        })?;
        Ok(Self {
            watcher,
            roots: Vec::new(),
        })
    }

    /// Watch `root` recursively.
    pub fn watch(&mut self, root: &Path) -> Result<(), EventError> {
        self.watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| EventError::PathWatchFailed {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("events", "watching", "{}", root.display());
        self.roots.push(root.to_path_buf());
        Ok(())
    }

    pub fn unwatch(&mut self, root: &Path) -> Result<(), EventError> {
        self.watcher
            .unwatch(root)
            .map_err(|e| EventError::PathWatchFailed {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;
        self.roots.retain(|r| r != root);
        Ok(())
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}
