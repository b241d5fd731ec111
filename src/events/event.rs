//! Change events fed to the coalescer.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::model::NativeItemRef;

/// Kind of a change notification.
///
/// The first thirteen kinds take part in coalescing; the rest are accepted
/// and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FileCreated,
    FileDeleted,
    FileChanged,
    FileRenamedCreated,
    FileRenamedDeleted,
    ItemAdded,
    ItemRemoved,
    ItemPropertyChanged,
    ItemRenamedCreated,
    ItemRenamedDeleted,
    ItemsAllPropertyChanged,
    SourceRootFilesDeleted,
    ProjectDeleted,
    FileIndexed,
    FolderCreated,
    FileAttributeChanged,
    Null,
}

impl EventKind {
    /// Row/column of this kind in the conversion table.
    pub fn index(self) -> Option<usize> {
        let index = match self {
            EventKind::FileCreated => 0,
            EventKind::FileDeleted => 1,
            EventKind::FileChanged => 2,
            EventKind::FileRenamedCreated => 3,
            EventKind::FileRenamedDeleted => 4,
            EventKind::ItemAdded => 5,
            EventKind::ItemRemoved => 6,
            EventKind::ItemPropertyChanged => 7,
            EventKind::ItemRenamedCreated => 8,
            EventKind::ItemRenamedDeleted => 9,
            EventKind::ItemsAllPropertyChanged => 10,
            EventKind::SourceRootFilesDeleted => 11,
            EventKind::ProjectDeleted => 12,
            EventKind::FileIndexed
            | EventKind::FolderCreated
            | EventKind::FileAttributeChanged
            | EventKind::Null => return None,
        };
        Some(index)
    }

    pub fn is_ignored(self) -> bool {
        self.index().is_none()
    }

    /// Kinds held back while the coalescer is suspended.
    pub fn is_removal(self) -> bool {
        matches!(
            self,
            EventKind::FileDeleted
                | EventKind::FileRenamedDeleted
                | EventKind::ItemRemoved
                | EventKind::ItemRenamedDeleted
                | EventKind::SourceRootFilesDeleted
        )
    }

    /// Carries a native build item rather than a bare path.
    pub fn is_item_level(self) -> bool {
        matches!(
            self,
            EventKind::ItemAdded
                | EventKind::ItemRemoved
                | EventKind::ItemPropertyChanged
                | EventKind::ItemRenamedCreated
                | EventKind::ItemRenamedDeleted
        )
    }
}

/// Coalescing key: a path, or the whole project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Path(PathBuf),
    Project,
}

/// A change notification.
#[derive(Debug, Clone)]
pub struct CsmEvent {
    pub kind: EventKind,
    pub path: PathBuf,
    pub item: Option<NativeItemRef>,
}

impl CsmEvent {
    pub fn file(kind: EventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            item: None,
        }
    }

    pub fn item(kind: EventKind, item: NativeItemRef) -> Self {
        Self {
            kind,
            path: item.path.clone(),
            item: Some(item),
        }
    }

    pub fn project_deleted() -> Self {
        Self::file(EventKind::ProjectDeleted, PathBuf::new())
    }

    pub fn key(&self) -> EventKey {
        match self.kind {
            EventKind::ProjectDeleted => EventKey::Project,
            _ => EventKey::Path(self.path.clone()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PartialEq for CsmEvent {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.path == other.path && self.item == other.item
    }
}

impl Eq for CsmEvent {}

impl fmt::Display for CsmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::ProjectDeleted => write!(f, "{:?}", self.kind),
            _ => write!(f, "{:?} {}", self.kind, self.path.display()),
        }
    }
}
