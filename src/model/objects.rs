//! Live objects behind repository identifiers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use crate::types::{DeclKind, DeclUid, FileId};

use super::decl::ClassifierDecl;
use super::native::Language;

/// A source file object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub id: FileId,
    pub path: PathBuf,
    pub language: Language,
}

/// Resolves persistent identifiers to live objects.
pub trait ObjectResolver: Send + Sync {
    fn resolve_file(&self, id: FileId) -> Option<Arc<SourceFile>>;

    fn resolve_decl(&self, uid: DeclUid) -> Option<Arc<ClassifierDecl>>;
}

/// In-memory object table with identifier allocation.
#[derive(Debug)]
pub struct ObjectTable {
    files: DashMap<FileId, Arc<SourceFile>>,
    decls: DashMap<DeclUid, Arc<ClassifierDecl>>,
    decls_by_file: DashMap<FileId, Vec<DeclUid>>,
    next_file: AtomicU32,
    next_decl: AtomicU32,
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectTable {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            decls: DashMap::new(),
            decls_by_file: DashMap::new(),
            next_file: AtomicU32::new(1),
            next_decl: AtomicU32::new(1),
        }
    }

    /// Create a file object with a fresh identifier.
    pub fn create_file(&self, path: &Path) -> Arc<SourceFile> {
        let id = self.allocate_file_id();
        let file = Arc::new(SourceFile {
            id,
            path: path.to_path_buf(),
            language: Language::from_path(path),
        });
        self.files.insert(id, file.clone());
        file
    }

    /// Re-attach a file object under a known identifier (after a restore).
    pub fn attach_file(&self, id: FileId, path: &Path) -> Arc<SourceFile> {
        self.next_file.fetch_max(id.value().saturating_add(1), Ordering::Relaxed);
        let file = Arc::new(SourceFile {
            id,
            path: path.to_path_buf(),
            language: Language::from_path(path),
        });
        self.files.insert(id, file.clone());
        file
    }

    fn allocate_file_id(&self) -> FileId {
        loop {
            let raw = self.next_file.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = FileId::new(raw) {
                return id;
            }
        }
    }

    /// Allocate an identifier for a new declaration.
    pub fn allocate_decl_uid(&self, kind: DeclKind) -> DeclUid {
        loop {
            let raw = self.next_decl.fetch_add(1, Ordering::Relaxed);
            if let Some(uid) = DeclUid::new(raw, kind) {
                return uid;
            }
        }
    }

    /// Register a declaration, recording its owning file.
    pub fn add_decl(&self, decl: ClassifierDecl) -> Arc<ClassifierDecl> {
        let decl = Arc::new(decl);
        if let Some(file) = decl.file {
            self.decls_by_file.entry(file).or_default().push(decl.uid);
        }
        self.decls.insert(decl.uid, decl.clone());
        decl
    }

    /// Put back a stored declaration under its own identifier.
    pub fn restore_decl(&self, decl: ClassifierDecl) -> Arc<ClassifierDecl> {
        self.reserve_decl_uid(decl.uid.value());
        self.add_decl(decl)
    }

    /// Keep future declaration identifiers above `value`.
    pub fn reserve_decl_uid(&self, value: u32) {
        self.next_decl.fetch_max(value.saturating_add(1), Ordering::Relaxed);
    }

    /// Every declaration, ordered by identifier.
    pub fn decls(&self) -> Vec<ClassifierDecl> {
        let mut decls: Vec<ClassifierDecl> =
            self.decls.iter().map(|r| r.value().as_ref().clone()).collect();
        decls.sort_by_key(|d| (d.uid.value(), d.uid.kind().tag()));
        decls
    }

    /// Forget every object. Identifier counters keep their position.
    pub fn clear(&self) {
        self.files.clear();
        self.decls.clear();
        self.decls_by_file.clear();
    }

    /// Drop every declaration of a file, returning them.
    pub fn take_file_decls(&self, file: FileId) -> Vec<Arc<ClassifierDecl>> {
        let Some((_, uids)) = self.decls_by_file.remove(&file) else {
            return Vec::new();
        };
        uids.into_iter()
            .filter_map(|uid| self.decls.remove(&uid).map(|(_, d)| d))
            .collect()
    }

    /// Forget a file object and its declarations.
    pub fn remove_file(&self, file: FileId) -> Vec<Arc<ClassifierDecl>> {
        self.files.remove(&file);
        self.take_file_decls(file)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }
}

impl ObjectResolver for ObjectTable {
    fn resolve_file(&self, id: FileId) -> Option<Arc<SourceFile>> {
        self.files.get(&id).map(|r| r.value().clone())
    }

    fn resolve_decl(&self, uid: DeclUid) -> Option<Arc<ClassifierDecl>> {
        self.decls.get(&uid).map(|r| r.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_ids_are_unique() {
        let table = ObjectTable::new();
        let a = table.create_file(Path::new("/a.c"));
        let b = table.create_file(Path::new("/b.c"));
        assert_ne!(a.id, b.id);
        assert_eq!(table.resolve_file(a.id).unwrap().path, PathBuf::from("/a.c"));
    }

    #[test]
    fn test_attach_advances_allocator() {
        let table = ObjectTable::new();
        let restored = FileId::new(40).unwrap();
        table.attach_file(restored, Path::new("/old.c"));
        let fresh = table.create_file(Path::new("/new.c"));
        assert!(fresh.id.value() > 40);
    }

    #[test]
    fn test_restored_decl_advances_allocator() {
        let table = ObjectTable::new();
        let stored = DeclUid::new(17, DeclKind::Class).unwrap();
        table.restore_decl(ClassifierDecl::new(stored, "Old"));
        let fresh = table.allocate_decl_uid(DeclKind::Class);
        assert!(fresh.value() > 17);

        table.reserve_decl_uid(90);
        assert!(table.allocate_decl_uid(DeclKind::Enum).value() > 90);
    }

    #[test]
    fn test_decls_follow_their_file() {
        let table = ObjectTable::new();
        let file = table.create_file(Path::new("/a.h"));
        let uid = table.allocate_decl_uid(DeclKind::Struct);
        table.add_decl(ClassifierDecl::new(uid, "S").in_file(file.id));
        assert!(table.resolve_decl(uid).is_some());

        let removed = table.remove_file(file.id);
        assert_eq!(removed.len(), 1);
        assert!(table.resolve_decl(uid).is_none());
        assert!(table.resolve_file(file.id).is_none());
    }
}
