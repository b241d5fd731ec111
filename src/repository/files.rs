//! File registry of a project.
//!
//! Maps normalized absolute paths to [`FileEntry`] values and keeps a
//! canonical-path alias table so a file reached through a symlink or a
//! case variant resolves to the entry registered under its primary path.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;

use crate::fs::FileSystem;
use crate::model::{ObjectResolver, SourceFile};
use crate::preproc::PreprocState;
use crate::storage::{
    ComponentKey, ComponentKind, ComponentRead, ProjectComponent, RecordReader, RecordWriter,
    StorageError, StorageResult,
};
use crate::types::FileId;
use crate::utils::path_key;

use super::entry::FileEntry;

/// Primary paths sharing one canonical path.
///
/// Nearly always a single path, so that case avoids a vector.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AliasSet {
    One(Arc<str>),
    Many(Vec<Arc<str>>),
}

impl AliasSet {
    fn len(&self) -> usize {
        match self {
            AliasSet::One(_) => 1,
            AliasSet::Many(paths) => paths.len(),
        }
    }

    fn first(&self) -> Option<&Arc<str>> {
        match self {
            AliasSet::One(path) => Some(path),
            AliasSet::Many(paths) => paths.first(),
        }
    }

    fn paths(&self) -> &[Arc<str>] {
        match self {
            AliasSet::One(path) => std::slice::from_ref(path),
            AliasSet::Many(paths) => paths,
        }
    }

    /// Add a path; no-op when already present.
    fn add(&mut self, path: Arc<str>) {
        match self {
            AliasSet::One(existing) if *existing == path => {}
            AliasSet::One(existing) => {
                *self = AliasSet::Many(vec![existing.clone(), path]);
            }
            AliasSet::Many(paths) => {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
    }

    /// Remove a path. Returns `(removed, now_empty)`.
    fn remove(&mut self, path: &str) -> (bool, bool) {
        match self {
            AliasSet::One(existing) => {
                let removed = &**existing == path;
                (removed, removed)
            }
            AliasSet::Many(paths) => {
                let before = paths.len();
                paths.retain(|p| &**p != path);
                let removed = paths.len() != before;
                match paths.len() {
                    0 => (removed, true),
                    1 => {
                        *self = AliasSet::One(paths[0].clone());
                        (removed, false)
                    }
                    _ => (removed, false),
                }
            }
        }
    }
}

/// Collaborators a registry needs; also used when restoring a snapshot.
#[derive(Clone)]
pub struct RegistryContext {
    pub file_system: Arc<dyn FileSystem>,
    pub resolver: Arc<dyn ObjectResolver>,
    /// Treat symlinked paths as distinct files (no canonical fallback).
    pub symlinks_as_distinct: bool,
}

/// Concurrent path → file entry registry.
pub struct FileRegistry {
    key: ComponentKey,
    context: RegistryContext,
    files: DashMap<Arc<str>, Arc<FileEntry>>,
    canonical: DashMap<Arc<str>, AliasSet>,
    /// Serializes structural updates so the alias table and the file map
    /// change together. Lookups do not take it.
    structure: Mutex<()>,
    placeholder: bool,
}

impl std::fmt::Debug for FileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRegistry")
            .field("key", &self.key)
            .field("files", &self.files.len())
            .field("canonical", &self.canonical.len())
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

impl FileRegistry {
    pub fn new(unit: &str, context: RegistryContext) -> Self {
        Self {
            key: ComponentKey::new(unit, ComponentKind::FileRegistry),
            context,
            files: DashMap::new(),
            canonical: DashMap::new(),
            structure: Mutex::new(()),
            placeholder: false,
        }
    }

    /// The empty placeholder registry.
    pub fn empty(unit: &str, context: RegistryContext) -> Self {
        Self {
            placeholder: true,
            ..Self::new(unit, context)
        }
    }

    pub fn is_empty_placeholder(&self) -> bool {
        self.placeholder
    }

    fn canonical_key(&self, path: &Path) -> Arc<str> {
        path_key(&self.context.file_system.canonical_path(path)).into()
    }

    /// Register (or replace) the entry for `path`.
    pub fn put_file(
        &self,
        path: &Path,
        file_id: FileId,
        state: Option<PreprocState>,
    ) -> Option<Arc<FileEntry>> {
        if self.placeholder {
            return None;
        }
        let key: Arc<str> = path_key(path).into();
        let canonical = self.canonical_key(path);
        let entry = Arc::new(FileEntry::new(
            file_id,
            self.context.file_system.id().clone(),
            key.clone(),
            canonical.clone(),
            state,
        ));

        let _guard = self.structure.lock();
        let old = self.files.insert(key.clone(), entry.clone());
        if let Some(old) = &old {
            tracing::debug!(
                "[files] replace entry for {key}: {:?} -> {file_id:?}",
                old.file_id()
            );
            if old.canonical_path() != &*canonical {
                self.remove_alternative_file_key(old.canonical_path(), &key);
            }
        }
        self.add_alternative_file_key(canonical, key);
        self.assert_alias_invariant();
        Some(entry)
    }

    /// Remove the entry for `path`. A missing entry is logged, not an error.
    pub fn remove_file(&self, path: &Path) -> Option<Arc<FileEntry>> {
        if self.placeholder {
            return None;
        }
        let key = path_key(path);
        let _guard = self.structure.lock();
        let Some((_, entry)) = self.files.remove(key.as_str()) else {
            tracing::warn!("[files] no entry to remove for {key}");
            return None;
        };
        self.remove_alternative_file_key(entry.canonical_path(), &key);
        self.assert_alias_invariant();
        Some(entry)
    }

    /// Record `path` as one of the primary paths of `canonical`.
    fn add_alternative_file_key(&self, canonical: Arc<str>, path: Arc<str>) {
        match self.canonical.entry(canonical) {
            Entry::Vacant(vacant) => {
                vacant.insert(AliasSet::One(path));
            }
            Entry::Occupied(mut occupied) => occupied.get_mut().add(path),
        }
    }

    fn remove_alternative_file_key(&self, canonical: &str, path: &str) {
        let Some(mut aliases) = self.canonical.get_mut(canonical) else {
            tracing::warn!("[files] no canonical entry {canonical} for {path}");
            return;
        };
        let (removed, empty) = aliases.remove(path);
        drop(aliases);
        if !removed {
            tracing::warn!("[files] {path} was not an alias of {canonical}");
        }
        if empty {
            self.canonical.remove(canonical);
        }
    }

    fn alias_count(&self) -> usize {
        self.canonical.iter().map(|r| r.value().len()).sum()
    }

    fn assert_alias_invariant(&self) {
        if crate::diagnostics::check_consistency() {
            let aliased = self.alias_count();
            let files = self.files.len();
            crate::model_assert!(
                "files",
                aliased == files,
                "{aliased} aliased paths for {files} files in {}",
                self.key
            );
        }
    }

    /// Entry registered exactly under `path`.
    pub fn get_entry(&self, path: &Path) -> Option<Arc<FileEntry>> {
        self.files
            .get(path_key(path).as_str())
            .map(|r| r.value().clone())
    }

    /// Entry whose lock guards compound updates of `path`'s state.
    pub fn get_lock(&self, path: &Path) -> Option<Arc<FileEntry>> {
        self.get_entry(path)
    }

    /// Exact lookup, then canonical-alias fallback unless `tree_only` is set
    /// or symlinked paths are tracked as distinct files.
    pub fn get_file_entry(&self, path: &Path, tree_only: bool) -> Option<Arc<FileEntry>> {
        if let Some(entry) = self.get_entry(path) {
            return Some(entry);
        }
        if tree_only || self.context.symlinks_as_distinct {
            return None;
        }
        let canonical = self.canonical_key(path);
        let primary = self.canonical.get(&canonical)?.first()?.clone();
        let entry = self.files.get(&primary).map(|r| r.value().clone());
        if entry.is_some() {
            tracing::trace!("[files] {} resolved via canonical {canonical}", path.display());
        }
        entry
    }

    pub fn get_file_uid(&self, path: &Path, tree_only: bool) -> Option<FileId> {
        self.get_file_entry(path, tree_only).map(|e| e.file_id())
    }

    /// Resolve `path` to its live file object.
    pub fn get_file(&self, path: &Path, tree_only: bool) -> Option<Arc<SourceFile>> {
        let entry = self.get_file_entry(path, tree_only)?;
        self.resolve_entry(&entry)
    }

    fn resolve_entry(&self, entry: &FileEntry) -> Option<Arc<SourceFile>> {
        let id = entry.file_id();
        // The object may be mid-replacement by a concurrent put; look once more.
        let file = self
            .context
            .resolver
            .resolve_file(id)
            .or_else(|| self.context.resolver.resolve_file(id));
        if file.is_none() {
            tracing::warn!(
                "[files] repository inconsistency: {} -> {id:?} has no live file",
                entry.path()
            );
        }
        file
    }

    /// Invalidate every parse context of `path`, keeping them for revalidation.
    pub fn invalidate_preproc_state(&self, path: &Path) {
        match self.get_entry(path) {
            Some(entry) => entry.lock().invalidate_states(),
            None => tracing::debug!("[files] nothing to invalidate for {}", path.display()),
        }
    }

    /// Whether some registered file has this canonical path.
    pub fn has_canonical_path(&self, canonical: &Path) -> bool {
        self.canonical.contains_key(path_key(canonical).as_str())
    }

    pub fn get_size(&self) -> usize {
        self.files.len()
    }

    pub fn get_file_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .files
            .iter()
            .map(|r| PathBuf::from(&**r.key()))
            .collect();
        paths.sort();
        paths
    }

    pub fn get_file_ids(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.files.iter().map(|r| r.value().file_id()).collect();
        ids.sort();
        ids
    }

    /// All live file objects. Inconsistent entries are reported and skipped.
    pub fn get_files(&self) -> Vec<Arc<SourceFile>> {
        let entries: Vec<Arc<FileEntry>> = self.files.iter().map(|r| r.value().clone()).collect();
        entries
            .iter()
            .filter_map(|e| self.resolve_entry(e))
            .collect()
    }

    pub fn entries(&self) -> Vec<Arc<FileEntry>> {
        self.files.iter().map(|r| r.value().clone()).collect()
    }

    pub fn clear(&self) {
        if self.placeholder {
            return;
        }
        let _guard = self.structure.lock();
        self.files.clear();
        self.canonical.clear();
    }

    /// Drop parse contexts of every file, keeping the files registered.
    pub fn debug_clear_state(&self) {
        for entry in self.entries() {
            entry.lock().clear();
        }
    }

    /// Full consistency pass. Returns whether the alias table matches.
    pub fn check_consistency(&self) -> bool {
        let _guard = self.structure.lock();
        let aliased = self.alias_count();
        let files = self.files.len();
        if aliased != files {
            tracing::warn!("[files] {aliased} aliased paths for {files} files");
            return false;
        }
        for alias in self.canonical.iter() {
            for path in alias.value().paths() {
                let Some(entry) = self.files.get(path) else {
                    tracing::warn!("[files] alias {path} of {} has no entry", alias.key());
                    return false;
                };
                if entry.canonical_path() != &**alias.key() {
                    tracing::warn!("[files] {path} listed under wrong canonical {}", alias.key());
                    return false;
                }
            }
        }
        true
    }
}

impl ProjectComponent for FileRegistry {
    fn key(&self) -> &ComponentKey {
        &self.key
    }

    fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    fn write_fields<W: Write>(&self, out: &mut RecordWriter<W>) -> StorageResult<()> {
        let _guard = self.structure.lock();
        out.write_str(self.context.file_system.id().as_str())?;

        let mut files: Vec<(Arc<str>, Arc<FileEntry>)> = self
            .files
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        out.write_len(files.len())?;
        for (path, entry) in &files {
            out.write_str(path)?;
            entry.write(out)?;
        }

        let mut aliases: Vec<(Arc<str>, AliasSet)> = self
            .canonical
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        aliases.sort_by(|a, b| a.0.cmp(&b.0));
        out.write_len(aliases.len())?;
        for (canonical, set) in &aliases {
            out.write_str(canonical)?;
            out.write_len(set.len())?;
            for path in set.paths() {
                out.write_str(path)?;
            }
        }
        Ok(())
    }
}

impl ComponentRead for FileRegistry {
    type Context = RegistryContext;

    fn read_fields<R: Read>(
        key: ComponentKey,
        input: &mut RecordReader<R>,
        context: &Self::Context,
    ) -> StorageResult<Self> {
        let fs_id = input.read_string("registry.fs")?;
        if fs_id != context.file_system.id().as_str() {
            return Err(StorageError::corrupt(
                &key,
                format!(
                    "snapshot of filesystem {fs_id}, opened with {}",
                    context.file_system.id()
                ),
            ));
        }

        let registry = Self::new(key.unit(), context.clone());

        let count = input.read_len("registry.files")?;
        for _ in 0..count {
            let path: Arc<str> = input.read_string("registry.path")?.into();
            let entry = FileEntry::read(input, path.clone())?;
            registry.files.insert(path, Arc::new(entry));
        }

        let count = input.read_len("registry.aliases")?;
        for _ in 0..count {
            let canonical: Arc<str> = input.read_string("registry.canonical")?.into();
            let size = input.read_len("registry.alias_count")?;
            let mut paths = Vec::with_capacity(size.min(16));
            for _ in 0..size {
                paths.push(Arc::<str>::from(input.read_string("registry.alias")?));
            }
            let set = match paths.len() {
                0 => continue,
                1 => AliasSet::One(paths.remove(0)),
                _ => AliasSet::Many(paths),
            };
            registry.canonical.insert(canonical, set);
        }

        registry.assert_alias_invariant();
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::VirtualFileSystem;
    use crate::model::ObjectTable;
    use crate::preproc::{ConditionState, DeadBlock};
    use crate::storage::{MemoryStore, load_component};

    struct Fixture {
        fs: Arc<VirtualFileSystem>,
        objects: Arc<ObjectTable>,
        registry: FileRegistry,
    }

    fn fixture_with(fs: VirtualFileSystem) -> Fixture {
        let fs = Arc::new(fs);
        let objects = Arc::new(ObjectTable::new());
        let registry = FileRegistry::new(
            "test",
            RegistryContext {
                file_system: fs.clone(),
                resolver: objects.clone(),
                symlinks_as_distinct: false,
            },
        );
        Fixture {
            fs,
            objects,
            registry,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(VirtualFileSystem::new("vfs"))
    }

    impl Fixture {
        fn add(&self, path: &str) -> FileId {
            let file = self.objects.create_file(Path::new(path));
            self.registry
                .put_file(Path::new(path), file.id, Some(PreprocState::compile_context(vec![1])))
                .unwrap();
            file.id
        }
    }

    #[test]
    fn test_put_and_get() {
        let f = fixture();
        let id = f.add("/src/main.c");

        assert_eq!(f.registry.get_size(), 1);
        assert_eq!(f.registry.get_file_uid(Path::new("/src/main.c"), true), Some(id));
        assert_eq!(f.registry.get_file_uid(Path::new("/src/./main.c"), true), Some(id));
        assert_eq!(
            f.registry.get_file(Path::new("/src/main.c"), true).unwrap().id,
            id
        );
        assert!(f.registry.get_file(Path::new("/src/other.c"), false).is_none());
    }

    #[test]
    fn test_case_variant_resolves_through_alias() {
        let fs = VirtualFileSystem::case_insensitive("mac");
        fs.add_file("/a/B.h");
        let f = fixture_with(fs);
        let id = f.add("/a/b.h");

        assert!(f.registry.has_canonical_path(Path::new("/a/B.h")));
        assert_eq!(f.registry.get_file_uid(Path::new("/a/B.h"), false), Some(id));
        // tree_only skips the alias table
        assert_eq!(f.registry.get_file_uid(Path::new("/a/B.h"), true), None);
    }

    #[test]
    fn test_symlinks_as_distinct_disables_alias_fallback() {
        let fs = Arc::new(VirtualFileSystem::new("vfs"));
        fs.add_link("/inc/link.h", "/real/file.h");
        let objects = Arc::new(ObjectTable::new());
        let registry = FileRegistry::new(
            "test",
            RegistryContext {
                file_system: fs,
                resolver: objects.clone(),
                symlinks_as_distinct: true,
            },
        );
        let file = objects.create_file(Path::new("/real/file.h"));
        registry.put_file(Path::new("/real/file.h"), file.id, None);

        assert_eq!(registry.get_file_uid(Path::new("/inc/link.h"), false), None);
    }

    #[test]
    fn test_symlink_resolves_when_tracked_together() {
        let f = fixture();
        f.fs.add_link("/inc/link.h", "/real/file.h");
        let id = f.add("/real/file.h");
        assert_eq!(f.registry.get_file_uid(Path::new("/inc/link.h"), false), Some(id));
    }

    #[test]
    fn test_alias_invariant_after_puts_and_removes() {
        let f = fixture();
        f.fs.add_link("/l1.h", "/t.h");
        f.fs.add_link("/l2.h", "/t.h");

        f.add("/t.h");
        f.add("/l1.h");
        f.add("/l2.h");
        f.add("/other.h");
        assert!(f.registry.check_consistency());
        assert_eq!(f.registry.alias_count(), f.registry.get_size());

        // Re-register the same path
        f.add("/l1.h");
        assert_eq!(f.registry.get_size(), 4);
        assert!(f.registry.check_consistency());

        f.registry.remove_file(Path::new("/l2.h"));
        f.registry.remove_file(Path::new("/t.h"));
        assert!(f.registry.check_consistency());
        assert_eq!(f.registry.alias_count(), 2);

        // The remaining link still resolves through the canonical path
        assert!(f.registry.get_file_entry(Path::new("/t.h"), false).is_some());

        f.registry.remove_file(Path::new("/l1.h"));
        f.registry.remove_file(Path::new("/other.h"));
        assert_eq!(f.registry.get_size(), 0);
        assert_eq!(f.registry.alias_count(), 0);
    }

    #[test]
    fn test_remove_missing_file_is_tolerated() {
        let f = fixture();
        assert!(f.registry.remove_file(Path::new("/nope.c")).is_none());
    }

    #[test]
    fn test_missing_live_object_returns_none() {
        let f = fixture();
        let id = f.add("/gone.c");
        f.objects.remove_file(id);

        assert_eq!(f.registry.get_file_uid(Path::new("/gone.c"), true), Some(id));
        assert!(f.registry.get_file(Path::new("/gone.c"), true).is_none());
        assert!(f.registry.get_files().is_empty());
    }

    #[test]
    fn test_invalidate_preproc_state() {
        let f = fixture();
        f.add("/x.h");
        let entry = f.registry.get_lock(Path::new("/x.h")).unwrap();
        entry.set_state(
            Some(PreprocState::compile_context(vec![3])),
            ConditionState::finalized(Vec::<DeadBlock>::new()),
        );

        f.registry.invalidate_preproc_state(Path::new("/x.h"));
        let pairs = entry.state_pairs();
        assert_eq!(pairs.len(), 1);
        assert!(!pairs[0].is_valid());
        assert!(!pairs[0].condition.is_parsing());
    }

    #[test]
    fn test_placeholder_registry() {
        let f = fixture();
        let registry = FileRegistry::empty("closed", f.registry.context.clone());
        assert!(registry.put_file(Path::new("/a.c"), FileId::new(1).unwrap(), None).is_none());
        assert_eq!(registry.get_size(), 0);
    }

    #[test]
    fn test_snapshot_restores_resolvable_paths() {
        let f = fixture();
        f.fs.add_link("/inc/link.h", "/real/file.h");
        f.add("/real/file.h");
        f.add("/inc/link.h");
        f.add("/src/main.c");
        f.registry
            .get_entry(Path::new("/src/main.c"))
            .unwrap()
            .set_state(
                Some(PreprocState::compile_context(vec![9, 9])),
                ConditionState::finalized(vec![(4u32, 20u32)]),
            );

        let store = MemoryStore::new();
        f.registry.put(&store).unwrap();

        let restored: FileRegistry =
            load_component(&store, f.registry.key(), &f.registry.context)
                .unwrap()
                .unwrap();
        assert_eq!(restored.get_file_paths(), f.registry.get_file_paths());
        for path in f.registry.get_file_paths() {
            assert_eq!(
                restored.get_file_uid(&path, true),
                f.registry.get_file_uid(&path, true)
            );
            assert_eq!(
                restored.get_entry(&path).unwrap().state_pairs(),
                f.registry.get_entry(&path).unwrap().state_pairs()
            );
        }
        assert!(restored.check_consistency());
    }

    #[test]
    fn test_snapshot_from_other_filesystem_is_rejected() {
        let f = fixture();
        f.add("/a.c");
        let store = MemoryStore::new();
        f.registry.put(&store).unwrap();

        let other = RegistryContext {
            file_system: Arc::new(VirtualFileSystem::new("elsewhere")),
            resolver: f.objects.clone(),
            symlinks_as_distinct: false,
        };
        let result: StorageResult<Option<FileRegistry>> =
            load_component(&store, f.registry.key(), &other);
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_concurrent_puts_keep_invariant() {
        let f = Arc::new(fixture());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let f = f.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let path = format!("/t{t}/f{i}.c");
                        f.add(&path);
                        if i % 3 == 0 {
                            f.registry.remove_file(Path::new(&path));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(f.registry.check_consistency());
        assert_eq!(f.registry.get_size(), 4 * (50 - 17));
    }
}
