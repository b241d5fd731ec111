//! A project: the containers of one unit wired to storage and events.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::RepositoryConfig;
use crate::events::{CsmEvent, EventError, EventKind, ProjectEventHandler};
use crate::fs::FileSystem;
use crate::model::{ClassifierDecl, NativeItemRef, NativeProject, ObjectTable};
use crate::names::NameInterner;
use crate::preproc::{ConditionState, PreprocState};
use crate::repository::{
    ClassifierIndex, DeclarationSet, FileEntry, FileRegistry, RegistryContext,
};
use crate::storage::{
    ComponentKey, ComponentKind, PersistentStore, ProjectComponent, StorageResult, load_component,
};
use crate::utils::normalize_path;

/// Containers, live objects and collaborators of one unit.
pub struct Project {
    unit: String,
    store: Arc<dyn PersistentStore>,
    native: Arc<dyn NativeProject>,
    objects: Arc<ObjectTable>,
    names: Arc<NameInterner>,
    files: FileRegistry,
    classifiers: ClassifierIndex,
    /// Files waiting for a reparse, in arrival order.
    reparse: Mutex<IndexSet<PathBuf>>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("unit", &self.unit)
            .field("files", &self.files)
            .field("classifiers", &self.classifiers.len())
            .finish()
    }
}

impl Project {
    /// Open `unit`, restoring its containers from `store` when snapshots exist.
    ///
    /// A corrupt snapshot fails the open; a missing one yields empty containers.
    pub fn open(
        unit: &str,
        store: Arc<dyn PersistentStore>,
        file_system: Arc<dyn FileSystem>,
        native: Arc<dyn NativeProject>,
        config: &RepositoryConfig,
    ) -> StorageResult<Self> {
        let objects = Arc::new(ObjectTable::new());
        let names = Arc::new(NameInterner::new());
        let context = RegistryContext {
            file_system,
            resolver: objects.clone(),
            symlinks_as_distinct: config.symlinks_as_distinct_files,
        };

        let files_key = ComponentKey::new(unit, ComponentKind::FileRegistry);
        let files = match load_component::<FileRegistry>(store.as_ref(), &files_key, &context)? {
            Some(files) => {
                for entry in files.entries() {
                    objects.attach_file(entry.file_id(), Path::new(entry.path()));
                }
                files
            }
            None => FileRegistry::new(unit, context),
        };

        let classifiers_key = ComponentKey::new(unit, ComponentKind::ClassifierIndex);
        let classifiers = load_component::<ClassifierIndex>(store.as_ref(), &classifiers_key, &names)?
            .unwrap_or_else(|| ClassifierIndex::new(unit, names.clone()));

        let decls_key = ComponentKey::new(unit, ComponentKind::Declarations);
        if let Some(decls) = load_component::<DeclarationSet>(store.as_ref(), &decls_key, &())? {
            decls.restore(&objects);
        }
        // Stored index entries may outlive their objects; never hand out their ids again
        objects.reserve_decl_uid(classifiers.max_decl_value());

        crate::log_event!(
            "repository",
            "opened",
            "{unit}: {} files, {} classifiers",
            files.get_size(),
            classifiers.len()
        );

        Ok(Self {
            unit: unit.to_string(),
            store,
            native,
            objects,
            names,
            files,
            classifiers,
            reparse: Mutex::new(IndexSet::new()),
        })
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn files(&self) -> &FileRegistry {
        &self.files
    }

    pub fn classifiers(&self) -> &ClassifierIndex {
        &self.classifiers
    }

    pub fn objects(&self) -> &Arc<ObjectTable> {
        &self.objects
    }

    pub fn names(&self) -> &Arc<NameInterner> {
        &self.names
    }

    /// Register `path` with a fresh identifier.
    ///
    /// A path that is already registered keeps its entry untouched: its parse
    /// contexts and modification counter survive, and `state` is ignored.
    pub fn register_file(&self, path: &Path, state: Option<PreprocState>) -> Option<Arc<FileEntry>> {
        if let Some(entry) = self.files.get_entry(path) {
            return Some(entry);
        }
        let id = self.objects.create_file(&normalize_path(path)).id;
        self.files.put_file(path, id, state)
    }

    /// Forget `path` and every declaration it produced.
    pub fn remove_file(&self, path: &Path) -> bool {
        let Some(entry) = self.files.remove_file(path) else {
            return false;
        };
        for decl in self.objects.remove_file(entry.file_id()) {
            self.classifiers.remove_classifier(&decl);
        }
        self.reparse.lock().shift_remove(&normalize_path(path));
        true
    }

    /// Record the outcome of parsing `path`: its parse context and the
    /// classifiers it declares, replacing those of the previous parse.
    pub fn apply_parse_result(
        &self,
        path: &Path,
        state: Option<PreprocState>,
        condition: ConditionState,
        decls: Vec<ClassifierDecl>,
    ) -> bool {
        let Some(entry) = self.files.get_lock(path) else {
            tracing::warn!("[repository] parse result for unknown file {}", path.display());
            return false;
        };
        let id = entry.file_id();
        let accepted = entry.set_state(state, condition);

        for old in self.objects.take_file_decls(id) {
            self.classifiers.remove_classifier(&old);
        }
        for decl in decls {
            let decl = self.objects.add_decl(decl.in_file(id));
            self.classifiers.put_classifier(&decl);
        }
        self.reparse.lock().shift_remove(&normalize_path(path));
        accepted
    }

    /// Invalidate the parse contexts of `path` and queue it for reparse.
    pub fn file_changed(&self, path: &Path) -> bool {
        let Some(entry) = self.files.get_lock(path) else {
            tracing::debug!("[repository] change of untracked {}", path.display());
            return false;
        };
        {
            let mut state = entry.lock();
            state.invalidate_states();
            state.mark_as_parsing();
        }
        self.queue_reparse(path);
        true
    }

    fn queue_reparse(&self, path: &Path) {
        self.reparse.lock().insert(normalize_path(path));
    }

    /// Files waiting for a reparse, oldest first. Empties the queue.
    pub fn take_reparse_queue(&self) -> Vec<PathBuf> {
        self.reparse.lock().drain(..).collect()
    }

    /// Write the file registry, the classifier index and the declarations
    /// behind it to the store.
    pub fn save(&self) -> StorageResult<()> {
        self.files.put(self.store.as_ref())?;
        self.classifiers.put(self.store.as_ref())?;
        DeclarationSet::capture(&self.unit, &self.objects).put(self.store.as_ref())?;
        crate::debug_event!("repository", "saved", "{}", self.unit);
        Ok(())
    }

    /// Snapshot of the containers for display.
    pub fn summary(&self) -> ProjectSummary {
        let files = self
            .files
            .get_file_paths()
            .into_iter()
            .filter_map(|path| self.files.get_entry(&path))
            .map(|entry| {
                let pairs = entry.state_pairs();
                FileSummary {
                    path: entry.path().to_string(),
                    canonical: entry.canonical_path().to_string(),
                    id: entry.file_id().value(),
                    mod_count: entry.mod_count(),
                    contexts: pairs.len(),
                    valid: pairs.iter().any(|p| p.is_valid()),
                    parsing: pairs.iter().any(|p| p.condition.is_parsing()),
                }
            })
            .collect();
        ProjectSummary {
            unit: self.unit.clone(),
            files,
            classifiers: self.classifiers.classifier_names().iter().map(|n| n.to_string()).collect(),
            typedefs: self.classifiers.typedef_names().iter().map(|n| n.to_string()).collect(),
        }
    }

    fn remove_under(&self, root: &Path) -> usize {
        let root = normalize_path(root);
        self.files
            .get_file_paths()
            .into_iter()
            .filter(|path| path.starts_with(&root))
            .filter(|path| self.remove_file(path))
            .count()
    }

    fn add_item(&self, item: Option<&NativeItemRef>, path: &Path) {
        if item.is_some_and(|i| i.excluded) {
            tracing::debug!("[repository] skip excluded {}", path.display());
            return;
        }
        // A known file showing up again (rename over it, re-added item) is a change
        if self.file_changed(path) {
            return;
        }
        self.register_file(path, None);
        self.queue_reparse(path);
    }
}

impl ProjectEventHandler for Project {
    fn name(&self) -> &str {
        &self.unit
    }

    fn native_items(&self) -> Vec<NativeItemRef> {
        self.native.items()
    }

    fn on_project_deleted(&self) -> Result<(), EventError> {
        self.files.clear();
        self.classifiers.clear();
        self.objects.clear();
        self.reparse.lock().clear();
        self.store.remove(self.files.key())?;
        self.store.remove(self.classifiers.key())?;
        self.store
            .remove(&ComponentKey::new(&self.unit, ComponentKind::Declarations))?;
        crate::log_event!("repository", "deleted", "{}", self.unit);
        Ok(())
    }

    fn on_renamed(&self, deleted: &[CsmEvent], created: &[CsmEvent]) -> Result<(), EventError> {
        for event in deleted {
            self.remove_file(&event.path);
        }
        for event in created {
            self.add_item(event.item.as_ref(), &event.path);
        }
        Ok(())
    }

    fn on_all_items_changed(&self, items: &[NativeItemRef]) -> Result<(), EventError> {
        for item in items {
            self.add_item(Some(item), &item.path);
        }
        Ok(())
    }

    fn on_changed(&self, events: &[CsmEvent]) -> Result<(), EventError> {
        for event in events {
            self.file_changed(&event.path);
        }
        Ok(())
    }

    fn on_item_property_changed(&self, events: &[CsmEvent]) -> Result<(), EventError> {
        for event in events {
            match &event.item {
                Some(item) if item.excluded => {
                    self.remove_file(&event.path);
                }
                _ => self.add_item(event.item.as_ref(), &event.path),
            }
        }
        Ok(())
    }

    fn on_created(&self, events: &[CsmEvent]) -> Result<(), EventError> {
        for event in events {
            self.add_item(None, &event.path);
        }
        Ok(())
    }

    fn on_item_added(&self, events: &[CsmEvent]) -> Result<(), EventError> {
        for event in events {
            self.add_item(event.item.as_ref(), &event.path);
        }
        Ok(())
    }

    fn check_for_removed(&self, removed: &[CsmEvent]) -> Result<(), EventError> {
        for event in removed {
            match event.kind {
                EventKind::SourceRootFilesDeleted => {
                    let count = self.remove_under(&event.path);
                    tracing::debug!(
                        "[repository] {count} files removed under {}",
                        event.path.display()
                    );
                }
                _ => {
                    self.remove_file(&event.path);
                }
            }
        }
        self.save()?;
        Ok(())
    }
}

/// Display form of a project, used by `csmrepo dump`.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub unit: String,
    pub files: Vec<FileSummary>,
    pub classifiers: Vec<String>,
    pub typedefs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub path: String,
    pub canonical: String,
    pub id: u32,
    pub mod_count: i32,
    pub contexts: usize,
    pub valid: bool,
    pub parsing: bool,
}
