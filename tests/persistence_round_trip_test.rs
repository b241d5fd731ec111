//! Containers written to a directory store come back identical.

use std::path::Path;
use std::sync::Arc;

use csm_repository::fs::VirtualFileSystem;
use csm_repository::model::{ClassifierDecl, ObjectTable, ScopeKind};
use csm_repository::names::NameInterner;
use csm_repository::preproc::{ConditionState, PreprocState, StatePair};
use csm_repository::repository::RegistryContext;
use csm_repository::storage::{
    ComponentKey, ComponentKind, DirectoryStore, PersistentStore, load_component,
};
use csm_repository::{ClassifierIndex, DeclKind, FileRegistry, ProjectComponent, StorageError};
use tempfile::TempDir;

fn registry_context(fs: Arc<VirtualFileSystem>, objects: Arc<ObjectTable>) -> RegistryContext {
    RegistryContext {
        file_system: fs,
        resolver: objects,
        symlinks_as_distinct: false,
    }
}

#[test]
fn test_file_registry_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path().join("repo")).unwrap();

    let fs = Arc::new(VirtualFileSystem::case_insensitive("mac"));
    fs.add_file("/proj/include/Config.h");
    fs.add_link("/proj/alias/config.h", "/proj/include/Config.h");
    let objects = Arc::new(ObjectTable::new());
    let context = registry_context(fs, objects.clone());
    let registry = FileRegistry::new("app", context.clone());

    for path in ["/proj/src/main.c", "/proj/include/config.h", "/proj/alias/config.h"] {
        let file = objects.create_file(Path::new(path));
        registry.put_file(Path::new(path), file.id, Some(PreprocState::fallback(vec![0xab])));
    }
    // A header seen under two macro configurations
    registry.get_entry(Path::new("/proj/include/config.h")).unwrap().set_states(
        vec![
            StatePair::new(
                Some(PreprocState::compile_context(vec![1])),
                ConditionState::finalized(vec![(10u32, 40u32)]),
            ),
            StatePair::new(
                Some(PreprocState::compile_context(vec![2])),
                ConditionState::finalized(Vec::<(u32, u32)>::new()),
            ),
        ],
        None,
    );
    registry.put(&store).unwrap();

    let restored: FileRegistry = load_component(&store, registry.key(), &context)
        .unwrap()
        .expect("snapshot present");

    assert_eq!(restored.get_file_paths(), registry.get_file_paths());
    for path in registry.get_file_paths() {
        let before = registry.get_entry(&path).unwrap();
        let after = restored.get_entry(&path).unwrap();
        assert_eq!(after.file_id(), before.file_id());
        assert_eq!(after.canonical_path(), before.canonical_path());
        assert_eq!(after.mod_count(), before.mod_count());
        assert_eq!(after.state_pairs(), before.state_pairs());
    }
    assert!(restored.check_consistency());
    // Both spellings share one canonical path
    assert!(restored.has_canonical_path(Path::new("/proj/include/Config.h")));
    let via_alias = restored
        .get_file_uid(Path::new("/PROJ/include/CONFIG.h"), false)
        .expect("resolved through canonical path");
    let aliases = [
        registry.get_file_uid(Path::new("/proj/include/config.h"), true),
        registry.get_file_uid(Path::new("/proj/alias/config.h"), true),
    ];
    assert!(aliases.contains(&Some(via_alias)));
    assert_eq!(
        restored.get_file_uid(Path::new("/PROJ/include/CONFIG.h"), true),
        None
    );
}

#[test]
fn test_classifier_index_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path()).unwrap();
    let names = Arc::new(NameInterner::new());
    let objects = ObjectTable::new();
    let index = ClassifierIndex::new("app", names.clone());

    let base = ClassifierDecl::new(objects.allocate_decl_uid(DeclKind::Class), "Base")
        .in_scope(ScopeKind::Namespace, "ui");
    let derived = ClassifierDecl::new(objects.allocate_decl_uid(DeclKind::Class), "Button")
        .in_scope(ScopeKind::Namespace, "ui")
        .with_base("ui::Base");
    let nested = ClassifierDecl::new(objects.allocate_decl_uid(DeclKind::Struct), "inner")
        .in_scope(ScopeKind::Struct, "outer");
    let alias = ClassifierDecl::new(objects.allocate_decl_uid(DeclKind::Typedef), "handle_t");
    for decl in [&base, &derived, &nested, &alias] {
        index.put_classifier(decl);
    }
    index.put(&store).unwrap();

    let restored: ClassifierIndex = load_component(&store, index.key(), &names)
        .unwrap()
        .unwrap();
    for name in ["ui::Base", "ui::Button", "outer::inner", "inner", "handle_t"] {
        assert_eq!(restored.get_classifier(name), index.get_classifier(name), "{name}");
    }
    assert_eq!(restored.get_inheritances("Base"), vec![derived.uid]);
    assert_eq!(restored.classifier_names(), index.classifier_names());
}

#[test]
fn test_truncated_record_fails_load() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path()).unwrap();
    let names = Arc::new(NameInterner::new());
    let index = ClassifierIndex::new("app", names.clone());
    let objects = ObjectTable::new();
    index.put_classifier(&ClassifierDecl::new(
        objects.allocate_decl_uid(DeclKind::Class),
        "A",
    ));

    let record = index.to_record().unwrap();
    store
        .put(index.key(), record[..record.len() - 3].to_vec())
        .unwrap();

    let result: Result<Option<ClassifierIndex>, _> = load_component(&store, index.key(), &names);
    assert!(matches!(result, Err(StorageError::Corrupt { .. })));
}

#[test]
fn test_record_under_wrong_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path()).unwrap();
    let names = Arc::new(NameInterner::new());
    let index = ClassifierIndex::new("app", names.clone());
    let other = ComponentKey::new("lib", ComponentKind::ClassifierIndex);
    store.put(&other, index.to_record().unwrap()).unwrap();

    let result: Result<Option<ClassifierIndex>, _> = load_component(&store, &other, &names);
    assert!(matches!(result, Err(StorageError::KeyMismatch { .. })));
}

#[test]
fn test_placeholders_are_not_stored() {
    let dir = TempDir::new().unwrap();
    let store = DirectoryStore::open(dir.path()).unwrap();
    let placeholder = ClassifierIndex::empty("closed");
    placeholder.put(&store).unwrap();

    assert!(store.get(placeholder.key()).unwrap().is_none());
    assert!(matches!(
        placeholder.to_record(),
        Err(StorageError::EmptyContainer(_))
    ));
}
