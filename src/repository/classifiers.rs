//! Classifier and typedef lookup index of a project.
//!
//! Three name maps (full classifiers, C nested-struct short names, typedefs)
//! and an inheritance map keyed by the simple name of each base class. All
//! four are guarded by one lock so a classifier never becomes visible without
//! its inheritance edges.

use std::collections::{BTreeSet, HashMap};
use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::{ClassifierDecl, ObjectResolver};
use crate::names::{Name, NameInterner, simple_name};
use crate::storage::{
    ComponentKey, ComponentKind, ComponentRead, ProjectComponent, RecordReader, RecordWriter,
    StorageResult,
};
use crate::types::DeclUid;

use super::{read_decl_uid, write_decl_uid};

#[derive(Debug, Default)]
struct ClassifierMaps {
    classifiers: HashMap<Name, DeclUid>,
    short_classifiers: HashMap<Name, DeclUid>,
    typedefs: HashMap<Name, DeclUid>,
    inheritances: HashMap<Name, BTreeSet<DeclUid>>,
}

/// Concurrent classifier index.
#[derive(Debug)]
pub struct ClassifierIndex {
    key: ComponentKey,
    names: Arc<NameInterner>,
    maps: RwLock<ClassifierMaps>,
    /// Placeholder for a project whose index is not available. Mutators are
    /// no-ops and the index is never stored.
    placeholder: bool,
}

/// Key of the inheritance map: simple name without template arguments.
fn inheritance_key(name: &str) -> &str {
    let simple = simple_name(name.trim());
    match simple.find('<') {
        Some(pos) => simple[..pos].trim_end(),
        None => simple,
    }
}

/// Insert honoring forward-declaration precedence.
///
/// An existing entry is replaced only when it is a forward declaration and
/// the new one is not.
fn put_uid(map: &mut HashMap<Name, DeclUid>, name: Name, uid: DeclUid) -> bool {
    match map.get(&name) {
        None => {
            map.insert(name, uid);
            true
        }
        Some(old) if old.is_forward() && !uid.is_forward() => {
            map.insert(name, uid);
            true
        }
        Some(_) => false,
    }
}

/// Remove only if the stored identifier is the one being removed.
fn remove_uid(map: &mut HashMap<Name, DeclUid>, name: &str, uid: DeclUid) -> bool {
    if map.get(name) == Some(&uid) {
        map.remove(name);
        true
    } else {
        false
    }
}

impl ClassifierIndex {
    pub fn new(unit: &str, names: Arc<NameInterner>) -> Self {
        Self {
            key: ComponentKey::new(unit, ComponentKind::ClassifierIndex),
            names,
            maps: RwLock::new(ClassifierMaps::default()),
            placeholder: false,
        }
    }

    /// The empty placeholder index.
    pub fn empty(unit: &str) -> Self {
        Self {
            placeholder: true,
            ..Self::new(unit, Arc::new(NameInterner::new()))
        }
    }

    pub fn is_empty_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Register a declaration. Returns whether any map changed.
    pub fn put_classifier(&self, decl: &ClassifierDecl) -> bool {
        if self.placeholder {
            return false;
        }
        let uid = decl.uid;
        let qn = self.names.qualified(&decl.qualified_name());

        if decl.kind().is_typedef() {
            let changed = put_uid(&mut self.maps.write().typedefs, qn, uid);
            tracing::trace!("[classifiers] put typedef {uid} changed={changed}");
            return changed;
        }

        let short = decl
            .c_struct_short_name()
            .map(|name| self.names.qualified(&name));
        let bases: Vec<Name> = if decl.kind().is_class() {
            decl.base_classes
                .iter()
                .map(|b| self.names.short(inheritance_key(b)))
                .collect()
        } else {
            Vec::new()
        };

        let mut maps = self.maps.write();
        let mut changed = put_uid(&mut maps.classifiers, qn, uid);
        if let Some(short) = short {
            changed |= put_uid(&mut maps.short_classifiers, short, uid);
        }
        for base in bases {
            changed |= maps.inheritances.entry(base).or_default().insert(uid);
        }
        tracing::trace!("[classifiers] put {uid} changed={changed}");
        changed
    }

    /// Unregister a declaration. Returns whether any map changed.
    pub fn remove_classifier(&self, decl: &ClassifierDecl) -> bool {
        if self.placeholder {
            return false;
        }
        let uid = decl.uid;
        let qn = decl.qualified_name();

        if decl.kind().is_typedef() {
            return remove_uid(&mut self.maps.write().typedefs, &qn, uid);
        }

        let short = decl.c_struct_short_name();
        let mut maps = self.maps.write();
        let mut changed = remove_uid(&mut maps.classifiers, &qn, uid);
        if let Some(short) = short {
            changed |= remove_uid(&mut maps.short_classifiers, &short, uid);
        }
        if decl.kind().is_class() {
            for base in &decl.base_classes {
                let key = inheritance_key(base);
                if let Some(set) = maps.inheritances.get_mut(key) {
                    changed |= set.remove(&uid);
                    if set.is_empty() {
                        maps.inheritances.remove(key);
                    }
                }
            }
        }
        tracing::trace!("[classifiers] remove {uid} changed={changed}");
        changed
    }

    /// Look up by qualified name: classifiers, then short names, then typedefs.
    pub fn get_classifier(&self, qualified_name: &str) -> Option<DeclUid> {
        let maps = self.maps.read();
        maps.classifiers
            .get(qualified_name)
            .or_else(|| maps.short_classifiers.get(qualified_name))
            .or_else(|| maps.typedefs.get(qualified_name))
            .copied()
    }

    /// Look up and resolve to the live declaration.
    ///
    /// A stored identifier without a live object is a repository
    /// inconsistency; it is reported and `None` returned.
    pub fn resolve_classifier(
        &self,
        qualified_name: &str,
        resolver: &dyn ObjectResolver,
    ) -> Option<Arc<ClassifierDecl>> {
        let uid = self.get_classifier(qualified_name)?;
        let decl = resolver.resolve_decl(uid);
        if decl.is_none() {
            tracing::warn!(
                "[classifiers] repository inconsistency: {qualified_name} -> {uid} has no live object"
            );
        }
        decl
    }

    /// Classes deriving from `name`. Qualification is ignored.
    pub fn get_inheritances(&self, name: &str) -> Vec<DeclUid> {
        let key = inheritance_key(name);
        self.maps
            .read()
            .inheritances
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of classifier and typedef entries (short names excluded).
    pub fn len(&self) -> usize {
        let maps = self.maps.read();
        maps.classifiers.len() + maps.typedefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn classifier_names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.maps.read().classifiers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn typedef_names(&self) -> Vec<Name> {
        let mut names: Vec<Name> = self.maps.read().typedefs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Highest identifier value referenced by any map, 0 when empty.
    pub fn max_decl_value(&self) -> u32 {
        let maps = self.maps.read();
        maps.classifiers
            .values()
            .chain(maps.short_classifiers.values())
            .chain(maps.typedefs.values())
            .chain(maps.inheritances.values().flatten())
            .map(|uid| uid.value())
            .max()
            .unwrap_or(0)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if self.placeholder {
            return;
        }
        *self.maps.write() = ClassifierMaps::default();
    }

    fn write_map<W: Write>(
        out: &mut RecordWriter<W>,
        map: &HashMap<Name, DeclUid>,
    ) -> StorageResult<()> {
        let mut entries: Vec<_> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        out.write_len(entries.len())?;
        for (name, uid) in entries {
            out.write_str(name)?;
            write_decl_uid(out, *uid)?;
        }
        Ok(())
    }

    fn read_map<R: Read>(
        input: &mut RecordReader<R>,
        names: &NameInterner,
    ) -> StorageResult<HashMap<Name, DeclUid>> {
        let count = input.read_len("classifiers.count")?;
        let mut map = HashMap::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            let name = names.qualified(&input.read_string("classifiers.name")?);
            let uid = read_decl_uid(input)?;
            map.insert(name, uid);
        }
        Ok(map)
    }
}

impl ProjectComponent for ClassifierIndex {
    fn key(&self) -> &ComponentKey {
        &self.key
    }

    fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    fn write_fields<W: Write>(&self, out: &mut RecordWriter<W>) -> StorageResult<()> {
        let maps = self.maps.read();
        Self::write_map(out, &maps.classifiers)?;
        Self::write_map(out, &maps.short_classifiers)?;
        Self::write_map(out, &maps.typedefs)?;

        let mut inheritances: Vec<_> = maps.inheritances.iter().collect();
        inheritances.sort_by(|a, b| a.0.cmp(b.0));
        out.write_len(inheritances.len())?;
        for (name, uids) in inheritances {
            out.write_str(name)?;
            out.write_len(uids.len())?;
            for uid in uids {
                write_decl_uid(out, *uid)?;
            }
        }
        Ok(())
    }
}

impl ComponentRead for ClassifierIndex {
    type Context = Arc<NameInterner>;

    fn read_fields<R: Read>(
        key: ComponentKey,
        input: &mut RecordReader<R>,
        names: &Self::Context,
    ) -> StorageResult<Self> {
        let classifiers = Self::read_map(input, names)?;
        let short_classifiers = Self::read_map(input, names)?;
        let typedefs = Self::read_map(input, names)?;

        let count = input.read_len("inheritances.count")?;
        let mut inheritances = HashMap::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            let name = names.short(&input.read_string("inheritances.name")?);
            let size = input.read_len("inheritances.size")?;
            let mut uids = BTreeSet::new();
            for _ in 0..size {
                uids.insert(read_decl_uid(input)?);
            }
            inheritances.insert(name, uids);
        }

        Ok(Self {
            key,
            names: names.clone(),
            maps: RwLock::new(ClassifierMaps {
                classifiers,
                short_classifiers,
                typedefs,
                inheritances,
            }),
            placeholder: false,
        })
    }
}
