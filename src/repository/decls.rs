//! Declaration objects of a project, stored next to the classifier index.
//!
//! The index only holds identifiers. Without the objects behind them a
//! reopened project could neither tell which file produced an entry nor keep
//! new identifiers from colliding with stored ones.

use std::io::{Read, Write};

use crate::model::{ClassifierDecl, ObjectTable, Scope, ScopeKind};
use crate::storage::{
    ComponentKey, ComponentKind, ComponentRead, ProjectComponent, RecordReader, RecordWriter,
    StorageError, StorageResult,
};

use super::{read_decl_uid, read_file_id, write_decl_uid, write_file_id};

/// Snapshot of the declaration objects of one unit.
#[derive(Debug)]
pub struct DeclarationSet {
    key: ComponentKey,
    decls: Vec<ClassifierDecl>,
}

impl DeclarationSet {
    /// Copy the declarations currently held by `objects`.
    pub fn capture(unit: &str, objects: &ObjectTable) -> Self {
        Self {
            key: ComponentKey::new(unit, ComponentKind::Declarations),
            decls: objects.decls(),
        }
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Put every declaration back into `objects`, with its owning file.
    pub fn restore(self, objects: &ObjectTable) -> usize {
        let count = self.decls.len();
        for decl in self.decls {
            objects.restore_decl(decl);
        }
        count
    }
}

fn scope_tag(kind: ScopeKind) -> i32 {
    match kind {
        ScopeKind::Namespace => 1,
        ScopeKind::Class => 2,
        ScopeKind::Struct => 3,
        ScopeKind::Union => 4,
        ScopeKind::Function => 5,
    }
}

fn scope_from_tag(tag: i32) -> Option<ScopeKind> {
    Some(match tag {
        1 => ScopeKind::Namespace,
        2 => ScopeKind::Class,
        3 => ScopeKind::Struct,
        4 => ScopeKind::Union,
        5 => ScopeKind::Function,
        _ => return None,
    })
}

fn write_decl<W: Write>(out: &mut RecordWriter<W>, decl: &ClassifierDecl) -> StorageResult<()> {
    write_decl_uid(out, decl.uid)?;
    out.write_str(&decl.name)?;
    out.write_len(decl.scopes.len())?;
    for scope in &decl.scopes {
        out.write_i32(scope_tag(scope.kind))?;
        out.write_str(&scope.name)?;
    }
    out.write_bool(decl.is_template)?;
    out.write_len(decl.base_classes.len())?;
    for base in &decl.base_classes {
        out.write_str(base)?;
    }
    out.write_bool(decl.file.is_some())?;
    if let Some(file) = decl.file {
        write_file_id(out, file)?;
    }
    Ok(())
}

fn read_decl<R: Read>(input: &mut RecordReader<R>) -> StorageResult<ClassifierDecl> {
    let uid = read_decl_uid(input)?;
    let name = input.read_string("decl.name")?;
    let count = input.read_len("decl.scopes")?;
    let mut scopes = Vec::with_capacity(count.min(16));
    for _ in 0..count {
        let tag = input.read_i32("scope.kind")?;
        let kind = scope_from_tag(tag).ok_or(StorageError::InvalidValue {
            field: "scope.kind",
            value: tag as i64,
        })?;
        scopes.push(Scope {
            kind,
            name: input.read_string("scope.name")?,
        });
    }
    let is_template = input.read_bool("decl.template")?;
    let count = input.read_len("decl.bases")?;
    let mut base_classes = Vec::with_capacity(count.min(16));
    for _ in 0..count {
        base_classes.push(input.read_string("decl.base")?);
    }
    let file = if input.read_bool("decl.has_file")? {
        Some(read_file_id(input)?)
    } else {
        None
    };
    Ok(ClassifierDecl {
        uid,
        name,
        scopes,
        is_template,
        base_classes,
        file,
    })
}

impl ProjectComponent for DeclarationSet {
    fn key(&self) -> &ComponentKey {
        &self.key
    }

    fn write_fields<W: Write>(&self, out: &mut RecordWriter<W>) -> StorageResult<()> {
        out.write_len(self.decls.len())?;
        for decl in &self.decls {
            write_decl(out, decl)?;
        }
        Ok(())
    }
}

impl ComponentRead for DeclarationSet {
    type Context = ();

    fn read_fields<R: Read>(
        key: ComponentKey,
        input: &mut RecordReader<R>,
        _context: &Self::Context,
    ) -> StorageResult<Self> {
        let count = input.read_len("decls.count")?;
        let mut decls = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            decls.push(read_decl(input)?);
        }
        Ok(Self { key, decls })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectResolver;
    use crate::storage::{MemoryStore, load_component};
    use crate::types::DeclKind;
    use std::path::Path;

    #[test]
    fn test_restore_rebuilds_file_ownership() {
        let table = ObjectTable::new();
        let file = table.create_file(Path::new("/a.h"));
        let uid = table.allocate_decl_uid(DeclKind::Struct);
        table.add_decl(
            ClassifierDecl::new(uid, "Node")
                .in_scope(ScopeKind::Namespace, "list")
                .in_scope(ScopeKind::Struct, "Outer")
                .with_base("Base<int>")
                .template()
                .in_file(file.id),
        );
        let loose = table.allocate_decl_uid(DeclKind::Typedef);
        table.add_decl(ClassifierDecl::new(loose, "size_type"));

        let store = MemoryStore::new();
        let set = DeclarationSet::capture("app", &table);
        set.put(&store).unwrap();

        let restored: DeclarationSet = load_component(&store, set.key(), &()).unwrap().unwrap();
        assert_eq!(restored.len(), 2);
        let fresh = ObjectTable::new();
        assert_eq!(restored.restore(&fresh), 2);

        assert_eq!(fresh.resolve_decl(uid), table.resolve_decl(uid));
        assert_eq!(fresh.resolve_decl(loose), table.resolve_decl(loose));
        let taken = fresh.take_file_decls(file.id);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].uid, uid);
    }

    #[test]
    fn test_unknown_scope_tag_is_rejected() {
        let mut w = RecordWriter::buffer();
        write_decl_uid(&mut w, crate::types::DeclUid::new(3, DeclKind::Class).unwrap()).unwrap();
        w.write_str("A").unwrap();
        w.write_len(1).unwrap();
        w.write_i32(9).unwrap();
        let bytes = w.into_inner();

        let mut r = RecordReader::new(bytes.as_slice());
        assert!(matches!(
            read_decl(&mut r),
            Err(StorageError::InvalidValue { field: "scope.kind", .. })
        ));
    }
}
