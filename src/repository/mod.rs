//! Project-scoped containers of the code-model repository.

pub mod classifiers;
pub mod decls;
pub mod entry;
pub mod files;

pub use classifiers::ClassifierIndex;
pub use decls::DeclarationSet;
pub use entry::{EntryState, FileEntry, StateData};
pub use files::{FileRegistry, RegistryContext};

use std::io::{Read, Write};

use crate::storage::{RecordReader, RecordWriter, StorageError, StorageResult};
use crate::types::{DeclKind, DeclUid, FileId};

pub(crate) fn write_decl_uid<W: Write>(out: &mut RecordWriter<W>, uid: DeclUid) -> StorageResult<()> {
    out.write_i32(uid.kind().tag())?;
    out.write_u32(uid.value())
}

pub(crate) fn read_decl_uid<R: Read>(input: &mut RecordReader<R>) -> StorageResult<DeclUid> {
    let tag = input.read_i32("uid.kind")?;
    let kind = DeclKind::from_tag(tag).ok_or(StorageError::InvalidValue {
        field: "uid.kind",
        value: tag as i64,
    })?;
    let value = input.read_u32("uid.value")?;
    DeclUid::new(value, kind).ok_or(StorageError::InvalidValue {
        field: "uid.value",
        value: 0,
    })
}

pub(crate) fn write_file_id<W: Write>(out: &mut RecordWriter<W>, id: FileId) -> StorageResult<()> {
    out.write_u32(id.value())
}

pub(crate) fn read_file_id<R: Read>(input: &mut RecordReader<R>) -> StorageResult<FileId> {
    let value = input.read_u32("file.id")?;
    FileId::new(value).ok_or(StorageError::InvalidValue {
        field: "file.id",
        value: 0,
    })
}
