//! Keys tying project components to their repository unit.

use std::fmt;

use crate::types::{CompactString, compact_string};

use super::codec::{RecordReader, RecordWriter};
use super::error::{StorageError, StorageResult};

/// Which project-scoped container a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    FileRegistry,
    ClassifierIndex,
    Declarations,
}

impl ComponentKind {
    fn tag(self) -> i32 {
        match self {
            ComponentKind::FileRegistry => 1,
            ComponentKind::ClassifierIndex => 2,
            ComponentKind::Declarations => 3,
        }
    }

    fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(ComponentKind::FileRegistry),
            2 => Some(ComponentKind::ClassifierIndex),
            3 => Some(ComponentKind::Declarations),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::FileRegistry => "files",
            ComponentKind::ClassifierIndex => "classifiers",
            ComponentKind::Declarations => "decls",
        }
    }
}

/// Key record written at the head of every component snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    unit: CompactString,
    kind: ComponentKind,
}

impl ComponentKey {
    pub fn new(unit: &str, kind: ComponentKind) -> Self {
        Self {
            unit: compact_string(unit),
            kind,
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Flat key used by [`PersistentStore`](super::PersistentStore) implementations.
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.unit, self.kind.as_str())
    }

    pub fn write<W: std::io::Write>(&self, out: &mut RecordWriter<W>) -> StorageResult<()> {
        out.write_str(&self.unit)?;
        out.write_i32(self.kind.tag())
    }

    pub fn read<R: std::io::Read>(input: &mut RecordReader<R>) -> StorageResult<Self> {
        let unit = input.read_string("key.unit")?;
        let tag = input.read_i32("key.kind")?;
        let kind = ComponentKind::from_tag(tag).ok_or(StorageError::InvalidValue {
            field: "key.kind",
            value: tag as i64,
        })?;
        Ok(Self::new(&unit, kind))
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
