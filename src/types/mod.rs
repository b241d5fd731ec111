use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Persistent identifier of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(NonZeroU32);

/// Persistent identifier of a classifier declaration.
///
/// The declaration kind travels with the identifier so that the index can tell
/// a forward declaration from a definition without resolving the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclUid {
    id: NonZeroU32,
    kind: DeclKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeclKind {
    Class,
    Struct,
    Union,
    Enum,
    Typedef,
    TypeAlias,
    ForwardClass,
    ForwardEnum,
}

/// Identity of the filesystem a file lives on (local disk, remote host, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileSystemId(CompactString);

impl FileId {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn value(&self) -> u32 {
        self.0.get()
    }

    /// Convert to the underlying u32 value
    pub fn to_u32(self) -> u32 {
        self.0.get()
    }
}

impl DeclUid {
    pub fn new(value: u32, kind: DeclKind) -> Option<Self> {
        NonZeroU32::new(value).map(|id| Self { id, kind })
    }

    pub fn value(&self) -> u32 {
        self.id.get()
    }

    pub fn kind(&self) -> DeclKind {
        self.kind
    }

    pub fn is_forward(&self) -> bool {
        self.kind.is_forward()
    }
}

impl fmt::Display for DeclUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.id)
    }
}

impl DeclKind {
    pub fn is_forward(self) -> bool {
        matches!(self, DeclKind::ForwardClass | DeclKind::ForwardEnum)
    }

    pub fn is_typedef(self) -> bool {
        matches!(self, DeclKind::Typedef | DeclKind::TypeAlias)
    }

    /// Class-like kinds that may carry base classes.
    pub fn is_class(self) -> bool {
        matches!(self, DeclKind::Class | DeclKind::Struct | DeclKind::Union)
    }

    /// Stable tag used by the repository wire format.
    pub fn tag(self) -> i32 {
        match self {
            DeclKind::Class => 1,
            DeclKind::Struct => 2,
            DeclKind::Union => 3,
            DeclKind::Enum => 4,
            DeclKind::Typedef => 5,
            DeclKind::TypeAlias => 6,
            DeclKind::ForwardClass => 7,
            DeclKind::ForwardEnum => 8,
        }
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        Some(match tag {
            1 => DeclKind::Class,
            2 => DeclKind::Struct,
            3 => DeclKind::Union,
            4 => DeclKind::Enum,
            5 => DeclKind::Typedef,
            6 => DeclKind::TypeAlias,
            7 => DeclKind::ForwardClass,
            8 => DeclKind::ForwardEnum,
            _ => return None,
        })
    }
}

impl FileSystemId {
    pub fn new(name: &str) -> Self {
        Self(compact_string(name))
    }

    /// The local disk.
    pub fn local() -> Self {
        Self::new("local")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileSystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type CompactString = Box<str>;

pub fn compact_string(s: &str) -> CompactString {
    s.into()
}
