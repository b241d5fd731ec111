//! Build-system view of a project: native items and their languages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
    Header,
    Fortran,
    Assembler,
    Other,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("c") => Language::C,
            Some("cc" | "cpp" | "cxx" | "c++") => Language::Cpp,
            Some("h" | "hh" | "hpp" | "hxx" | "inl") => Language::Header,
            Some("f" | "f77" | "f90" | "f95" | "for") => Language::Fortran,
            Some("s" | "asm") => Language::Assembler,
            _ => Language::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Header => "header",
            Language::Fortran => "fortran",
            Language::Assembler => "assembler",
            Language::Other => "other",
        }
    }
}

/// A source item known to the build system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeItem {
    pub path: PathBuf,
    pub language: Language,
    /// Excluded from the build configuration.
    pub excluded: bool,
}

impl NativeItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let language = Language::from_path(&path);
        Self {
            path,
            language,
            excluded: false,
        }
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }
}

/// Shared handle to a native item.
pub type NativeItemRef = Arc<NativeItem>;

/// The build-system project that owns the native items.
pub trait NativeProject: Send + Sync {
    fn name(&self) -> &str;

    /// Current list of items, recomputed on every call.
    fn items(&self) -> Vec<NativeItemRef>;
}

/// Native project backed by an explicit item list.
#[derive(Debug)]
pub struct ListNativeProject {
    name: String,
    items: RwLock<Vec<NativeItemRef>>,
}

impl ListNativeProject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn add_item(&self, item: NativeItem) -> NativeItemRef {
        let item = Arc::new(item);
        self.items.write().push(item.clone());
        item
    }

    pub fn remove_item(&self, path: &Path) {
        self.items.write().retain(|i| i.path != path);
    }
}

impl NativeProject for ListNativeProject {
    fn name(&self) -> &str {
        &self.name
    }

    fn items(&self) -> Vec<NativeItemRef> {
        self.items.read().clone()
    }
}
