//! Filesystem abstraction used for canonical path resolution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::types::FileSystemId;
use crate::utils::normalize_path;

/// Source of file identity and canonical paths.
pub trait FileSystem: Send + Sync {
    fn id(&self) -> &FileSystemId;

    /// Resolve symlinks and case variants to the physical path.
    ///
    /// Implementations fall back to the normalized input when the path cannot
    /// be resolved (missing file, permission error).
    fn canonical_path(&self, path: &Path) -> PathBuf;
}

/// The local disk, resolved through `std::fs::canonicalize`.
#[derive(Debug)]
pub struct LocalFileSystem {
    id: FileSystemId,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self {
            id: FileSystemId::local(),
        }
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for LocalFileSystem {
    fn id(&self) -> &FileSystemId {
        &self.id
    }

    fn canonical_path(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| normalize_path(path))
    }
}

/// Filesystem with explicit link and case rules.
///
/// Used for remote hosts whose layout is known up front, and in tests.
#[derive(Debug)]
pub struct VirtualFileSystem {
    id: FileSystemId,
    case_insensitive: bool,
    /// Lowercased path -> physical spelling, used when case-insensitive.
    spellings: RwLock<HashMap<String, PathBuf>>,
    /// Link path -> target.
    links: RwLock<HashMap<PathBuf, PathBuf>>,
}

impl VirtualFileSystem {
    pub fn new(name: &str) -> Self {
        Self {
            id: FileSystemId::new(name),
            case_insensitive: false,
            spellings: RwLock::new(HashMap::new()),
            links: RwLock::new(HashMap::new()),
        }
    }

    /// A case-insensitive filesystem (macOS, Windows defaults).
    pub fn case_insensitive(name: &str) -> Self {
        Self {
            case_insensitive: true,
            ..Self::new(name)
        }
    }

    /// Declare the physical spelling of a file.
    pub fn add_file(&self, path: impl Into<PathBuf>) {
        let path = normalize_path(&path.into());
        if self.case_insensitive {
            let folded = path.to_string_lossy().to_lowercase();
            self.spellings.write().insert(folded, path);
        }
    }

    /// Declare a symbolic link.
    pub fn add_link(&self, link: impl Into<PathBuf>, target: impl Into<PathBuf>) {
        self.links
            .write()
            .insert(normalize_path(&link.into()), normalize_path(&target.into()));
    }
}

impl FileSystem for VirtualFileSystem {
    fn id(&self) -> &FileSystemId {
        &self.id
    }

    fn canonical_path(&self, path: &Path) -> PathBuf {
        let mut current = normalize_path(path);
        {
            let links = self.links.read();
            // Bounded to break link cycles
            for _ in 0..32 {
                match links.get(&current) {
                    Some(target) => current = target.clone(),
                    None => break,
                }
            }
        }
        if self.case_insensitive {
            let folded = current.to_string_lossy().to_lowercase();
            if let Some(spelling) = self.spellings.read().get(&folded) {
                return spelling.clone();
            }
        }
        current
    }
}
