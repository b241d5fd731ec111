//! Common utilities shared across modules.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` segments and fold `..` into the parent.
///
/// No filesystem access; symlinks are left alone (that is what canonical
/// paths are for).
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let ends_with_parent =
                    matches!(out.components().next_back(), Some(Component::ParentDir));
                if ends_with_parent || out.as_os_str().is_empty() {
                    out.push("..");
                } else {
                    // `..` at the root stays at the root
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Normalized key string for a file path.
pub fn path_key(path: &Path) -> String {
    normalize_path(path).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c.h")), PathBuf::from("/a/c.h"));
        assert_eq!(normalize_path(Path::new("/../x.h")), PathBuf::from("/x.h"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize_path(Path::new("./")), PathBuf::from("."));
        assert_eq!(normalize_path(Path::new("../../x")), PathBuf::from("../../x"));
    }

    #[test]
    fn test_path_key() {
        assert_eq!(path_key(Path::new("/src//main.cpp")), "/src/main.cpp");
    }
}
