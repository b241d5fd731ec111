//! Source discovery under a project root.
//!
//! Respects `.gitignore` rules and a `.csmignore` file, and keeps only files
//! in the supported languages.

use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::model::Language;

/// Walks directories to find C/C++ sources and headers.
#[derive(Debug, Clone)]
pub struct SourceWalker {
    languages: Vec<Language>,
}

impl SourceWalker {
    pub fn new(languages: Vec<Language>) -> Self {
        Self { languages }
    }

    /// Walk `root` and yield supported files.
    pub fn walk(&self, root: &Path) -> impl Iterator<Item = PathBuf> + '_ {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true) // skip hidden files and directories
            .git_ignore(true)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false)
            .add_custom_ignore_filename(".csmignore");

        builder
            .build()
            .filter_map(Result::ok) // Skip entries we can't access
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(move |path| self.languages.contains(&Language::from_path(path)))
    }
}
