//! Name interning for short and qualified names.
//!
//! Classifier maps hold many copies of the same names (every reparse
//! re-registers them), so names are stored once per pool and shared.

use std::sync::Arc;

use dashmap::DashMap;

/// Interned name.
pub type Name = Arc<str>;

/// Two interning pools: simple names and fully-qualified names.
#[derive(Debug, Default)]
pub struct NameInterner {
    short: DashMap<Name, ()>,
    qualified: DashMap<Name, ()>,
}

impl NameInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an unqualified name (`Foo`).
    pub fn short(&self, name: &str) -> Name {
        Self::intern(&self.short, name)
    }

    /// Intern a qualified name (`ns::Outer::Foo`).
    pub fn qualified(&self, name: &str) -> Name {
        Self::intern(&self.qualified, name)
    }

    fn intern(pool: &DashMap<Name, ()>, name: &str) -> Name {
        if let Some(existing) = pool.get(name) {
            return existing.key().clone();
        }
        pool.entry(Name::from(name)).or_insert(()).key().clone()
    }

    pub fn short_count(&self) -> usize {
        self.short.len()
    }

    pub fn qualified_count(&self) -> usize {
        self.qualified.len()
    }
}

/// Last `::` segment of a possibly qualified name.
///
/// Separators inside template argument lists are skipped, so
/// `ns::Base<a::b>` yields `Base<a::b>`.
pub fn simple_name(name: &str) -> &str {
    let bytes = name.as_bytes();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth -= 1,
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                start = i + 2;
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    &name[start..]
}
