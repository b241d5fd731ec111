//! Classifier declarations as seen by the index.

use crate::types::{DeclKind, DeclUid, FileId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Namespace,
    Class,
    Struct,
    Union,
    Function,
}

impl ScopeKind {
    fn is_c_struct(self) -> bool {
        matches!(self, ScopeKind::Struct | ScopeKind::Union)
    }
}

/// One enclosing scope of a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: String,
}

/// A parsed classifier (class, struct, union, enum, typedef, alias).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierDecl {
    pub uid: DeclUid,
    /// Unqualified name.
    pub name: String,
    /// Enclosing scopes, outermost first. Empty for the global namespace.
    pub scopes: Vec<Scope>,
    pub is_template: bool,
    /// Base-class names as written in the inheritance clause.
    pub base_classes: Vec<String>,
    /// File containing the declaration, if known.
    pub file: Option<FileId>,
}

impl ClassifierDecl {
    pub fn new(uid: DeclUid, name: &str) -> Self {
        Self {
            uid,
            name: name.to_string(),
            scopes: Vec::new(),
            is_template: false,
            base_classes: Vec::new(),
            file: None,
        }
    }

    /// Nest inside one more (inner) scope.
    pub fn in_scope(mut self, kind: ScopeKind, name: &str) -> Self {
        self.scopes.push(Scope {
            kind,
            name: name.to_string(),
        });
        self
    }

    pub fn with_base(mut self, base: &str) -> Self {
        self.base_classes.push(base.to_string());
        self
    }

    pub fn template(mut self) -> Self {
        self.is_template = true;
        self
    }

    pub fn in_file(mut self, file: FileId) -> Self {
        self.file = Some(file);
        self
    }

    pub fn kind(&self) -> DeclKind {
        self.uid.kind()
    }

    pub fn is_forward(&self) -> bool {
        self.uid.is_forward()
    }

    /// `ns::Outer::Name`.
    pub fn qualified_name(&self) -> String {
        join_qualified(self.scopes.iter().map(|s| s.name.as_str()), &self.name)
    }

    /// Name under which C code can see a nested struct or union.
    ///
    /// C hoists nested struct/union tags into the enclosing non-struct scope,
    /// so `struct Outer { struct Inner {...} }` is visible as `Inner`. Returns
    /// `None` when the declaration is not such a nested tag.
    pub fn c_struct_short_name(&self) -> Option<String> {
        if self.is_template || !matches!(self.kind(), DeclKind::Struct | DeclKind::Union) {
            return None;
        }
        let nested = self
            .scopes
            .iter()
            .rev()
            .take_while(|s| s.kind.is_c_struct())
            .count();
        if nested == 0 {
            return None;
        }
        let outer = &self.scopes[..self.scopes.len() - nested];
        match outer.last() {
            None => Some(self.name.clone()),
            Some(scope) if scope.kind == ScopeKind::Namespace => Some(join_qualified(
                outer.iter().map(|s| s.name.as_str()),
                &self.name,
            )),
            Some(_) => None,
        }
    }
}

fn join_qualified<'a>(scopes: impl Iterator<Item = &'a str>, name: &str) -> String {
    let mut qn = String::new();
    for scope in scopes {
        qn.push_str(scope);
        qn.push_str("::");
    }
    qn.push_str(name);
    qn
}
