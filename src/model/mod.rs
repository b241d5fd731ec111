//! Code-model objects the repository indexes.

pub mod decl;
pub mod native;
pub mod objects;

pub use decl::{ClassifierDecl, Scope, ScopeKind};
pub use native::{Language, ListNativeProject, NativeItem, NativeItemRef, NativeProject};
pub use objects::{ObjectResolver, ObjectTable, SourceFile};
