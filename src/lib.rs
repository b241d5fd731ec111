//! Incremental code-model repository for C/C++ projects.
//!
//! Keeps per-project containers (a file registry with parse-context history
//! and a classifier index) in sync with filesystem and build-system change
//! events, and persists them as keyed binary records.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod events;
pub mod fs;
pub mod logging;
pub mod model;
pub mod names;
pub mod preproc;
pub mod project;
pub mod repository;
pub mod storage;
pub mod types;
pub mod utils;
pub mod walker;

pub use config::Settings;
pub use events::{ChangeEventCoalescer, CsmEvent, EventKind, ProjectEventHandler};
pub use project::Project;
pub use repository::{ClassifierIndex, FileEntry, FileRegistry};
pub use storage::{PersistentStore, ProjectComponent, StorageError, StorageResult};
pub use types::{DeclKind, DeclUid, FileId};
