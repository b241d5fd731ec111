pub mod codec;
pub mod component;
pub mod error;
pub mod key;
pub mod store;

pub use codec::{RecordReader, RecordWriter};
pub use component::{ComponentRead, ProjectComponent, decode_component, load_component};
pub use error::{StorageError, StorageResult};
pub use key::{ComponentKey, ComponentKind};
pub use store::{DirectoryStore, MemoryStore, PersistentStore};
