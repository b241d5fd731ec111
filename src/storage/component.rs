//! Persistence contract for project-scoped containers.

use std::io::{Read, Write};

use super::codec::{RecordReader, RecordWriter};
use super::error::{StorageError, StorageResult};
use super::key::ComponentKey;
use super::store::PersistentStore;

/// A container that can write itself to a unit-keyed persistent store.
///
/// Every record starts with the key, followed by container-specific fields.
pub trait ProjectComponent: Send + Sync {
    /// Key of the record this component is stored under.
    fn key(&self) -> &ComponentKey;

    /// Write the container-specific fields (everything after the key).
    fn write_fields<W: Write>(&self, out: &mut RecordWriter<W>) -> StorageResult<()>
    where
        Self: Sized;

    /// Placeholder containers are never stored.
    fn is_placeholder(&self) -> bool {
        false
    }

    /// Serialize the full record: key, then fields.
    fn to_record(&self) -> StorageResult<Vec<u8>>
    where
        Self: Sized,
    {
        if self.is_placeholder() {
            return Err(StorageError::EmptyContainer(self.key().to_string()));
        }
        let mut out = RecordWriter::buffer();
        self.key().write(&mut out)?;
        self.write_fields(&mut out)?;
        Ok(out.into_inner())
    }

    /// Store the current snapshot of this component.
    fn put(&self, store: &dyn PersistentStore) -> StorageResult<()>
    where
        Self: Sized,
    {
        if self.is_placeholder() {
            tracing::debug!("[repository] skip put of placeholder {}", self.key());
            return Ok(());
        }
        let record = self.to_record()?;
        if crate::diagnostics::trace_persistence() {
            tracing::info!(
                "[repository] write {} ({} bytes)",
                self.key(),
                record.len()
            );
        }
        store.put(self.key(), record)
    }
}

/// Construction side of the contract.
pub trait ComponentRead: Sized {
    /// Collaborators the container needs to come back to life.
    type Context;

    /// Read the container-specific fields after the key has been consumed.
    fn read_fields<R: Read>(
        key: ComponentKey,
        input: &mut RecordReader<R>,
        context: &Self::Context,
    ) -> StorageResult<Self>;
}

/// Decode a full record, checking that it belongs to `expected`.
pub fn decode_component<C: ComponentRead>(
    expected: &ComponentKey,
    record: &[u8],
    context: &C::Context,
) -> StorageResult<C> {
    let mut input = RecordReader::new(record);
    let key = ComponentKey::read(&mut input)?;
    if &key != expected {
        return Err(StorageError::KeyMismatch {
            expected: expected.to_string(),
            found: key.to_string(),
        });
    }
    C::read_fields(key, &mut input, context).map_err(|e| match e {
        StorageError::Io(_) | StorageError::Corrupt { .. } => e,
        other => StorageError::corrupt(expected, other),
    })
}

/// Load a component from the store. `Ok(None)` when no snapshot exists.
pub fn load_component<C: ComponentRead>(
    store: &dyn PersistentStore,
    key: &ComponentKey,
    context: &C::Context,
) -> StorageResult<Option<C>> {
    let Some(record) = store.get(key)? else {
        if crate::diagnostics::trace_persistence() {
            tracing::info!("[repository] read {key}: no snapshot");
        }
        return Ok(None);
    };
    if crate::diagnostics::trace_persistence() {
        tracing::info!("[repository] read {key} ({} bytes)", record.len());
    }
    decode_component(key, &record, context).map(Some)
}
