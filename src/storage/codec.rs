//! Primitive record encoding for repository snapshots.
//!
//! Records are flat byte streams: big-endian `i32`, one-byte booleans,
//! length-prefixed UTF-8 strings and length-prefixed blobs. Containers compose
//! these primitives in a fixed field order.

use std::io::{Read, Write};

use super::error::{StorageError, StorageResult};

/// Writes primitive fields to an underlying byte sink.
pub struct RecordWriter<W: Write> {
    inner: W,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_i32(&mut self, value: i32) -> StorageResult<()> {
        self.inner.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> StorageResult<()> {
        self.inner.write_all(&value.to_be_bytes())?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> StorageResult<()> {
        self.inner.write_all(&[u8::from(value)])?;
        Ok(())
    }

    /// Write a collection size. Sizes beyond `i32::MAX` cannot be represented.
    pub fn write_len(&mut self, len: usize) -> StorageResult<()> {
        let len = i32::try_from(len).map_err(|_| StorageError::InvalidValue {
            field: "length",
            value: len as i64,
        })?;
        self.write_i32(len)
    }

    pub fn write_str(&mut self, value: &str) -> StorageResult<()> {
        self.write_len(value.len())?;
        self.inner.write_all(value.as_bytes())?;
        Ok(())
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> StorageResult<()> {
        self.write_len(value.len())?;
        self.inner.write_all(value)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl RecordWriter<Vec<u8>> {
    /// Writer backed by a growable buffer.
    pub fn buffer() -> Self {
        Self::new(Vec::new())
    }
}

/// Reads primitive fields written by [`RecordWriter`].
pub struct RecordReader<R: Read> {
    inner: R,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn fill(&mut self, buf: &mut [u8], field: &'static str) -> StorageResult<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                StorageError::Truncated { field }
            } else {
                StorageError::Io(e)
            }
        })
    }

    pub fn read_i32(&mut self, field: &'static str) -> StorageResult<i32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf, field)?;
        Ok(i32::from_be_bytes(buf))
    }

    pub fn read_u32(&mut self, field: &'static str) -> StorageResult<u32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf, field)?;
        Ok(u32::from_be_bytes(buf))
    }

    pub fn read_bool(&mut self, field: &'static str) -> StorageResult<bool> {
        let mut buf = [0u8; 1];
        self.fill(&mut buf, field)?;
        match buf[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(StorageError::InvalidValue {
                field,
                value: other as i64,
            }),
        }
    }

    /// Read a collection size written by [`RecordWriter::write_len`].
    pub fn read_len(&mut self, field: &'static str) -> StorageResult<usize> {
        let len = self.read_i32(field)?;
        usize::try_from(len).map_err(|_| StorageError::InvalidValue {
            field,
            value: len as i64,
        })
    }

    pub fn read_string(&mut self, field: &'static str) -> StorageResult<String> {
        let bytes = self.read_bytes(field)?;
        String::from_utf8(bytes).map_err(|_| StorageError::InvalidUtf8 { field })
    }

    pub fn read_bytes(&mut self, field: &'static str) -> StorageResult<Vec<u8>> {
        let len = self.read_len(field)?;
        let mut buf = Vec::new();
        // Grow through `take` so a corrupt length cannot force a huge allocation.
        let read = (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        if read != len {
            return Err(StorageError::Truncated { field });
        }
        Ok(buf)
    }
}
