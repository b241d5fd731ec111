use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Unexpected end of record while reading {field}")]
    Truncated { field: &'static str },

    #[error("Invalid {field} value: {value}")]
    InvalidValue { field: &'static str, value: i64 },

    #[error("Invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("Record key mismatch: expected {expected}, found {found}")]
    KeyMismatch { expected: String, found: String },

    #[error("Container '{0}' is an empty placeholder and cannot be persisted")]
    EmptyContainer(String),
}

impl StorageError {
    /// Attach the record key to a decode failure.
    pub fn corrupt(key: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        StorageError::Corrupt {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
