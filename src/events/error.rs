//! Error types for change-event processing.

use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors from the coalescer, its handlers and the filesystem bridge.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Failed to start event worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Handler '{handler}' failed for {path}: {reason}")]
    HandlerFailed {
        handler: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Storage error while applying events: {0}")]
    Storage(#[from] StorageError),

    #[error("Event worker stopped")]
    ChannelClosed,
}

impl From<notify::Error> for EventError {
    fn from(e: notify::Error) -> Self {
        EventError::InitFailed {
            reason: e.to_string(),
        }
    }
}
