//! Change-event coalescing for a project.
//!
//! Raw notifications from the filesystem or the build system are merged per
//! path and delivered to the owning project in kind-grouped batches.
//!
//! # Architecture
//!
//! ```text
//! notify watcher ──▶ FsEventBridge ──┐
//!                                    ├──▶ ChangeEventCoalescer ──▶ ProjectEventHandler
//! build-system listeners ────────────┘       (merge table, single worker)
//! ```

mod bridge;
mod coalescer;
mod convert;
mod error;
mod event;
mod handler;

pub use bridge::{FsEventBridge, classify};
pub use coalescer::{ChangeEventCoalescer, CoalescerOptions};
pub use convert::convert;
pub use error::EventError;
pub use event::{CsmEvent, EventKey, EventKind};
pub use handler::{EventBatch, ProjectEventHandler};
