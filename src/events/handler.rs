//! Project-side consumer of coalesced event batches.

use crate::model::{Language, NativeItemRef};

use super::EventError;
use super::event::{CsmEvent, EventKind};

/// Receives coalesced events, grouped by kind.
///
/// Called from the coalescer's worker thread, one batch at a time. A handler
/// error is logged and the remaining groups of the batch still run.
pub trait ProjectEventHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &str;

    /// Current native items of the project, recomputed on each call.
    fn native_items(&self) -> Vec<NativeItemRef> {
        Vec::new()
    }

    /// The project is gone; nothing else in the batch is delivered.
    fn on_project_deleted(&self) -> Result<(), EventError>;

    /// Rename halves: old paths and new paths.
    fn on_renamed(&self, deleted: &[CsmEvent], created: &[CsmEvent]) -> Result<(), EventError>;

    /// Every item's properties changed; `items` is already language-filtered.
    fn on_all_items_changed(&self, items: &[NativeItemRef]) -> Result<(), EventError>;

    fn on_changed(&self, events: &[CsmEvent]) -> Result<(), EventError>;

    fn on_item_property_changed(&self, events: &[CsmEvent]) -> Result<(), EventError>;

    fn on_created(&self, events: &[CsmEvent]) -> Result<(), EventError>;

    fn on_item_added(&self, events: &[CsmEvent]) -> Result<(), EventError>;

    /// Final pass of every batch; `removed` holds the batch's removal events.
    fn check_for_removed(&self, removed: &[CsmEvent]) -> Result<(), EventError>;
}

/// One drained window of events, grouped for dispatch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventBatch {
    pub project_deleted: bool,
    pub renamed_deleted: Vec<CsmEvent>,
    pub renamed_created: Vec<CsmEvent>,
    pub all_properties_changed: bool,
    pub changed: Vec<CsmEvent>,
    pub property_changed: Vec<CsmEvent>,
    pub created: Vec<CsmEvent>,
    pub added: Vec<CsmEvent>,
    pub removed: Vec<CsmEvent>,
}

impl EventBatch {
    pub fn from_events(events: impl IntoIterator<Item = CsmEvent>) -> Self {
        let mut batch = Self::default();
        for event in events {
            match event.kind {
                EventKind::ProjectDeleted => batch.project_deleted = true,
                EventKind::FileRenamedDeleted | EventKind::ItemRenamedDeleted => {
                    batch.renamed_deleted.push(event)
                }
                EventKind::FileRenamedCreated | EventKind::ItemRenamedCreated => {
                    batch.renamed_created.push(event)
                }
                EventKind::ItemsAllPropertyChanged => batch.all_properties_changed = true,
                EventKind::FileChanged => batch.changed.push(event),
                EventKind::ItemPropertyChanged => batch.property_changed.push(event),
                EventKind::FileCreated => batch.created.push(event),
                EventKind::ItemAdded => batch.added.push(event),
                EventKind::FileDeleted
                | EventKind::ItemRemoved
                | EventKind::SourceRootFilesDeleted => batch.removed.push(event),
                EventKind::FileIndexed
                | EventKind::FolderCreated
                | EventKind::FileAttributeChanged
                | EventKind::Null => {}
            }
        }
        batch
    }

    pub fn len(&self) -> usize {
        usize::from(self.project_deleted)
            + usize::from(self.all_properties_changed)
            + self.renamed_deleted.len()
            + self.renamed_created.len()
            + self.changed.len()
            + self.property_changed.len()
            + self.created.len()
            + self.added.len()
            + self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver the batch in kind order.
    ///
    /// Project deletion short-circuits everything else. Empty groups are
    /// skipped, except the removal check which always closes a batch.
    pub fn dispatch(&self, handler: &dyn ProjectEventHandler, languages: &[Language]) {
        let name = handler.name();
        if self.project_deleted {
            report(name, "project deleted", handler.on_project_deleted());
            return;
        }
        if !self.renamed_deleted.is_empty() || !self.renamed_created.is_empty() {
            report(
                name,
                "renamed",
                handler.on_renamed(&self.renamed_deleted, &self.renamed_created),
            );
        }
        if self.all_properties_changed {
            let items: Vec<NativeItemRef> = handler
                .native_items()
                .into_iter()
                .filter(|item| !item.excluded && languages.contains(&item.language))
                .collect();
            report(name, "all items changed", handler.on_all_items_changed(&items));
        }
        if !self.changed.is_empty() {
            report(name, "changed", handler.on_changed(&self.changed));
        }
        if !self.property_changed.is_empty() {
            report(
                name,
                "item property changed",
                handler.on_item_property_changed(&self.property_changed),
            );
        }
        if !self.created.is_empty() {
            report(name, "created", handler.on_created(&self.created));
        }
        if !self.added.is_empty() {
            report(name, "item added", handler.on_item_added(&self.added));
        }
        report(name, "check for removed", handler.check_for_removed(&self.removed));
    }
}

fn report(handler: &str, group: &str, result: Result<(), EventError>) {
    if let Err(e) = result {
        tracing::error!("[events] handler '{handler}' failed on {group}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NativeItem;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        items: Vec<NativeItemRef>,
        fail_changed: bool,
    }

    impl Recorder {
        fn push(&self, call: &str, n: usize) -> Result<(), EventError> {
            self.calls.lock().push(format!("{call}:{n}"));
            Ok(())
        }
    }

    impl ProjectEventHandler for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }
        fn native_items(&self) -> Vec<NativeItemRef> {
            self.items.clone()
        }
        fn on_project_deleted(&self) -> Result<(), EventError> {
            self.push("deleted", 0)
        }
        fn on_renamed(&self, d: &[CsmEvent], c: &[CsmEvent]) -> Result<(), EventError> {
            self.push("renamed", d.len() + c.len())
        }
        fn on_all_items_changed(&self, items: &[NativeItemRef]) -> Result<(), EventError> {
            self.push("all", items.len())
        }
        fn on_changed(&self, events: &[CsmEvent]) -> Result<(), EventError> {
            self.push("changed", events.len())?;
            if self.fail_changed {
                return Err(EventError::HandlerFailed {
                    handler: "recorder".into(),
                    path: PathBuf::from("/x"),
                    reason: "boom".into(),
                });
            }
            Ok(())
        }
        fn on_item_property_changed(&self, events: &[CsmEvent]) -> Result<(), EventError> {
            self.push("property", events.len())
        }
        fn on_created(&self, events: &[CsmEvent]) -> Result<(), EventError> {
            self.push("created", events.len())
        }
        fn on_item_added(&self, events: &[CsmEvent]) -> Result<(), EventError> {
            self.push("added", events.len())
        }
        fn check_for_removed(&self, removed: &[CsmEvent]) -> Result<(), EventError> {
            self.push("removed", removed.len())
        }
    }

    fn mixed_batch() -> EventBatch {
        EventBatch::from_events([
            CsmEvent::file(EventKind::FileCreated, "/n.c"),
            CsmEvent::file(EventKind::FileDeleted, "/d.c"),
            CsmEvent::file(EventKind::FileChanged, "/c.c"),
            CsmEvent::file(EventKind::FileRenamedCreated, "/r2.c"),
            CsmEvent::file(EventKind::FileRenamedDeleted, "/r1.c"),
            CsmEvent::item(EventKind::ItemAdded, Arc::new(NativeItem::new("/i.c"))),
            CsmEvent::file(EventKind::ItemsAllPropertyChanged, "/"),
        ])
    }

    #[test]
    fn test_dispatch_order() {
        let recorder = Recorder {
            items: vec![
                Arc::new(NativeItem::new("/a.c")),
                Arc::new(NativeItem::new("/b.f90")),
                Arc::new(NativeItem::new("/c.cpp").excluded()),
            ],
            ..Default::default()
        };
        mixed_batch().dispatch(&recorder, &[Language::C, Language::Cpp]);
        assert_eq!(
            *recorder.calls.lock(),
            vec!["renamed:2", "all:1", "changed:1", "created:1", "added:1", "removed:1"]
        );
    }

    #[test]
    fn test_project_deleted_short_circuits() {
        let mut batch = mixed_batch();
        batch.project_deleted = true;
        let recorder = Recorder::default();
        batch.dispatch(&recorder, &[]);
        assert_eq!(*recorder.calls.lock(), vec!["deleted:0"]);
    }

    #[test]
    fn test_handler_error_does_not_stop_batch() {
        let recorder = Recorder {
            fail_changed: true,
            ..Default::default()
        };
        EventBatch::from_events([
            CsmEvent::file(EventKind::FileChanged, "/c.c"),
            CsmEvent::file(EventKind::FileCreated, "/n.c"),
        ])
        .dispatch(&recorder, &[]);
        assert_eq!(*recorder.calls.lock(), vec!["changed:1", "created:1", "removed:0"]);
    }
}
