//! Merge rules for two events on the same key.

use super::event::{CsmEvent, EventKind};

/// Outcome of merging a pending event with a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conv {
    /// Newer event replaces the pending one.
    Keep,
    /// Pending event stays.
    Prev,
    /// Both cancel out.
    Drop,
    /// Replaced by an event of this kind on the newer event's path.
    To(EventKind),
    /// Not expected to happen; reported, then the newer event is kept.
    Assert,
}

use Conv::{Assert as A, Drop as D, Keep as K, Prev as P, To};

const CHANGED: Conv = To(EventKind::FileChanged);
const ITEM_CHANGED: Conv = To(EventKind::ItemPropertyChanged);
const ADDED: Conv = To(EventKind::ItemAdded);
const REMOVED: Conv = To(EventKind::ItemRemoved);
const ITEM_RENAMED_CREATED: Conv = To(EventKind::ItemRenamedCreated);
const ITEM_RENAMED_DELETED: Conv = To(EventKind::ItemRenamedDeleted);

/// `TABLE[prev][cur]`. Column order matches [`EventKind::index`]:
/// FC FD FCh FRC FRD IA IR IPC IRC IRD IAPC SRFD PD.
#[rustfmt::skip]
const TABLE: [[Conv; 13]; 13] = [
    // FileCreated
    [K, D, P, K, D, K, D, ADDED, K, D, A, K, K],
    // FileDeleted
    [CHANGED, K, A, CHANGED, K, ITEM_CHANGED, K, A, ITEM_CHANGED, K, A, K, K],
    // FileChanged
    [P, K, K, K, K, K, K, K, K, K, A, K, K],
    // FileRenamedCreated
    [P, D, P, K, D, ITEM_RENAMED_CREATED, D, ITEM_RENAMED_CREATED, K, D, A, K, K],
    // FileRenamedDeleted
    [CHANGED, K, A, CHANGED, K, ITEM_CHANGED, ITEM_RENAMED_DELETED, A, ITEM_CHANGED, K, A, K, K],
    // ItemAdded
    [P, D, P, P, D, K, D, ADDED, K, D, A, K, K],
    // ItemRemoved
    [ITEM_CHANGED, P, A, ITEM_CHANGED, P, ITEM_CHANGED, K, A, ITEM_CHANGED, K, A, K, K],
    // ItemPropertyChanged
    [P, REMOVED, P, P, ITEM_RENAMED_DELETED, K, K, K, K, K, A, K, K],
    // ItemRenamedCreated
    [P, D, P, P, D, ITEM_RENAMED_CREATED, D, ITEM_RENAMED_CREATED, K, D, A, K, K],
    // ItemRenamedDeleted
    [ITEM_CHANGED, P, A, ITEM_CHANGED, P, ITEM_CHANGED, P, A, ITEM_CHANGED, K, A, K, K],
    // ItemsAllPropertyChanged
    [A, A, A, A, A, A, A, A, A, A, K, A, K],
    // SourceRootFilesDeleted
    [A, A, A, A, A, A, A, A, A, A, A, K, K],
    // ProjectDeleted
    [P, P, P, P, P, P, P, P, P, P, P, P, K],
];

/// Merge `cur` into the pending event `prev` for the same key.
///
/// `None` means the two cancel out and nothing is pending for the key.
/// Ignored kinds never reach this function; if one does, the pending event
/// is kept unchanged.
pub fn convert(prev: Option<&CsmEvent>, cur: CsmEvent) -> Option<CsmEvent> {
    let Some(prev) = prev else {
        return Some(cur);
    };
    let (Some(row), Some(col)) = (prev.kind.index(), cur.kind.index()) else {
        return Some(prev.clone());
    };
    match TABLE[row][col] {
        Conv::Keep => Some(cur),
        Conv::Prev => Some(prev.clone()),
        Conv::Drop => None,
        Conv::To(kind) => Some(CsmEvent {
            kind,
            path: cur.path,
            item: cur.item.or_else(|| prev.item.clone()),
        }),
        Conv::Assert => {
            crate::diagnostics::invariant_violated(
                "events",
                &format!("unexpected event sequence {prev} then {cur}"),
            );
            Some(cur)
        }
    }
}
