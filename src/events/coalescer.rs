//! Single-flight coalescing of change events.
//!
//! Events are merged per key into a pending map as they arrive. A single
//! worker thread drains the map and dispatches each drained window to the
//! project handler, so windows are processed strictly one after another.
//!
//! ```text
//! fire_event ──merge──▶ pending map ──Run──▶ worker ──▶ EventBatch::dispatch
//!                          ▲                   │
//!               suspend/resume          flush ack / shutdown
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::config::{EventsConfig, LanguagesConfig};
use crate::model::Language;

use super::convert::convert;
use super::event::{CsmEvent, EventKey, EventKind};
use super::handler::{EventBatch, ProjectEventHandler};
use super::EventError;

/// Coalescer tuning.
#[derive(Debug, Clone)]
pub struct CoalescerOptions {
    /// Delay between the first scheduling request and the drain.
    pub debounce: Duration,
    /// Languages kept when all item properties change.
    pub languages: Vec<Language>,
}

impl Default for CoalescerOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::ZERO,
            languages: vec![Language::C, Language::Cpp, Language::Header],
        }
    }
}

impl CoalescerOptions {
    pub fn from_config(events: &EventsConfig, languages: &LanguagesConfig) -> Self {
        Self {
            debounce: Duration::from_millis(events.debounce_ms),
            languages: languages.supported.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Pending {
    events: IndexMap<EventKey, CsmEvent>,
    suspend_count: u32,
}

impl Pending {
    /// Take what may be dispatched now. Removals stay while suspended.
    fn drain(&mut self) -> Vec<CsmEvent> {
        if self.suspend_count == 0 {
            return std::mem::take(&mut self.events).into_values().collect();
        }
        let (held, ready): (IndexMap<_, _>, IndexMap<_, _>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|(_, e)| e.kind.is_removal());
        self.events = held;
        ready.into_values().collect()
    }

    fn project_deleted(&self) -> bool {
        self.events.contains_key(&EventKey::Project)
    }
}

enum Command {
    Run,
    Flush(Sender<()>),
    Shutdown,
}

struct Shared {
    pending: Mutex<Pending>,
    scheduled: AtomicBool,
    handler: Arc<dyn ProjectEventHandler>,
    options: CoalescerOptions,
    batches: AtomicU64,
}

impl Shared {
    /// Drain one window and dispatch it outside the lock.
    fn run_once(&self) {
        let events = self.pending.lock().drain();
        if events.is_empty() {
            return;
        }
        let batch = EventBatch::from_events(events);
        tracing::debug!(
            "[events] dispatch {} event(s) to '{}'",
            batch.len(),
            self.handler.name()
        );
        batch.dispatch(self.handler.as_ref(), &self.options.languages);
        self.batches.fetch_add(1, Ordering::Relaxed);
    }
}

/// Coalesces change events and feeds them to one project handler.
pub struct ChangeEventCoalescer {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl std::fmt::Debug for ChangeEventCoalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeEventCoalescer")
            .field("handler", &self.shared.handler.name())
            .field("options", &self.shared.options)
            .finish()
    }
}

impl ChangeEventCoalescer {
    /// Start the worker thread for `handler`.
    pub fn new(
        handler: Arc<dyn ProjectEventHandler>,
        options: CoalescerOptions,
    ) -> Result<Self, EventError> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending::default()),
            scheduled: AtomicBool::new(false),
            handler,
            options,
            batches: AtomicU64::new(0),
        });
        let (commands, rx) = unbounded();
        let worker_shared = shared.clone();
        let worker = std::thread::Builder::new()
            .name(format!("csm-events-{}", shared.handler.name()))
            .spawn(move || worker_loop(worker_shared, rx))
            .map_err(EventError::WorkerSpawn)?;
        let worker_id = worker.thread().id();
        Ok(Self {
            shared,
            commands,
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    /// Merge `event` into the pending window and schedule the worker.
    pub fn fire_event(&self, event: CsmEvent) {
        if event.kind.is_ignored() {
            return;
        }
        {
            let mut pending = self.shared.pending.lock();
            if pending.project_deleted() {
                tracing::trace!("[events] project deleted, dropping {event}");
                return;
            }
            if event.kind == EventKind::ProjectDeleted {
                pending.events.clear();
            }
            let key = event.key();
            match convert(pending.events.get(&key), event) {
                Some(merged) => {
                    pending.events.insert(key, merged);
                }
                None => {
                    pending.events.shift_remove(&key);
                }
            }
        }
        self.schedule();
    }

    /// Hold back removal events until the matching [`resume`](Self::resume).
    pub fn suspend(&self) {
        let mut pending = self.shared.pending.lock();
        pending.suspend_count += 1;
    }

    pub fn resume(&self) {
        let rearm = {
            let mut pending = self.shared.pending.lock();
            if pending.suspend_count == 0 {
                crate::diagnostics::invariant_violated("events", "resume without suspend");
                return;
            }
            pending.suspend_count -= 1;
            pending.suspend_count == 0 && !pending.events.is_empty()
        };
        if rearm {
            self.schedule();
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.shared.pending.lock().suspend_count > 0
    }

    /// Number of events waiting for the worker.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().events.len()
    }

    /// Number of batches dispatched so far.
    pub fn dispatched_batches(&self) -> u64 {
        self.shared.batches.load(Ordering::Relaxed)
    }

    /// Request a worker run; requests made before the run collapse into one.
    fn schedule(&self) {
        if !self.shared.scheduled.swap(true, Ordering::AcqRel)
            && self.commands.send(Command::Run).is_err()
        {
            tracing::warn!("[events] worker stopped, events stay pending");
        }
    }

    /// Block until every event fired before this call has been dispatched.
    ///
    /// Removals held back by [`suspend`](Self::suspend) stay pending. From a
    /// handler (on the worker thread) this only schedules another run: the
    /// window being dispatched must finish before the next one is drained.
    pub fn flush(&self) {
        if std::thread::current().id() == self.worker_id {
            tracing::debug!("[events] flush from a handler, deferring to the next run");
            self.schedule();
            return;
        }
        let (ack, done) = bounded(1);
        if self.commands.send(Command::Flush(ack)).is_err() {
            tracing::warn!("[events] flush after shutdown");
            return;
        }
        if done.recv().is_err() {
            tracing::warn!("[events] worker exited during flush");
        }
    }

    /// Dispatch what is pending and stop the worker. Idempotent.
    pub fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let _ = self.commands.send(Command::Shutdown);
        if worker.join().is_err() {
            tracing::error!("[events] worker thread panicked");
        }
    }
}

impl Drop for ChangeEventCoalescer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>, commands: Receiver<Command>) {
    tracing::debug!("[events] worker started for '{}'", shared.handler.name());
    while let Ok(command) = commands.recv() {
        match command {
            Command::Run => {
                if !shared.options.debounce.is_zero() {
                    std::thread::sleep(shared.options.debounce);
                }
                shared.scheduled.store(false, Ordering::Release);
                shared.run_once();
            }
            Command::Flush(ack) => {
                shared.run_once();
                let _ = ack.send(());
            }
            Command::Shutdown => {
                shared.run_once();
                break;
            }
        }
    }
    tracing::debug!("[events] worker stopped for '{}'", shared.handler.name());
}
