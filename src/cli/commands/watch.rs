//! Watch command - keep a unit current from filesystem events.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::config::Settings;
use crate::events::{ChangeEventCoalescer, CoalescerOptions, CsmEvent, EventKind, FsEventBridge};
use crate::fs::LocalFileSystem;
use crate::model::{ListNativeProject, NativeItem, NativeProject};
use crate::project::Project;
use crate::storage::DirectoryStore;
use crate::walker::SourceWalker;

pub fn run(
    settings: &Settings,
    unit: &str,
    roots: Vec<PathBuf>,
    debounce_ms: Option<u64>,
) -> Result<()> {
    let roots = if roots.is_empty() {
        settings.events.watch.clone()
    } else {
        roots
    };
    if roots.is_empty() {
        bail!("No source roots given and events.watch is empty");
    }
    let roots: Vec<PathBuf> = roots
        .iter()
        .map(|root| {
            root.canonicalize()
                .with_context(|| format!("Cannot access {}", root.display()))
        })
        .collect::<Result<_>>()?;

    let languages = settings.languages.supported.clone();
    let native = Arc::new(ListNativeProject::new(unit));
    let walker = SourceWalker::new(languages.clone());
    for root in &roots {
        for path in walker.walk(root) {
            native.add_item(NativeItem::new(path));
        }
    }

    let path = settings.repository_path();
    let store = DirectoryStore::open(&path)
        .with_context(|| format!("Cannot open repository at {}", path.display()))?;
    let project = Arc::new(
        Project::open(
            unit,
            Arc::new(store),
            Arc::new(LocalFileSystem::new()),
            native.clone(),
            &settings.repository,
        )
        .with_context(|| format!("Cannot load unit '{unit}'"))?,
    );

    let mut events = settings.events.clone();
    if let Some(ms) = debounce_ms {
        events.debounce_ms = ms;
    }
    let coalescer = Arc::new(ChangeEventCoalescer::new(
        project.clone(),
        CoalescerOptions::from_config(&events, &settings.languages),
    )?);

    // Items the stored registry does not know yet
    let mut added = 0usize;
    for item in native.items() {
        if project.files().get_entry(&item.path).is_none() {
            coalescer.fire_event(CsmEvent::item(EventKind::ItemAdded, item));
            added += 1;
        }
    }
    coalescer.flush();
    crate::log_event!(
        "watch",
        "ready",
        "{} files tracked, {added} new",
        project.files().get_size()
    );

    let mut bridge = FsEventBridge::new(coalescer.clone(), languages)?;
    for root in &roots {
        bridge.watch(root)?;
        println!("Watching {}", root.display());
    }

    loop {
        std::thread::sleep(Duration::from_secs(1));
        for path in project.take_reparse_queue() {
            println!("reparse {}", path.display());
        }
    }
}
