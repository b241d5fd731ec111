//! Dump command - print the persisted containers of a unit.

use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::config::Settings;
use crate::fs::LocalFileSystem;
use crate::model::ListNativeProject;
use crate::project::{Project, ProjectSummary};
use crate::storage::DirectoryStore;

pub fn run(settings: &Settings, unit: &str, json: bool) -> Result<()> {
    let path = settings.repository_path();
    if !path.is_dir() {
        bail!("No repository at {}. Run 'csmrepo watch' first.", path.display());
    }
    let store = DirectoryStore::open(&path)
        .with_context(|| format!("Cannot open repository at {}", path.display()))?;
    let project = Project::open(
        unit,
        Arc::new(store),
        Arc::new(LocalFileSystem::new()),
        Arc::new(ListNativeProject::new(unit)),
        &settings.repository,
    )
    .with_context(|| format!("Cannot load unit '{unit}'"))?;

    let summary = project.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &ProjectSummary) {
    println!("Unit: {}", summary.unit);
    println!("{}", "=".repeat(50));
    println!("Files ({}):", summary.files.len());
    for file in &summary.files {
        let state = match (file.contexts, file.valid, file.parsing) {
            (0, _, _) => "no state",
            (_, _, true) => "parsing",
            (_, true, false) => "valid",
            (_, false, false) => "invalid",
        };
        println!(
            "  #{:<6} {} [{state}, {} context(s), mod {}]",
            file.id, file.path, file.contexts, file.mod_count
        );
        if file.canonical != file.path {
            println!("          -> {}", file.canonical);
        }
    }
    println!("Classifiers ({}):", summary.classifiers.len());
    for name in &summary.classifiers {
        println!("  {name}");
    }
    println!("Typedefs ({}):", summary.typedefs.len());
    for name in &summary.typedefs {
        println!("  {name}");
    }
}
