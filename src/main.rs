use anyhow::{Result, anyhow};
use clap::Parser;

use csm_repository::cli::commands;
use csm_repository::cli::{Cli, Commands};
use csm_repository::{Settings, diagnostics, logging};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        let dir = std::env::current_dir()?;
        return commands::init::run_init(&dir, force);
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow!("Configuration error: {e}"))?;

    logging::init_with_config(&settings.logging);
    diagnostics::configure(&settings.repository, &settings.diagnostics);

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Config => commands::init::run_config(&settings),
        Commands::Dump { unit, json } => commands::dump::run(&settings, &unit, json),
        Commands::Watch {
            unit,
            roots,
            debounce_ms,
        } => commands::watch::run(&settings, &unit, roots, debounce_ms),
    }
}
