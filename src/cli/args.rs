//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Incremental C/C++ code-model repository
#[derive(Parser, Debug)]
#[command(
    name = "csmrepo",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect and maintain a C/C++ code-model repository",
    long_about = "Persisted file registries and classifier indexes for C/C++ projects, \
                  kept current from filesystem change events.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true, env = "CSM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Set up .csmrepo directory with default settings
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// Print the persisted containers of a unit
    Dump {
        /// Unit (project) name
        #[arg(short, long)]
        unit: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Watch a source tree and keep the unit's containers current
    Watch {
        /// Unit (project) name
        #[arg(short, long)]
        unit: String,

        /// Source roots (defaults to `events.watch` from settings)
        roots: Vec<PathBuf>,

        /// Override events.debounce_ms
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
}
