//! Configuration for the code-model repository.
//!
//! Layered configuration:
//! - Default values
//! - TOML configuration file (`.csmrepo/settings.toml`, found by walking up
//!   from the current directory)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CSM_` and use double
//! underscores to separate nested levels:
//! - `CSM_EVENTS__DEBOUNCE_MS=250` sets `events.debounce_ms`
//! - `CSM_REPOSITORY__TRACE_PERSISTENCE=true` sets `repository.trace_persistence`
//! - `CSM_DIAGNOSTICS__STRICT_ASSERTIONS=true` sets `diagnostics.strict_assertions`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::Language;

/// Name of the per-workspace configuration directory.
pub const CONFIG_DIR: &str = ".csmrepo";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where `.csmrepo` is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub languages: LanguagesConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RepositoryConfig {
    /// Directory holding persisted container snapshots
    #[serde(default = "default_repository_path")]
    pub path: PathBuf,

    /// Log every component read and write
    #[serde(default)]
    pub trace_persistence: bool,

    /// Run container-wide invariant checks
    #[serde(default = "default_check_consistency")]
    pub check_consistency: bool,

    /// Track symlinked paths as separate files instead of aliases
    #[serde(default)]
    pub symlinks_as_distinct_files: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EventsConfig {
    /// Delay before the coalescer drains a window
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Roots watched by `csmrepo watch` when none is given
    #[serde(default)]
    pub watch: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct DiagnosticsConfig {
    /// Panic on invariant violations instead of logging them
    #[serde(default)]
    pub strict_assertions: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `events = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LanguagesConfig {
    /// Languages kept when a project-wide item refresh happens
    #[serde(default = "default_supported_languages")]
    pub supported: Vec<Language>,
}

fn default_version() -> u32 {
    1
}
fn default_repository_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("repository")
}
fn default_check_consistency() -> bool {
    cfg!(debug_assertions)
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_supported_languages() -> Vec<Language> {
    vec![Language::C, Language::Cpp, Language::Header]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            repository: RepositoryConfig::default(),
            events: EventsConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            logging: LoggingConfig::default(),
            languages: LanguagesConfig::default(),
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: default_repository_path(),
            trace_persistence: false,
            check_consistency: default_check_consistency(),
            symlinks_as_distinct_files: false,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            watch: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            supported: default_supported_languages(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Defaults, then the TOML file, then `CSM_` variables.
    ///
    /// Double underscore separates nested levels; single underscores stay
    /// part of the field name.
    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("CSM_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Find the workspace configuration by looking for `.csmrepo`
    /// from the current directory up to the root.
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join("settings.toml"))
    }

    /// The directory containing `.csmrepo`, if any.
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    /// Repository directory, resolved against the workspace root when relative.
    pub fn repository_path(&self) -> PathBuf {
        match &self.workspace_root {
            Some(root) if self.repository.path.is_relative() => root.join(&self.repository.path),
            _ => self.repository.path.clone(),
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `dir`
    pub fn init_config_file(dir: &Path, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let settings = Settings {
            workspace_root: Some(dir.to_path_buf()),
            ..Settings::default()
        };
        settings.save(&config_path)?;

        Ok(config_path)
    }
}
