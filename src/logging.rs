//! Log output of `csmrepo`.
//!
//! Each line is `HH:MM:SS.mmm LEVEL target: [component] message`, where the
//! component is the container or service that emitted it (`files`,
//! `classifiers`, `repository`, `events`). Levels come from the `[logging]`
//! table of the settings file unless `RUST_LOG` is set:
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! "csm_repository::events" = "debug"
//! ```
//!
//! `RUST_LOG=csm_repository::storage=trace csmrepo dump --unit app` follows
//! persistence without touching the settings file.

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Wall-clock time to the millisecond, without the date.
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::from_default_env(),
            Err(_) => EnvFilter::new(filter_directives(config)),
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// `EnvFilter` directives for `config`: the default level, then per-target
/// levels sorted by target.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();
    let mut directives = config.default.clone();
    for (module, level) in modules {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

/// Info line tagged with a component: `[repository] opened: app: 3 files`.
#[macro_export]
macro_rules! log_event {
    ($component:expr, $what:expr) => {
        tracing::info!("[{}] {}", $component, $what)
    };
    ($component:expr, $what:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $what, format!($($arg)*))
    };
}

/// Same as [`log_event!`] at debug level.
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $what:expr) => {
        tracing::debug!("[{}] {}", $component, $what)
    };
    ($component:expr, $what:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $what, format!($($arg)*))
    };
}
